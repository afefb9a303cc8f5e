// Group快照 - 指令解码的符号解析来源
// Group snapshot - symbol resolution source for instruction decoding
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum GroupError {
    /// 启动时必须先拉到快照，否则解码直接失败
    /// The snapshot must be fetched at startup, decoding fails hard without it
    #[error("Group快照未初始化 / Group snapshot not initialized")]
    NotInitialized,

    #[error("未知的token索引 / Unknown token index: {0}")]
    UnknownTokenIndex(u16),

    #[error("未知的bank地址 / Unknown bank: {0}")]
    UnknownBank(String),

    #[error("未知的token符号 / Unknown token symbol: {0}")]
    UnknownSymbol(String),

    #[error("未知的市场地址 / Unknown market: {0}")]
    UnknownMarket(String),

    #[error("快照拉取失败 / Snapshot fetch failed: {0}")]
    FetchFailed(String),
}

/// Group元数据API的文档结构 / Group metadata API document shape
#[derive(Debug, Deserialize)]
struct GroupIdsDocument {
    groups: Vec<GroupIds>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupIds {
    public_key: String,
    tokens: Vec<TokenInfo>,
    perp_markets: Vec<PerpMarketInfo>,
    serum3_markets: Vec<SerumMarketInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub token_index: u16,
    pub symbol: String,
    pub mint: String,
    pub decimals: u8,
    #[serde(default)]
    pub banks: Vec<String>,
    /// 构造deposit/withdraw指令需要，元数据里可能缺失
    /// Needed to build deposit/withdraw instructions, may be absent in the metadata
    #[serde(default)]
    pub oracle: Option<String>,
    #[serde(default)]
    pub vault: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerpMarketInfo {
    pub perp_market_index: u16,
    pub name: String,
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerumMarketInfo {
    pub market_index: u16,
    pub name: String,
    pub public_key: String,
}

/// 解析就绪的快照，构建时建好全部映射
/// Resolution-ready snapshot, all maps built at construction
pub struct GroupSnapshot {
    pub group_pubkey: String,
    tokens_by_index: HashMap<u16, TokenInfo>,
    tokens_by_bank: HashMap<String, u16>,
    tokens_by_mint: HashMap<String, u16>,
    perp_by_pubkey: HashMap<String, PerpMarketInfo>,
    serum_by_pubkey: HashMap<String, SerumMarketInfo>,
}

impl GroupSnapshot {
    fn from_ids(ids: GroupIds) -> Self {
        Self::new(ids.public_key, ids.tokens, ids.perp_markets, ids.serum3_markets)
    }

    pub fn new(
        group_pubkey: String,
        tokens: Vec<TokenInfo>,
        perp_markets: Vec<PerpMarketInfo>,
        serum_markets: Vec<SerumMarketInfo>,
    ) -> Self {
        let mut tokens_by_index = HashMap::new();
        let mut tokens_by_bank = HashMap::new();
        let mut tokens_by_mint = HashMap::new();
        for token in tokens {
            for bank in &token.banks {
                tokens_by_bank.insert(bank.clone(), token.token_index);
            }
            tokens_by_mint.insert(token.mint.clone(), token.token_index);
            tokens_by_index.insert(token.token_index, token);
        }
        let perp_by_pubkey = perp_markets
            .into_iter()
            .map(|m| (m.public_key.clone(), m))
            .collect();
        let serum_by_pubkey = serum_markets
            .into_iter()
            .map(|m| (m.public_key.clone(), m))
            .collect();
        Self {
            group_pubkey,
            tokens_by_index,
            tokens_by_bank,
            tokens_by_mint,
            perp_by_pubkey,
            serum_by_pubkey,
        }
    }

    pub fn token_by_index(&self, index: u16) -> Result<&TokenInfo, GroupError> {
        self.tokens_by_index
            .get(&index)
            .ok_or(GroupError::UnknownTokenIndex(index))
    }

    pub fn token_by_bank(&self, bank: &str) -> Result<&TokenInfo, GroupError> {
        let index = self
            .tokens_by_bank
            .get(bank)
            .ok_or_else(|| GroupError::UnknownBank(bank.to_string()))?;
        self.token_by_index(*index)
    }

    pub fn token_by_mint(&self, mint: &str) -> Result<&TokenInfo, GroupError> {
        let index = self
            .tokens_by_mint
            .get(mint)
            .ok_or_else(|| GroupError::UnknownBank(mint.to_string()))?;
        self.token_by_index(*index)
    }

    pub fn perp_market(&self, pubkey: &str) -> Result<&PerpMarketInfo, GroupError> {
        self.perp_by_pubkey
            .get(pubkey)
            .ok_or_else(|| GroupError::UnknownMarket(pubkey.to_string()))
    }

    pub fn serum_market(&self, pubkey: &str) -> Result<&SerumMarketInfo, GroupError> {
        self.serum_by_pubkey
            .get(pubkey)
            .ok_or_else(|| GroupError::UnknownMarket(pubkey.to_string()))
    }

    pub fn token_by_symbol(&self, symbol: &str) -> Result<&TokenInfo, GroupError> {
        self.tokens_by_index
            .values()
            .find(|t| t.symbol == symbol)
            .ok_or_else(|| GroupError::UnknownSymbol(symbol.to_string()))
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenInfo> {
        self.tokens_by_index.values()
    }
}

/// 共享的快照缓存，后台任务定期刷新 / Shared snapshot cache, refreshed by a background task
#[derive(Clone)]
pub struct GroupCache {
    inner: Arc<RwLock<Option<Arc<GroupSnapshot>>>>,
    metadata_url: String,
    group_pubkey: String,
    http: reqwest::Client,
}

impl GroupCache {
    pub fn new(config: &Config) -> Self {
        Self::empty(
            config.mango.group.clone(),
            config.mango.group_metadata_url.clone(),
        )
    }

    /// 未初始化的缓存，等首次refresh / Uninitialized cache awaiting the first refresh
    pub fn empty(group_pubkey: String, metadata_url: String) -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
            metadata_url,
            group_pubkey,
            http: reqwest::Client::new(),
        }
    }

    /// 直接注入快照，测试与离线回放用 / Inject a snapshot directly, for tests and offline replay
    pub fn from_snapshot(snapshot: GroupSnapshot) -> Self {
        let group_pubkey = snapshot.group_pubkey.clone();
        Self {
            inner: Arc::new(RwLock::new(Some(Arc::new(snapshot)))),
            metadata_url: String::new(),
            group_pubkey,
            http: reqwest::Client::new(),
        }
    }

    /// 当前快照，未初始化是致命错误 / Current snapshot, uninitialized is a fatal error
    pub async fn snapshot(&self) -> Result<Arc<GroupSnapshot>, GroupError> {
        self.inner
            .read()
            .await
            .clone()
            .ok_or(GroupError::NotInitialized)
    }

    /// 从元数据API拉取并替换快照 / Fetch from the metadata API and swap the snapshot
    pub async fn refresh(&self) -> Result<(), GroupError> {
        let doc: GroupIdsDocument = self
            .http
            .get(&self.metadata_url)
            .send()
            .await
            .map_err(|e| GroupError::FetchFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| GroupError::FetchFailed(e.to_string()))?;

        let ids = doc
            .groups
            .into_iter()
            .find(|g| g.public_key == self.group_pubkey)
            .ok_or_else(|| {
                GroupError::FetchFailed(format!("group {} not in metadata", self.group_pubkey))
            })?;

        let snapshot = GroupSnapshot::from_ids(ids);
        let token_count = snapshot.tokens_by_index.len();
        *self.inner.write().await = Some(Arc::new(snapshot));

        info!(
            "📸 Group snapshot refreshed, group: {}, tokens: {}",
            self.group_pubkey, token_count
        );
        Ok(())
    }

    /// 后台定期刷新，失败只记日志，旧快照继续用
    /// Periodic background refresh, failures are logged and the old snapshot stays
    pub fn spawn_refresh(&self, interval_secs: u64) {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = cache.refresh().await {
                    error!("❌ Group snapshot refresh failed: {}", e);
                }
            }
        });
    }
}
