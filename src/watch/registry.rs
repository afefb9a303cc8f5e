// 账户监听注册表 - 内存监听集合 + 持久化 + webhook镜像
// Account watch registry - in-memory watched set + persistence + webhook mirror
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::db::{AccountStorage, AccountWatchEntry};
use crate::watch::webhook::WebhookClient;

pub struct AccountWatchRegistry {
    storage: Arc<AccountStorage>,
    webhook: WebhookClient,
    watched: RwLock<HashSet<String>>,
    /// 串行化读最大值再占位的临界区 / Serializes the read-max-then-reserve critical section
    alloc_lock: Mutex<()>,
}

impl AccountWatchRegistry {
    pub fn new(storage: Arc<AccountStorage>, webhook: WebhookClient) -> Self {
        Self {
            storage,
            webhook,
            watched: RwLock::new(HashSet::new()),
            alloc_lock: Mutex::new(()),
        }
    }

    /// 启动预热: 本地活跃条目进集合，再和远端订阅对齐
    /// Startup warm-up: active local entries fill the set, then the remote subscription is aligned
    pub async fn warm_up(&self) -> Result<()> {
        let local: HashSet<String> = self
            .storage
            .list_all()?
            .into_iter()
            .filter(|e| e.active)
            .map(|e| e.mango_account)
            .collect();

        match self.webhook.fetch_addresses().await {
            Ok(remote) => {
                let remote: HashSet<String> = remote.into_iter().collect();
                if remote != local {
                    let list: Vec<String> = local.iter().cloned().collect();
                    self.webhook.push_addresses(&list).await;
                }
            }
            Err(e) => warn!("⚠️ Webhook subscription unavailable at warm-up: {}", e),
        }

        info!("👀 Watch registry warmed up, {} accounts", local.len());
        *self.watched.write().await = local;
        Ok(())
    }

    pub async fn is_watched(&self, mango_account: &str) -> bool {
        self.watched.read().await.contains(mango_account)
    }

    pub async fn watched_accounts(&self) -> Vec<String> {
        self.watched.read().await.iter().cloned().collect()
    }

    /// 下一个可用的accountNumber，从1开始。不占位，上链冲突由调用方处理。
    /// Next available account number, starting at 1. Nothing is reserved, on-chain conflicts are the caller's problem.
    pub async fn next_account_number(&self, owner: &str) -> Result<u32> {
        let _guard = self.alloc_lock.lock().await;
        Ok(self.storage.max_account_number(owner)? + 1)
    }

    /// 开始监听一个账户: 分配编号、落库、进集合、镜像到webhook
    /// Start watching an account: allocate a number, persist, add to the set, mirror to the webhook
    pub async fn register(&self, owner: &str, mango_account: &str) -> Result<AccountWatchEntry> {
        let entry = {
            let _guard = self.alloc_lock.lock().await;
            if let Some(existing) = self.storage.get_entry(mango_account)? {
                existing
            } else {
                let entry = AccountWatchEntry {
                    mango_account: mango_account.to_string(),
                    owner: owner.to_string(),
                    account_number: self.storage.max_account_number(owner)? + 1,
                    active: true,
                    created_at: chrono::Utc::now().timestamp_millis(),
                };
                self.storage.put_entry(&entry)?;
                entry
            }
        };

        self.watched
            .write()
            .await
            .insert(mango_account.to_string());
        let list = self.watched_accounts().await;
        self.webhook.push_addresses(&list).await;

        info!("👀 Started watching Mango account: {}", mango_account);
        Ok(entry)
    }

    /// 停止监听: 本地标记非活跃并镜像到webhook / Stop watching: mark inactive locally and mirror to the webhook
    pub async fn deactivate(&self, mango_account: &str) -> Result<()> {
        if self.storage.set_active(mango_account, false)?.is_none() {
            warn!("⚠️ Deactivate for unknown account: {}", mango_account);
        }
        self.watched.write().await.remove(mango_account);
        let list = self.watched_accounts().await;
        self.webhook.push_addresses(&list).await;

        info!("🛑 Stopped watching Mango account: {}", mango_account);
        Ok(())
    }

    /// owner名下活跃账户地址 / Active account addresses of one owner
    pub async fn active_accounts_of(&self, owner: &str) -> Result<Vec<String>> {
        Ok(self
            .storage
            .list_by_owner(owner)?
            .into_iter()
            .filter(|e| e.active)
            .map(|e| e.mango_account)
            .collect())
    }

    pub fn entries_of(&self, owner: &str) -> Result<Vec<AccountWatchEntry>> {
        Ok(self.storage.list_by_owner(owner)?)
    }
}
