// 机器人数据拼装 - 监听条目 + 近期事件 + 统计
// Bot data assembly - watch entries + recent events + stats
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::db::{AccountStorage, AccountWatchEntry, EventStorage};
use crate::mango::events::MangoEvent;

/// 每个机器人带回的近期事件条数 / Recent events returned per bot
const RECENT_EVENTS_LIMIT: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BotPnl {
    pub value: f64,
    pub percentage: f64,
    pub is_positive: bool,
    pub chart_data: Vec<f64>,
}

impl Default for BotPnl {
    fn default() -> Self {
        Self {
            value: 0.0,
            percentage: 0.0,
            is_positive: true,
            chart_data: vec![0.0; 10],
        }
    }
}

/// 前端消费的机器人视图 / The bot view the frontend consumes
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BotData {
    pub id: u32,
    pub name: String,
    pub status: String,
    pub mango_account: String,
    pub pnl: BotPnl,
    pub portfolio: f64,
    pub accuracy: f64,
    pub sharpe_ratio: f64,
    pub apr: f64,
    pub delegate: String,
    pub events: Vec<MangoEvent>,
}

/// 机器人数据服务 / Bot data service
pub struct BotDataService {
    account_storage: Arc<AccountStorage>,
    event_storage: Arc<EventStorage>,
}

impl BotDataService {
    pub fn new(account_storage: Arc<AccountStorage>, event_storage: Arc<EventStorage>) -> Self {
        Self {
            account_storage,
            event_storage,
        }
    }

    fn assemble(&self, entry: &AccountWatchEntry) -> Result<BotData> {
        let events = self
            .event_storage
            .get_by_account(&entry.mango_account, Some(RECENT_EVENTS_LIMIT))?;

        // 绩效指标的计算不在这层，占位为零 / Performance formulas live elsewhere, zeros here
        Ok(BotData {
            id: entry.account_number,
            name: format!("Bot {}", entry.account_number),
            status: if entry.active { "Active" } else { "Stopped" }.to_string(),
            mango_account: entry.mango_account.clone(),
            pnl: BotPnl::default(),
            portfolio: 0.0,
            accuracy: 0.0,
            sharpe_ratio: 0.0,
            apr: 0.0,
            delegate: entry.owner.clone(),
            events,
        })
    }

    /// 某用户的全部机器人 / All bots of one user
    pub fn user_bots_data(&self, owner: &str) -> Result<Vec<BotData>> {
        self.account_storage
            .list_by_owner(owner)?
            .iter()
            .map(|entry| self.assemble(entry))
            .collect()
    }

    /// 单个机器人 / A single bot
    pub fn single_bot_data(&self, mango_account: &str) -> Result<Option<BotData>> {
        match self.account_storage.get_entry(mango_account)? {
            Some(entry) => Ok(Some(self.assemble(&entry)?)),
            None => Ok(None),
        }
    }
}
