// 账户存储模块 - 被监听账户表与机器人统计
// Account storage module - watched account rows and bot statistics
use chrono::{TimeZone, Utc};
use rocksdb::{Direction, IteratorMode, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::db::errors::StorageError;
use crate::mango::events::MangoEventType;

/// 被监听的mango账户 / A watched mango account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountWatchEntry {
    pub mango_account: String,
    pub owner: String,
    /// 同一owner下单调递增，从1开始 / Monotonic per owner, starts at 1
    pub account_number: u32,
    pub active: bool,
    /// epoch 毫秒 / Epoch millis
    pub created_at: i64,
}

/// 机器人累计统计 / Cumulative bot statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BotStats {
    pub events_total: u64,
    pub deposits_total: u64,
    pub withdrawals_total: u64,
    pub trades_total: u64,
    pub last_event_at: i64,
}

/// 机器人单日统计 / Per-day bot statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: String,
    pub events: u64,
    pub trades: u64,
}

/// 账户存储服务 / Account storage service
pub struct AccountStorage {
    db: Arc<DB>,
}

impl AccountStorage {
    pub fn new(db: Arc<DB>) -> Self {
        Self { db }
    }

    fn entry_key(mango_account: &str) -> String {
        format!("acct:{}", mango_account)
    }

    fn owner_index_key(owner: &str, account_number: u32) -> String {
        format!("idx_owner:{}:{:05}", owner, account_number)
    }

    /// 写入监听条目与owner索引 / Write the watch entry and the owner index
    pub fn put_entry(&self, entry: &AccountWatchEntry) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();
        let data = serde_json::to_vec(entry)?;
        batch.put(Self::entry_key(&entry.mango_account).as_bytes(), &data);
        batch.put(
            Self::owner_index_key(&entry.owner, entry.account_number).as_bytes(),
            entry.mango_account.as_bytes(),
        );
        self.db.write(batch)?;
        Ok(())
    }

    pub fn get_entry(&self, mango_account: &str) -> Result<Option<AccountWatchEntry>, StorageError> {
        match self.db.get(Self::entry_key(mango_account).as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// 翻转active标记，返回更新后的条目 / Flip the active flag, returns the updated entry
    pub fn set_active(
        &self,
        mango_account: &str,
        active: bool,
    ) -> Result<Option<AccountWatchEntry>, StorageError> {
        let Some(mut entry) = self.get_entry(mango_account)? else {
            return Ok(None);
        };
        entry.active = active;
        let data = serde_json::to_vec(&entry)?;
        self.db.put(Self::entry_key(mango_account).as_bytes(), &data)?;
        Ok(Some(entry))
    }

    /// owner名下全部条目，按accountNumber升序 / All entries of one owner, account number ascending
    pub fn list_by_owner(&self, owner: &str) -> Result<Vec<AccountWatchEntry>, StorageError> {
        let prefix = format!("idx_owner:{}:", owner);
        let mut entries = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let mango_account = String::from_utf8(value.to_vec())?;
            match self.get_entry(&mango_account)? {
                Some(entry) => entries.push(entry),
                None => {
                    return Err(StorageError::IndexCorrupted(format!(
                        "owner index points at missing account row: {}",
                        mango_account
                    )))
                }
            }
        }
        Ok(entries)
    }

    /// 全部条目（启动时预热监听集合用）/ All entries (registry warm-up at startup)
    pub fn list_all(&self) -> Result<Vec<AccountWatchEntry>, StorageError> {
        let prefix = "acct:";
        let mut entries = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }

    /// owner当前的最大accountNumber，无账户为0
    /// Current max account number for the owner, 0 when none exist
    ///
    /// 读取后的预留要由调用方的锁串行化 / Read-then-reserve is serialized by the caller's lock
    pub fn max_account_number(&self, owner: &str) -> Result<u32, StorageError> {
        Ok(self
            .list_by_owner(owner)?
            .iter()
            .map(|e| e.account_number)
            .max()
            .unwrap_or(0))
    }

    // ---------- 统计 / Statistics ----------

    fn stats_key(mango_account: &str) -> String {
        format!("stats:{}", mango_account)
    }

    fn daily_key(mango_account: &str, date: &str) -> String {
        format!("stats_daily:{}:{}", mango_account, date)
    }

    pub fn get_stats(&self, mango_account: &str) -> Result<BotStats, StorageError> {
        match self.db.get(Self::stats_key(mango_account).as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(BotStats::default()),
        }
    }

    /// 入库一个事件后累加统计行 / Bump the stats rows after persisting one event
    pub fn record_event(
        &self,
        mango_account: &str,
        event_type: MangoEventType,
        timestamp: i64,
    ) -> Result<(), StorageError> {
        let mut stats = self.get_stats(mango_account)?;
        stats.events_total += 1;
        stats.last_event_at = stats.last_event_at.max(timestamp);
        let mut is_trade = false;
        match event_type {
            MangoEventType::TokenDeposit => stats.deposits_total += 1,
            MangoEventType::TokenWithdraw => stats.withdrawals_total += 1,
            MangoEventType::PerpTrade | MangoEventType::SpotTrade => {
                stats.trades_total += 1;
                is_trade = true;
            }
            _ => {}
        }

        let date = Utc
            .timestamp_millis_opt(timestamp)
            .single()
            .unwrap_or_else(Utc::now)
            .format("%Y-%m-%d")
            .to_string();
        let daily_key = Self::daily_key(mango_account, &date);
        let mut daily: DailyStats = match self.db.get(daily_key.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => DailyStats {
                date: date.clone(),
                ..Default::default()
            },
        };
        daily.events += 1;
        if is_trade {
            daily.trades += 1;
        }

        let mut batch = WriteBatch::default();
        batch.put(
            Self::stats_key(mango_account).as_bytes(),
            &serde_json::to_vec(&stats)?,
        );
        batch.put(daily_key.as_bytes(), &serde_json::to_vec(&daily)?);
        self.db.write(batch)?;
        Ok(())
    }

    /// 日期区间的日统计，闭区间，按日期升序
    /// Daily stats in a closed date range, date ascending
    pub fn get_daily_stats(
        &self,
        mango_account: &str,
        from_date: &str,
        to_date: &str,
    ) -> Result<Vec<DailyStats>, StorageError> {
        let prefix = format!("stats_daily:{}:", mango_account);
        let start = format!("{}{}", prefix, from_date);
        let end = format!("{}{}", prefix, to_date);
        let mut rows = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(start.as_bytes(), Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) || key.as_ref() > end.as_bytes() {
                break;
            }
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }
}
