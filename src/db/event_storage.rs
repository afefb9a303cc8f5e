// 事件存储模块 - 按种类前缀分表的复合键方案
// Event storage module - per-kind key prefixes as tables, composite keys
use rocksdb::{Direction, IteratorMode, WriteBatch, DB};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::db::errors::StorageError;
use crate::mango::events::{MangoEvent, MangoEventType};

/// 保存结果 - 重复键是静默no-op / Save outcome - duplicate keys are a silent no-op
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saved {
    Inserted,
    Duplicate,
}

/// 事件存储服务 / Event storage service
pub struct EventStorage {
    db: Arc<DB>,
    // 查重与写入之间的临界区 / Critical section between the duplicate check and the write
    save_lock: Mutex<()>,
}

impl EventStorage {
    pub fn new(db: Arc<DB>) -> Self {
        Self {
            db,
            save_lock: Mutex::new(()),
        }
    }

    /// 生成8位短签名 / Generate 8-character short signature
    fn sig8(signature: &str) -> String {
        signature.chars().take(8).collect()
    }

    /// 主事件键，键本身就是(signature, 种类)唯一约束
    /// Main event key, the key itself is the (signature, kind) uniqueness constraint
    fn event_key(event_type: MangoEventType, signature: &str) -> String {
        format!("evt:{}:{}", event_type.code(), signature)
    }

    /// 保存单个事件，重复的(签名,种类)直接跳过
    /// Save one event, duplicate (signature, kind) pairs are skipped
    pub fn save(&self, event: &MangoEvent) -> Result<Saved, StorageError> {
        let event_type = event.event_type();
        let signature = event.signature();
        let event_key = Self::event_key(event_type, signature);

        // webhook与日志流可能同时送达同一签名，持锁让查重加写入原子
        // The webhook and log-feed paths can deliver the same signature concurrently,
        // the lock makes check-then-write atomic
        let _guard = self
            .save_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.db.get(event_key.as_bytes())?.is_some() {
            return Ok(Saved::Duplicate);
        }

        let sig8 = Self::sig8(signature);
        let code = event_type.code();
        let ts = format!("{:013}", event.timestamp().max(0));

        let mut batch = WriteBatch::default();

        // 1. 主事件数据 / Main event row
        let event_data = serde_json::to_vec(event)?;
        batch.put(event_key.as_bytes(), &event_data);

        // 2. mangoAccount 索引，值指向主键 / mangoAccount index, value points at the main key
        let acct_idx = format!(
            "idx_acct:{}:{}:{}:{}",
            event.mango_account(),
            ts,
            code,
            sig8
        );
        batch.put(acct_idx.as_bytes(), event_key.as_bytes());

        // 3. 签名者索引 / Signer index
        for signer in event.signers() {
            let owner_idx = format!("idx_owner_evt:{}:{}:{}:{}", signer, ts, code, sig8);
            batch.put(owner_idx.as_bytes(), event_key.as_bytes());
        }

        self.db.write(batch)?;

        info!(
            "✅ Stored {} event, signature: {}, account: {}",
            event_type.as_str(),
            signature,
            event.mango_account()
        );

        Ok(Saved::Inserted)
    }

    /// 按(签名, 种类)取单个事件 / Fetch one event by (signature, kind)
    pub fn get(
        &self,
        event_type: MangoEventType,
        signature: &str,
    ) -> Result<Option<MangoEvent>, StorageError> {
        let key = Self::event_key(event_type, signature);
        match self.db.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn exists(
        &self,
        event_type: MangoEventType,
        signature: &str,
    ) -> Result<bool, StorageError> {
        let key = Self::event_key(event_type, signature);
        Ok(self.db.get(key.as_bytes())?.is_some())
    }

    /// 某账户的全部事件，时间倒序合并所有种类
    /// All events of one account, newest first, all kinds merged
    pub fn get_by_account(
        &self,
        mango_account: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MangoEvent>, StorageError> {
        let prefix = format!("idx_acct:{}:", mango_account);
        self.collect_indexed(&prefix, limit)
    }

    /// 某签名者名下的全部事件，时间倒序 / All events signed by one owner, newest first
    pub fn get_by_owner(
        &self,
        owner: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MangoEvent>, StorageError> {
        let prefix = format!("idx_owner_evt:{}:", owner);
        self.collect_indexed(&prefix, limit)
    }

    /// 正向扫索引前缀再倒序加载主行 / Forward prefix scan, then load rows in reverse
    fn collect_indexed(
        &self,
        prefix: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MangoEvent>, StorageError> {
        let mut event_keys = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            event_keys.push(value.to_vec());
        }

        let mut events = Vec::new();
        for key in event_keys.into_iter().rev() {
            if let Some(cap) = limit {
                if events.len() >= cap {
                    break;
                }
            }
            match self.db.get(&key)? {
                Some(bytes) => events.push(serde_json::from_slice(&bytes)?),
                None => {
                    let key = String::from_utf8(key)?;
                    return Err(StorageError::IndexCorrupted(format!(
                        "index points at missing event row: {}",
                        key
                    )));
                }
            }
        }
        Ok(events)
    }
}
