use anyhow::Result;
use rocksdb::{Options, DB};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;

/// RocksDB 存储服务 / RocksDB storage service
pub struct RocksDbStorage {
    pub(crate) db: Arc<DB>,
}

impl RocksDbStorage {
    /// 创建新的 RocksDB 存储实例 / Create new RocksDB storage instance
    pub fn new(config: &Config) -> Result<Self> {
        Self::open_at(&config.database.rocksdb_path)
    }

    /// 按路径打开，集成测试用临时目录 / Open at a path, integration tests use temp dirs
    pub fn open_at(path: &str) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        // 1. 写缓冲 / Write buffers
        opts.set_write_buffer_size(128 * 1024 * 1024);
        opts.set_max_write_buffer_number(4);
        opts.set_min_write_buffer_number_to_merge(1);

        // 2. 渐进式压缩 / Progressive compression
        opts.set_compression_type(rocksdb::DBCompressionType::None);
        opts.set_compression_per_level(&[
            rocksdb::DBCompressionType::None,   // L0: No compression
            rocksdb::DBCompressionType::None,   // L1: No compression
            rocksdb::DBCompressionType::Snappy, // L2: Light compression
            rocksdb::DBCompressionType::Lz4,    // L3: Light compression
            rocksdb::DBCompressionType::Zstd,   // L4: Medium compression
            rocksdb::DBCompressionType::Zstd,   // L5: Medium compression
            rocksdb::DBCompressionType::Zstd,   // L6: Medium compression
        ]);

        // 3. Compaction 触发器 / Compaction triggers
        opts.set_level_zero_file_num_compaction_trigger(50);
        opts.set_level_zero_slowdown_writes_trigger(100);
        opts.set_level_zero_stop_writes_trigger(200);

        // 4. 并发配置 / Concurrency config
        opts.set_max_background_jobs(8);
        opts.set_max_subcompactions(4);

        // 5. 内存表优化 / Memtable optimization
        opts.set_allow_concurrent_memtable_write(true);
        opts.set_enable_write_thread_adaptive_yield(true);
        opts.set_max_open_files(-1);

        // 6. 统计 / Statistics
        opts.set_stats_dump_period_sec(0);
        opts.set_stats_persist_period_sec(0);

        let db = DB::open(&opts, path)?;

        info!("🗄️ RocksDB initialized successfully, path: {}", path);

        Ok(Self { db: Arc::new(db) })
    }

    /// 创建事件存储实例 / Create event storage instance
    pub fn create_event_storage(&self) -> crate::db::EventStorage {
        crate::db::EventStorage::new(Arc::clone(&self.db))
    }

    /// 创建账户存储实例 / Create account storage instance
    pub fn create_account_storage(&self) -> crate::db::AccountStorage {
        crate::db::AccountStorage::new(Arc::clone(&self.db))
    }
}
