// Library 模块导出
// Library Module Exports

pub mod bots;
pub mod config;
pub mod db;
pub mod docs;
pub mod mango;
pub mod router;
pub mod solana;
pub mod util;
pub mod watch;
pub mod ws;

use std::sync::Arc;

// Re-export commonly used types
// 重导出常用类型
pub use bots::{BotData, BotDataService};
pub use db::{AccountStorage, EventStorage, RocksDbStorage};
pub use mango::events::{MangoEvent, MangoEventType};

/// 全局共享状态，axum handler经由State取用 / Shared state, axum handlers reach it via State
pub struct AppState {
    pub config: config::Config,
    pub event_storage: Arc<db::EventStorage>,
    pub account_storage: Arc<db::AccountStorage>,
    pub registry: Arc<watch::AccountWatchRegistry>,
    pub fanout: Arc<ws::FanoutRegistry>,
    pub bots: Arc<bots::BotDataService>,
    pub client: solana::SolanaClient,
    pub pipeline: Arc<solana::IngestionPipeline>,
    pub group: mango::group::GroupCache,
    pub builder: mango::accounts::MangoInstructionBuilder,
}
