pub mod account_storage;
pub mod errors;
pub mod event_storage;
pub mod storage;

pub use account_storage::{AccountStorage, AccountWatchEntry, BotStats, DailyStats};
pub use errors::StorageError;
pub use event_storage::{EventStorage, Saved};
pub use storage::RocksDbStorage;
