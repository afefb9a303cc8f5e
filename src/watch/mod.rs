// 账户监听域 / Account watch domain
pub mod registry;
pub mod webhook;

pub use registry::AccountWatchRegistry;
pub use webhook::WebhookClient;
