use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub solana: SolanaConfig,
    pub mango: MangoConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub rocksdb_path: String,
}

/// Solana 节点配置 / Solana node configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SolanaConfig {
    pub rpc_url: String,
    pub ws_url: String,
    #[serde(default = "default_commitment")]
    pub commitment: String,
    /// 单次确认的超时秒数 / Per-attempt confirmation timeout in seconds
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
    /// 重新提交交易的最大次数 / Max transaction resubmission attempts
    #[serde(default = "default_confirm_max_retries")]
    pub confirm_max_retries: u32,
    /// 抓取交易详情的重试间隔毫秒 / Transaction fetch retry delay in ms
    #[serde(default = "default_fetch_retry_delay_ms")]
    pub fetch_retry_delay_ms: u64,
    #[serde(default = "default_ping_interval_seconds")]
    pub ping_interval_seconds: u64,
}

/// Mango 协议配置 / Mango protocol configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MangoConfig {
    /// Mango v4 程序地址 / Mango v4 program id
    pub program_id: String,
    /// 主网 group 地址 / Mainnet group pubkey
    pub group: String,
    /// group 元数据API（index -> symbol 快照来源）/ Group metadata API (snapshot source)
    pub group_metadata_url: String,
    /// 快照刷新间隔秒数 / Snapshot refresh interval in seconds
    #[serde(default = "default_group_refresh_secs")]
    pub group_refresh_secs: u64,
}

/// Webhook 订阅管理配置 / Webhook subscription management configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    pub webhook_id: String,
    pub api_url: String,
    pub api_key: String,
    /// 回调地址（推送交易到 /accountsListener）/ Callback URL (pushes transactions to /accountsListener)
    pub callback_url: String,
    /// /accountsListener 的鉴权密钥 / Shared secret for /accountsListener
    pub shared_secret: String,
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_confirm_timeout_secs() -> u64 {
    5
}

fn default_confirm_max_retries() -> u32 {
    5
}

fn default_fetch_retry_delay_ms() -> u64 {
    400
}

fn default_ping_interval_seconds() -> u64 {
    30
}

fn default_group_refresh_secs() -> u64 {
    300
}

impl Config {
    pub fn new() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config"))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }
}
