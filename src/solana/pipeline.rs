// 入库管道 - 确认、抓取、解码、落库与联动副作用
// Ingestion pipeline - confirm, fetch, decode, persist and the coupled side effects
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::bots::BotDataService;
use crate::config::Config;
use crate::db::{AccountStorage, EventStorage, Saved};
use crate::mango::decoder::InstructionDecoder;
use crate::mango::events::MangoEvent;
use crate::solana::client::{FetchedTransaction, SolanaClient};
use crate::solana::confirm::{confirm_transaction, ConfirmPolicy};
use crate::watch::AccountWatchRegistry;
use crate::ws::FanoutRegistry;

pub struct IngestionPipeline {
    client: SolanaClient,
    decoder: InstructionDecoder,
    event_storage: Arc<EventStorage>,
    account_storage: Arc<AccountStorage>,
    registry: Arc<AccountWatchRegistry>,
    fanout: Arc<FanoutRegistry>,
    bots: Arc<BotDataService>,
    policy: ConfirmPolicy,
    fetch_retry_delay: Duration,
}

impl IngestionPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &Config,
        client: SolanaClient,
        decoder: InstructionDecoder,
        event_storage: Arc<EventStorage>,
        account_storage: Arc<AccountStorage>,
        registry: Arc<AccountWatchRegistry>,
        fanout: Arc<FanoutRegistry>,
        bots: Arc<BotDataService>,
    ) -> Self {
        Self {
            client,
            decoder,
            event_storage,
            account_storage,
            registry,
            fanout,
            bots,
            policy: ConfirmPolicy::from_config(config),
            fetch_retry_delay: Duration::from_millis(config.solana.fetch_retry_delay_ms),
        }
    }

    /// 提交交易等confirmed，入库在后台继续 / Submit and wait for confirmed, ingestion continues in the background
    pub async fn send_and_ingest(self: &Arc<Self>, base64_tx: &str) -> Result<String> {
        let signature = confirm_transaction(&self.client, &self.policy, base64_tx).await?;

        let pipeline = Arc::clone(self);
        let sig = signature.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.confirm_and_ingest(&sig).await {
                error!("❌ Background ingestion failed for {}: {}", sig, e);
            }
        });

        Ok(signature)
    }

    /// 确认状态轮询，webhook推来的签名走这里 / Confirmation polling, signatures pushed by the webhook go through here
    pub async fn await_confirmation(&self, signature: &str, max_retries: u32) -> bool {
        for attempt in 0..max_retries {
            match self.client.get_signature_status(signature).await {
                Ok(Some(status)) => {
                    // 带err的交易已经执行且失败，不进入入库 / A status with err ran and failed, never ingested
                    if let Some(err) = status.err {
                        error!("❌ Transaction failed on chain: {}: {}", signature, err);
                        return false;
                    }
                    if status.is_confirmed() {
                        return true;
                    }
                    info!(
                        "⏳ Attempt {}: transaction not yet confirmed, retrying: {}",
                        attempt + 1,
                        signature
                    );
                }
                Ok(None) => {
                    info!(
                        "⏳ Attempt {}: transaction not yet confirmed, retrying: {}",
                        attempt + 1,
                        signature
                    );
                }
                Err(e) => warn!("⚠️ Signature status check failed: {}", e),
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        error!(
            "❌ Transaction not confirmed after {} attempts: {}",
            max_retries, signature
        );
        false
    }

    /// 抓交易、解码、逐事件处理 / Fetch the transaction, decode, process event by event
    pub async fn confirm_and_ingest(&self, signature: &str) -> Result<()> {
        let fetched = self.fetch_transaction(signature).await?;
        self.ingest_fetched(signature, fetched).await
    }

    /// 日志流里看到的签名: 只处理牵涉被监听账户的交易
    /// Signatures seen on the log stream: only transactions touching a watched account
    pub async fn ingest_if_watched(&self, signature: &str) -> Result<()> {
        let fetched = self.fetch_transaction(signature).await?;
        let mut touches_watched = false;
        for key in fetched.transaction.message.static_account_keys() {
            if self.registry.is_watched(&key.to_string()).await {
                touches_watched = true;
                break;
            }
        }
        if !touches_watched {
            return Ok(());
        }
        self.ingest_fetched(signature, fetched).await
    }

    async fn ingest_fetched(&self, signature: &str, fetched: FetchedTransaction) -> Result<()> {
        let events = self
            .decoder
            .decode(&fetched.transaction, signature, fetched.block_time)
            .await
            .map_err(|e| anyhow!("decode failed: {}", e))?;

        info!(
            "📦 Ingesting {} events from transaction {}",
            events.len(),
            signature
        );
        for event in events {
            self.process_event(event).await;
        }
        Ok(())
    }

    /// 固定间隔重试直到交易可见 / Fixed-delay retries until the transaction is visible
    async fn fetch_transaction(&self, signature: &str) -> Result<FetchedTransaction> {
        loop {
            match self.client.get_transaction(signature).await {
                Ok(Some(fetched)) => return Ok(fetched),
                Ok(None) => {}
                Err(e) => warn!("⚠️ Transaction fetch failed, retrying: {}", e),
            }
            tokio::time::sleep(self.fetch_retry_delay).await;
        }
    }

    /// 单事件处理。副作用失败只记日志，不拦兄弟事件。
    /// Process one event. A failing side effect is logged and never blocks siblings.
    async fn process_event(&self, event: MangoEvent) {
        let signature = event.signature().to_string();
        let mango_account = event.mango_account().to_string();

        match self.event_storage.save(&event) {
            Ok(Saved::Inserted) => {}
            Ok(Saved::Duplicate) => {
                // 重复投递，副作用已经跑过一次 / Duplicate delivery, side effects already ran once
                info!(
                    "🔁 Duplicate event skipped: {} {}",
                    event.event_type().as_str(),
                    signature
                );
                return;
            }
            Err(e) => {
                error!("❌ Failed to store event for {}: {}", signature, e);
                return;
            }
        }

        if let Err(e) =
            self.account_storage
                .record_event(&mango_account, event.event_type(), event.timestamp())
        {
            error!("❌ Failed to update bot stats for {}: {}", mango_account, e);
        }

        let first_signer = event.signers().first().cloned().unwrap_or_default();

        if event.is_deposit() && !self.registry.is_watched(&mango_account).await {
            match self.registry.register(&first_signer, &mango_account).await {
                Ok(_) => self.announce_new_bot(&first_signer, &mango_account).await,
                Err(e) => error!("❌ Failed to start watching {}: {}", mango_account, e),
            }
        } else if event.is_withdraw() {
            match self.registry.active_accounts_of(&first_signer).await {
                Ok(active) if active.iter().any(|a| a == &mango_account) => {
                    if let Err(e) = self.registry.deactivate(&mango_account).await {
                        error!("❌ Failed to stop watching {}: {}", mango_account, e);
                    }
                }
                Ok(_) => {}
                Err(e) => error!("❌ Failed to list accounts of {}: {}", first_signer, e),
            }
        }

        match serde_json::to_value(&event) {
            Ok(json) => self.fanout.broadcast_update(&mango_account, json).await,
            Err(e) => error!("❌ Failed to serialize event for fan-out: {}", e),
        }
    }

    async fn announce_new_bot(&self, owner: &str, mango_account: &str) {
        let bot = match self.bots.single_bot_data(mango_account) {
            Ok(Some(bot)) => bot,
            Ok(None) => {
                warn!("⚠️ New bot has no data yet: {}", mango_account);
                return;
            }
            Err(e) => {
                error!("❌ Failed to load new bot data: {}", e);
                return;
            }
        };
        match serde_json::to_value(&bot) {
            Ok(json) => self.fanout.broadcast_new_bot(owner, mango_account, json).await,
            Err(e) => error!("❌ Failed to serialize bot for fan-out: {}", e),
        }
    }
}
