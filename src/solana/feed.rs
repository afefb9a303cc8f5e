// 实时签名流 - logsSubscribe订阅与无上限退避重连
// Live signature feed - logsSubscribe subscription with unbounded backoff reconnects
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::solana::pipeline::IngestionPipeline;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const BACKOFF_FACTOR: f64 = 1.5;
const MAX_BACKOFF: Duration = Duration::from_secs(60);

pub struct SignatureFeed {
    ws_url: String,
    program_id: String,
    commitment: String,
    ping_interval: Duration,
    pipeline: Arc<IngestionPipeline>,
}

impl SignatureFeed {
    pub fn new(config: &Config, pipeline: Arc<IngestionPipeline>) -> Self {
        Self {
            ws_url: config.solana.ws_url.clone(),
            program_id: config.mango.program_id.clone(),
            commitment: config.solana.commitment.clone(),
            ping_interval: Duration::from_secs(config.solana.ping_interval_seconds),
            pipeline,
        }
    }

    /// 一直跑到shutdown信号为true / Runs until the shutdown signal flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if *shutdown.borrow() {
                info!("🛑 Signature feed stopped");
                return;
            }

            match self.connect_and_stream(&mut shutdown).await {
                Ok(()) => return,
                Err(e) => {
                    let delay = jittered(backoff);
                    warn!(
                        "⚠️ Signature feed disconnected: {}, reconnecting in {:?}",
                        e, delay
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => {}
                    }
                    backoff = next_backoff(backoff);
                }
            }
        }
    }

    /// 单次连接的生命周期，正常返回只在shutdown时发生
    /// One connection's lifetime, a clean return only happens on shutdown
    async fn connect_and_stream(&self, shutdown: &mut watch::Receiver<bool>) -> anyhow::Result<()> {
        info!("📡 Connecting signature feed: {}", self.ws_url);
        let (mut stream, _) = connect_async(&self.ws_url).await?;

        let subscribe = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "logsSubscribe",
            "params": [
                { "mentions": [self.program_id] },
                { "commitment": self.commitment }
            ]
        });
        stream.send(Message::Text(subscribe.to_string())).await?;
        info!("✅ Signature feed subscribed, program: {}", self.program_id);

        // 主动心跳，有些节点会掐空闲连接 / Keepalive pings, some nodes cut idle connections
        let mut keepalive = tokio::time::interval(self.ping_interval);
        keepalive.tick().await;

        loop {
            tokio::select! {
                _ = keepalive.tick() => {
                    stream.send(Message::Ping(Vec::new())).await?;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let _ = stream.close(None).await;
                        info!("🛑 Signature feed stopped");
                        return Ok(());
                    }
                }
                message = stream.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => self.handle_notification(&text).await,
                        Some(Ok(Message::Ping(data))) => {
                            stream.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Err(anyhow::anyhow!("stream closed"));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                    }
                }
            }
        }
    }

    async fn handle_notification(&self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("⚠️ Unparseable feed message: {}", e);
                return;
            }
        };
        if value["method"] != "logsNotification" {
            return;
        }
        let result = &value["params"]["result"]["value"];
        if !result["err"].is_null() {
            return;
        }
        let Some(signature) = result["signature"].as_str() else {
            return;
        };

        let pipeline = Arc::clone(&self.pipeline);
        let signature = signature.to_string();
        tokio::spawn(async move {
            if let Err(e) = pipeline.ingest_if_watched(&signature).await {
                error!("❌ Feed ingestion failed for {}: {}", signature, e);
            }
        });
    }
}

fn next_backoff(current: Duration) -> Duration {
    let next = current.mul_f64(BACKOFF_FACTOR);
    next.min(MAX_BACKOFF)
}

/// ±20%抖动，避免齐步重连 / ±20% jitter so reconnects do not march in step
fn jittered(base: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.8..=1.2);
    base.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_to_cap() {
        let mut delay = INITIAL_BACKOFF;
        for _ in 0..20 {
            delay = next_backoff(delay);
        }
        assert_eq!(delay, MAX_BACKOFF);
    }

    #[test]
    fn test_jitter_stays_within_band() {
        for _ in 0..100 {
            let d = jittered(Duration::from_secs(10));
            assert!(d >= Duration::from_secs(8));
            assert!(d <= Duration::from_secs(12));
        }
    }
}
