// 交易确认 - 有界重试的提交加确认 / Transaction confirmation - bounded submit-and-confirm retries
use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use solana_sdk::transaction::VersionedTransaction;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::solana::client::SolanaClient;

/// 确认参数，来自配置 / Confirmation parameters, from config
#[derive(Clone)]
pub struct ConfirmPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
}

impl ConfirmPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: Duration::from_secs(config.solana.confirm_timeout_secs),
            max_retries: config.solana.confirm_max_retries,
        }
    }
}

/// 提交base64交易并等待confirmed，超时就整笔重新提交
/// Submit a base64 transaction and wait for confirmed, a timeout resubmits the whole thing
pub async fn confirm_transaction(
    client: &SolanaClient,
    policy: &ConfirmPolicy,
    base64_tx: &str,
) -> Result<String> {
    // 先验证载荷真的是一笔交易 / Validate the payload really is a transaction first
    let bytes = BASE64
        .decode(base64_tx)
        .map_err(|e| anyhow!("invalid base64 transaction: {}", e))?;
    let _: VersionedTransaction =
        bincode::deserialize(&bytes).map_err(|e| anyhow!("invalid transaction payload: {}", e))?;

    let mut last_error = None;
    for attempt in 0..=policy.max_retries {
        let signature = client.send_transaction(base64_tx).await?;

        match tokio::time::timeout(policy.timeout, wait_confirmed(client, &signature)).await {
            Ok(Ok(())) => {
                info!("✅ Transaction successfully confirmed: {}", signature);
                return Ok(signature);
            }
            Ok(Err(e)) => {
                // 链上失败不再可能成功 / An on-chain failure cannot succeed on resubmit
                error!("❌ Transaction failed on chain: {}: {}", signature, e);
                return Err(e);
            }
            Err(_) => {
                warn!(
                    "⏳ Transaction confirmation timed out, retrying, attempt {}",
                    attempt + 1
                );
                last_error = Some(anyhow!("confirmation timeout"));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("transaction confirmation failed")))
}

/// 轮询签名状态直到confirmed/finalized，链上err直接判负
/// Poll the signature status until confirmed or finalized, an on-chain err is a hard failure
async fn wait_confirmed(client: &SolanaClient, signature: &str) -> Result<()> {
    loop {
        match client.get_signature_status(signature).await {
            Ok(Some(status)) => {
                // 执行失败的交易同样会走到confirmed，成败看err
                // Failed transactions reach confirmed too, err decides the outcome
                if let Some(err) = status.err {
                    return Err(anyhow!("Transaction failed: {}", err));
                }
                if status.is_confirmed() {
                    return Ok(());
                }
            }
            Ok(None) => {}
            // 传输层错误继续轮询，外层超时兜底 / Transport errors keep polling, the outer timeout bounds them
            Err(e) => warn!("⚠️ Signature status check failed: {}", e),
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
