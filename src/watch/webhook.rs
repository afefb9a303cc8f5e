// Webhook订阅管理客户端 - 推送地址清单到交易推送服务
// Webhook management client - pushes the address list to the transaction push service
use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::config::WebhookConfig;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookInfo {
    #[serde(default)]
    account_addresses: Vec<String>,
}

/// 推送服务的webhook管理API / The push service's webhook management API
#[derive(Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
    api_url: String,
    webhook_id: String,
    api_key: String,
    callback_url: String,
}

impl WebhookClient {
    pub fn new(config: &WebhookConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            webhook_id: config.webhook_id.clone(),
            api_key: config.api_key.clone(),
            callback_url: config.callback_url.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v0/webhooks/{}", self.api_url, self.webhook_id)
    }

    /// 远端当前订阅的地址清单 / The address list the remote currently subscribes
    pub async fn fetch_addresses(&self) -> Result<Vec<String>> {
        let info: WebhookInfo = self
            .http
            .get(self.endpoint())
            .query(&[("api-key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| anyhow!("webhook info request failed: {}", e))?
            .json()
            .await?;
        info!(
            "📡 Webhook subscription fetched, {} addresses",
            info.account_addresses.len()
        );
        Ok(info.account_addresses)
    }

    /// 整表覆盖推送，失败只记日志，本地状态为准
    /// Whole-list overwrite push, failures are logged and local state stands
    pub async fn push_addresses(&self, addresses: &[String]) {
        let body = json!({
            "webhookURL": self.callback_url,
            "transactionTypes": ["Any"],
            "accountAddresses": addresses,
            "webhookType": "raw"
        });

        let result = self
            .http
            .put(self.endpoint())
            .query(&[("api-key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(_) => info!(
                "📡 Webhook subscription updated, {} addresses",
                addresses.len()
            ),
            Err(e) => error!("❌ Failed to update webhook subscription: {}", e),
        }
    }
}
