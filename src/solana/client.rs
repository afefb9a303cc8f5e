// Solana客户端模块 - 原生JSON-RPC封装 / Solana client module - raw JSON-RPC wrapper
use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use solana_sdk::hash::Hash;
use solana_sdk::transaction::VersionedTransaction;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

/// 获取到的交易详情 / A fetched transaction
#[derive(Debug, Clone)]
pub struct FetchedTransaction {
    pub transaction: VersionedTransaction,
    pub block_time: Option<i64>,
}

/// 代币账户余额 / Token account balance
#[derive(Debug, Clone)]
pub struct TokenAccountBalance {
    pub pubkey: String,
    pub mint: String,
    /// UI金额的十进制字符串 / Decimal string of the UI amount
    pub ui_amount: String,
}

/// getSignatureStatuses返回的单签名状态 / Status of one signature from getSignatureStatuses
#[derive(Debug, Clone)]
pub struct SignatureStatus {
    pub confirmation_status: Option<String>,
    /// 链上执行错误，非空即交易已执行且失败 / On-chain execution error, non-null means the transaction ran and failed
    pub err: Option<Value>,
}

impl SignatureStatus {
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self.confirmation_status.as_deref(),
            Some("confirmed") | Some("finalized")
        )
    }
}

/// Solana RPC客户端 / Solana RPC client
#[derive(Clone)]
pub struct SolanaClient {
    rpc_url: String,
    commitment: String,
    client: Client,
}

impl SolanaClient {
    /// 创建新的Solana客户端 / Create new Solana client
    pub fn new(rpc_url: String, commitment: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            rpc_url,
            commitment,
            client,
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        let response = self.client.post(&self.rpc_url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "RPC请求失败，状态码 / RPC request failed with status: {}",
                response.status()
            ));
        }

        let body: Value = response.json().await?;
        if let Some(err) = body.get("error") {
            return Err(anyhow!("RPC错误 / RPC error: {:?}", err));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| anyhow!("响应中没有result字段 / No result field in response"))
    }

    /// 检查RPC连接 / Check RPC connection
    pub async fn check_connection(&self) -> Result<bool> {
        info!(
            "检查Solana RPC连接 / Checking Solana RPC connection: {}",
            self.rpc_url
        );
        match self.call("getHealth", json!([])).await {
            Ok(_) => {
                info!("✅ Solana RPC连接正常 / Solana RPC connection is healthy");
                Ok(true)
            }
            Err(e) => {
                error!("无法连接到Solana RPC / Cannot connect to Solana RPC: {}", e);
                Ok(false)
            }
        }
    }

    /// 提交已签名交易，跳过预检 / Submit a signed transaction, preflight skipped
    pub async fn send_transaction(&self, base64_tx: &str) -> Result<String> {
        let result = self
            .call(
                "sendTransaction",
                json!([
                    base64_tx,
                    {
                        "encoding": "base64",
                        "skipPreflight": true,
                        "maxRetries": 0
                    }
                ]),
            )
            .await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("sendTransaction返回了非字符串 / sendTransaction returned non-string"))
    }

    /// 签名的确认状态 / Confirmation status of a signature
    pub async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>> {
        let result = self
            .call(
                "getSignatureStatuses",
                json!([[signature], { "searchTransactionHistory": true }]),
            )
            .await?;
        let status = &result["value"][0];
        if status.is_null() {
            return Ok(None);
        }
        Ok(Some(SignatureStatus {
            confirmation_status: status["confirmationStatus"].as_str().map(|s| s.to_string()),
            err: (!status["err"].is_null()).then(|| status["err"].clone()),
        }))
    }

    /// 交易详情，未上链时返回None / Transaction details, None while not yet on chain
    pub async fn get_transaction(&self, signature: &str) -> Result<Option<FetchedTransaction>> {
        debug!("获取交易详情 / Getting transaction details: {}", signature);
        let result = self
            .call(
                "getTransaction",
                json!([
                    signature,
                    {
                        "encoding": "base64",
                        "commitment": self.commitment,
                        "maxSupportedTransactionVersion": 0
                    }
                ]),
            )
            .await?;

        if result.is_null() {
            return Ok(None);
        }

        let encoded = result["transaction"][0]
            .as_str()
            .ok_or_else(|| anyhow!("交易编码缺失 / Missing transaction encoding"))?;
        let bytes = BASE64.decode(encoded)?;
        let transaction: VersionedTransaction = bincode::deserialize(&bytes)?;
        let block_time = result["blockTime"].as_i64();

        Ok(Some(FetchedTransaction {
            transaction,
            block_time,
        }))
    }

    /// 最新区块哈希 / Latest blockhash
    pub async fn get_latest_blockhash(&self) -> Result<Hash> {
        let result = self
            .call("getLatestBlockhash", json!([{ "commitment": "finalized" }]))
            .await?;
        let blockhash = result["value"]["blockhash"]
            .as_str()
            .ok_or_else(|| anyhow!("blockhash缺失 / Missing blockhash"))?;
        Ok(Hash::from_str(blockhash)?)
    }

    /// 账户是否存在 / Whether the account exists
    pub async fn get_account_info(&self, pubkey: &str) -> Result<Option<Value>> {
        let result = self
            .call(
                "getAccountInfo",
                json!([pubkey, { "encoding": "base64", "commitment": self.commitment }]),
            )
            .await?;
        let value = result["value"].clone();
        Ok(if value.is_null() { None } else { Some(value) })
    }

    /// 钱包的全部SPL代币账户，jsonParsed编码省去手解
    /// All SPL token accounts of a wallet, jsonParsed spares manual decoding
    pub async fn get_token_accounts_by_owner(
        &self,
        owner: &str,
    ) -> Result<Vec<TokenAccountBalance>> {
        let result = self
            .call(
                "getTokenAccountsByOwner",
                json!([
                    owner,
                    { "programId": crate::mango::accounts::TOKEN_PROGRAM_ID.to_string() },
                    { "encoding": "jsonParsed", "commitment": self.commitment }
                ]),
            )
            .await?;

        let mut balances = Vec::new();
        if let Some(items) = result["value"].as_array() {
            for item in items {
                let info = &item["account"]["data"]["parsed"]["info"];
                let (Some(pubkey), Some(mint), Some(ui_amount)) = (
                    item["pubkey"].as_str(),
                    info["mint"].as_str(),
                    info["tokenAmount"]["uiAmountString"].as_str(),
                ) else {
                    continue;
                };
                balances.push(TokenAccountBalance {
                    pubkey: pubkey.to_string(),
                    mint: mint.to_string(),
                    ui_amount: ui_amount.to_string(),
                });
            }
        }
        Ok(balances)
    }
}
