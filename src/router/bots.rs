// 机器人生命周期HTTP接口 / Bot lifecycle HTTP endpoints
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::mango::accounts::{build_unsigned_transaction, derive_associated_token_account};
use crate::util::amounts::ui_to_native;
use crate::util::response::{failure, message, success};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub owner: String,
    /// UI金额 / UI amount
    #[schema(value_type = f64)]
    pub balance_a: serde_json::Number,
    /// token符号，如USDC / Token symbol, e.g. USDC
    pub mint_a: String,
    #[schema(value_type = f64)]
    pub balance_b: serde_json::Number,
    pub mint_b: String,
    /// 机器人运行费，SOL的UI金额字符串 / Bot running fee, SOL UI amount string
    pub fees_amount: String,
    pub delegate: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub owner: String,
    pub bot_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendTransactionRequest {
    /// base64编码的已签名交易 / Base64-encoded signed transaction
    pub transaction: String,
}

/// 钱包SPL余额 / Wallet SPL balances
#[utoipa::path(
    get,
    path = "/getBalances",
    tag = "bots",
    params(("user" = String, Query, description = "钱包地址 / Wallet address")),
    responses((status = 200, description = "余额列表，业务状态在响应体里"))
)]
pub async fn get_balances(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Json<Value> {
    if Pubkey::from_str(&query.user).is_err() {
        return failure(400, "Invalid user address");
    }

    match state.client.get_account_info(&query.user).await {
        Ok(Some(_)) => {}
        Ok(None) => return failure(404, "Ensure you have SOL on your wallet"),
        Err(e) => {
            error!("❌ getBalances failed: {}", e);
            return failure(500, e.to_string());
        }
    }

    match state.client.get_token_accounts_by_owner(&query.user).await {
        Ok(accounts) if accounts.is_empty() => message(200, "No token accounts found"),
        Ok(accounts) => {
            let balances: Vec<Value> = accounts
                .iter()
                .map(|a| json!({ "mint": a.mint, "balance": a.ui_amount }))
                .collect();
            success(json!({ "balances": balances }))
        }
        Err(e) => {
            error!("❌ getBalances failed: {}", e);
            failure(500, e.to_string())
        }
    }
}

/// 用户全部机器人及近期事件 / All bots of a user with recent events
#[utoipa::path(
    get,
    path = "/getBotData",
    tag = "bots",
    params(("user" = String, Query, description = "钱包地址 / Wallet address")),
    responses((status = 200, description = "机器人列表，业务状态在响应体里"))
)]
pub async fn get_bot_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Json<Value> {
    if query.user.is_empty() {
        return failure(400, "User address is required");
    }

    match state.bots.user_bots_data(&query.user) {
        Ok(bots) if bots.is_empty() => failure(404, "No active bots found for this user"),
        Ok(bots) => success(json!({ "data": bots })),
        Err(e) => {
            error!("❌ Error fetching user bots and events: {}", e);
            failure(500, e.to_string())
        }
    }
}

/// 构建开户加入金的未签名交易 / Build the unsigned account-open plus funding transaction
#[utoipa::path(
    post,
    path = "/deposit",
    tag = "bots",
    request_body = DepositRequest,
    responses((status = 200, description = "未签名交易，编号冲突时业务状态409"))
)]
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DepositRequest>,
) -> Json<Value> {
    let Ok(owner) = Pubkey::from_str(&req.owner) else {
        return failure(400, "Invalid owner address");
    };
    let Ok(delegate) = Pubkey::from_str(&req.delegate) else {
        return failure(400, "Invalid delegate address");
    };
    let snapshot = match state.group.snapshot().await {
        Ok(s) => s,
        Err(e) => return failure(500, e.to_string()),
    };

    let account_number = match state.registry.next_account_number(&req.owner).await {
        Ok(n) => n,
        Err(e) => return failure(500, e.to_string()),
    };
    let mango_account = state.builder.derive_account(&owner, account_number);

    // PDA已存在说明编号被别的并发deposit抢了 / An existing PDA means a concurrent deposit raced the number
    match state.client.get_account_info(&mango_account.to_string()).await {
        Ok(Some(_)) => return message(409, "Account number conflict, please try again"),
        Ok(None) => {}
        Err(e) => return failure(500, e.to_string()),
    }

    let fee_lamports = match ui_to_native(&req.fees_amount, 9) {
        Ok(v) => v,
        Err(e) => return failure(400, e.to_string()),
    };

    let mut instructions = Vec::new();
    match state.builder.account_create(&owner, &mango_account, account_number) {
        Ok(ix) => instructions.push(ix),
        Err(e) => return failure(500, e.to_string()),
    }
    instructions.push(state.builder.fee_transfer(&owner, &delegate, fee_lamports));
    match state.builder.account_set_delegate(&owner, &mango_account, &delegate) {
        Ok(ix) => instructions.push(ix),
        Err(e) => return failure(500, e.to_string()),
    }

    for (balance, symbol) in [(&req.balance_a, &req.mint_a), (&req.balance_b, &req.mint_b)] {
        match deposit_instruction(&state, &snapshot, &owner, &mango_account, balance, symbol) {
            Ok(Some(ix)) => instructions.push(ix),
            Ok(None) => {}
            Err(resp) => return resp,
        }
    }

    let blockhash = match state.client.get_latest_blockhash().await {
        Ok(h) => h,
        Err(e) => return failure(500, e.to_string()),
    };
    match build_unsigned_transaction(&instructions, &owner, blockhash) {
        Ok(transaction) => success(json!({
            "transaction": transaction,
            "botId": account_number,
            "mangoAccount": mango_account.to_string(),
        })),
        Err(e) => {
            error!("❌ Error creating deposit transaction: {}", e);
            failure(500, e.to_string())
        }
    }
}

/// 单腿入金指令，金额为零返回None / One funding leg, zero amount yields None
fn deposit_instruction(
    state: &Arc<AppState>,
    snapshot: &crate::mango::group::GroupSnapshot,
    owner: &Pubkey,
    mango_account: &Pubkey,
    balance: &serde_json::Number,
    symbol: &str,
) -> Result<Option<Instruction>, Json<Value>> {
    let token = snapshot
        .token_by_symbol(symbol)
        .map_err(|e| failure(400, e.to_string()))?;
    let amount =
        ui_to_native(&balance.to_string(), token.decimals).map_err(|e| failure(400, e.to_string()))?;
    if amount == 0 {
        return Ok(None);
    }

    let incomplete = || failure(500, format!("Incomplete metadata for token {}", symbol));
    let bank = token.banks.first().ok_or_else(incomplete)?;
    let vault = token.vault.as_ref().ok_or_else(incomplete)?;
    let oracle = token.oracle.as_ref().ok_or_else(incomplete)?;

    let parse = |s: &str| Pubkey::from_str(s).map_err(|_| incomplete());
    let mint = parse(&token.mint)?;
    let token_account = derive_associated_token_account(owner, &mint);

    state
        .builder
        .token_deposit(
            owner,
            mango_account,
            &parse(bank)?,
            &parse(vault)?,
            &parse(oracle)?,
            &token_account,
            amount,
        )
        .map(Some)
        .map_err(|e| failure(500, e.to_string()))
}

/// 构建清仓加销户的未签名交易 / Build the unsigned withdraw-all plus close-account transaction
#[utoipa::path(
    post,
    path = "/withdraw",
    tag = "bots",
    request_body = WithdrawRequest,
    responses((status = 200, description = "未签名交易，无可取余额时业务状态400"))
)]
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WithdrawRequest>,
) -> Json<Value> {
    let Ok(owner) = Pubkey::from_str(&req.owner) else {
        return failure(400, "Invalid owner address");
    };
    let Ok(account_number) = req.bot_id.parse::<u32>() else {
        return failure(400, "Invalid botId");
    };
    let snapshot = match state.group.snapshot().await {
        Ok(s) => s,
        Err(e) => return failure(500, e.to_string()),
    };

    let mango_account = state.builder.derive_account(&owner, account_number);
    match state.client.get_account_info(&mango_account.to_string()).await {
        Ok(Some(_)) => {}
        Ok(None) => return message(400, "No withdrawable balances available"),
        Err(e) => return failure(500, e.to_string()),
    }

    // 入过金的token才需要清仓腿 / Only tokens ever deposited need a withdrawal leg
    let events = match state
        .event_storage
        .get_by_account(&mango_account.to_string(), None)
    {
        Ok(events) => events,
        Err(e) => return failure(500, e.to_string()),
    };
    let mut symbols: Vec<String> = Vec::new();
    for event in &events {
        if let crate::mango::events::MangoEvent::TokenDeposit(e) = event {
            if !symbols.contains(&e.token) {
                symbols.push(e.token.clone());
            }
        }
    }
    if symbols.is_empty() {
        return message(400, "No withdrawable balances available");
    }

    let mut instructions = Vec::new();
    for symbol in &symbols {
        let token = match snapshot.token_by_symbol(symbol) {
            Ok(t) => t,
            Err(e) => return failure(500, e.to_string()),
        };
        let incomplete = || failure(500, format!("Incomplete metadata for token {}", symbol));
        let (Some(bank), Some(vault), Some(oracle)) =
            (token.banks.first(), token.vault.as_ref(), token.oracle.as_ref())
        else {
            return incomplete();
        };
        let parse = |s: &str| Pubkey::from_str(s).map_err(|_| incomplete());
        let (bank, vault, oracle, mint) = match (parse(bank), parse(vault), parse(oracle), parse(&token.mint)) {
            (Ok(b), Ok(v), Ok(o), Ok(m)) => (b, v, o, m),
            _ => return incomplete(),
        };
        let token_account = derive_associated_token_account(&owner, &mint);

        // u64::MAX表示提取全部可用余额 / u64::MAX withdraws the full available balance
        match state.builder.token_withdraw(
            &owner,
            &mango_account,
            &bank,
            &vault,
            &oracle,
            &token_account,
            u64::MAX,
        ) {
            Ok(ix) => instructions.push(ix),
            Err(e) => return failure(500, e.to_string()),
        }
    }

    match state.builder.account_close(&owner, &mango_account) {
        Ok(ix) => instructions.push(ix),
        Err(e) => return failure(500, e.to_string()),
    }

    let blockhash = match state.client.get_latest_blockhash().await {
        Ok(h) => h,
        Err(e) => return failure(500, e.to_string()),
    };
    match build_unsigned_transaction(&instructions, &owner, blockhash) {
        Ok(transaction) => success(json!({ "transaction": transaction })),
        Err(e) => {
            error!("❌ Error creating withdraw transaction: {}", e);
            failure(500, e.to_string())
        }
    }
}

/// 提交已签名交易并等确认，入库在后台进行 / Submit a signed transaction and wait for confirmation, ingestion runs in the background
#[utoipa::path(
    post,
    path = "/sendTransaction",
    tag = "bots",
    request_body = SendTransactionRequest,
    responses((status = 200, description = "确认后的签名"))
)]
pub async fn send_transaction(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendTransactionRequest>,
) -> Json<Value> {
    match state.pipeline.send_and_ingest(&req.transaction).await {
        Ok(signature) => success(json!({ "signature": signature })),
        Err(e) => {
            error!("❌ Error sending transaction: {}", e);
            failure(500, e.to_string())
        }
    }
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/getBalances", get(get_balances))
        .route("/getBotData", get(get_bot_data))
        .route("/deposit", post(deposit))
        .route("/withdraw", post(withdraw))
        .route("/sendTransaction", post(send_transaction))
}
