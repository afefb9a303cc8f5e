// 指令解码器 - anchor判别符注册表 + 逐指令的账户角色表
// Instruction decoder - anchor discriminator registry + per-instruction account role tables
use borsh::BorshDeserialize;
use sha2::{Digest, Sha256};
use solana_sdk::instruction::CompiledInstruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::mango::events::*;
use crate::mango::group::{GroupCache, GroupError, GroupSnapshot};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("缺少账户 / Missing account: {kind} needs {role}")]
    MissingAccount { kind: &'static str, role: &'static str },

    #[error("账户索引越界 / Account index out of range: {0}")]
    AccountIndexOutOfRange(u8),

    #[error("参数反序列化失败 / Args deserialization failed: {0}")]
    BadArgs(#[from] std::io::Error),

    #[error(transparent)]
    Group(#[from] GroupError),
}

/// 可解码的指令种类 / Decodable instruction kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstructionKind {
    TokenDeposit,
    TokenWithdraw,
    PerpPlaceOrder,
    PerpPlaceOrderPegged,
    Serum3PlaceOrder,
    TokenConditionalSwapTrigger,
    LiquidateTokenAndToken,
    PerpSettlePnl,
    PerpSettleFees,
    PerpForceClosePosition,
    PerpCancelOrder,
    PerpCancelAllOrders,
    PerpFill,
}

/// anchor判别符: sha256("global:<name>")前8字节 / Anchor discriminator: first 8 bytes of sha256("global:<name>")
pub(crate) fn anchor_discriminator(name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("global:{}", name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// 判别符到指令种类的映射，启动时构建一次
/// Discriminator to kind map, built once at startup
pub struct InstructionRegistry {
    by_discriminator: HashMap<[u8; 8], InstructionKind>,
}

impl InstructionRegistry {
    pub fn new() -> Self {
        let entries: [(&str, InstructionKind); 14] = [
            ("token_deposit", InstructionKind::TokenDeposit),
            ("token_withdraw", InstructionKind::TokenWithdraw),
            ("perp_place_order", InstructionKind::PerpPlaceOrder),
            ("perp_place_order_v2", InstructionKind::PerpPlaceOrder),
            ("perp_place_order_pegged", InstructionKind::PerpPlaceOrderPegged),
            ("serum3_place_order", InstructionKind::Serum3PlaceOrder),
            (
                "token_conditional_swap_trigger",
                InstructionKind::TokenConditionalSwapTrigger,
            ),
            (
                "liquidate_token_and_token",
                InstructionKind::LiquidateTokenAndToken,
            ),
            ("perp_settle_pnl", InstructionKind::PerpSettlePnl),
            ("perp_settle_fees", InstructionKind::PerpSettleFees),
            (
                "perp_force_close_position",
                InstructionKind::PerpForceClosePosition,
            ),
            ("perp_cancel_order", InstructionKind::PerpCancelOrder),
            ("perp_cancel_all_orders", InstructionKind::PerpCancelAllOrders),
            ("perp_fill", InstructionKind::PerpFill),
        ];
        let by_discriminator = entries
            .into_iter()
            .map(|(name, kind)| (anchor_discriminator(name), kind))
            .collect();
        Self { by_discriminator }
    }

    fn lookup(&self, data: &[u8]) -> Option<InstructionKind> {
        if data.len() < 8 {
            return None;
        }
        let mut disc = [0u8; 8];
        disc.copy_from_slice(&data[..8]);
        self.by_discriminator.get(&disc).copied()
    }
}

impl Default for InstructionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------- 账户角色表，顺序来自链上指令定义，只按名查不靠猜 ----------
// ---------- Account role tables, order fixed by the on-chain instruction, looked up by name ----------

const TOKEN_DEPOSIT_ROLES: &[&str] = &[
    "group", "mangoAccount", "owner", "bank", "vault", "oracle", "tokenAccount", "tokenAuthority",
];
const TOKEN_WITHDRAW_ROLES: &[&str] = &[
    "group", "mangoAccount", "owner", "bank", "vault", "oracle", "tokenAccount",
];
const PERP_ORDER_ROLES: &[&str] = &["group", "mangoAccount", "owner", "perpMarket"];
const PERP_TRADE_ROLES: &[&str] = &[
    "group", "mangoAccount", "owner", "perpMarket", "bids", "asks", "eventQueue", "oracle",
];
const SERUM3_PLACE_ORDER_ROLES: &[&str] = &[
    "group", "mangoAccount", "owner", "openOrders", "serumMarket",
];
const SWAP_TRIGGER_ROLES: &[&str] = &[
    "group", "mangoAccount", "owner", "buyBank", "sellBank", "buyOracle", "sellOracle",
];
const LIQUIDATION_ROLES: &[&str] = &[
    "group", "mangoAccount", "assetBank", "liabBank", "assetOracle", "liabOracle", "liqor",
    "liqorOwner", "liqee",
];
const PERP_SETTLE_PNL_ROLES: &[&str] = &[
    "group", "mangoAccount", "perpMarket", "accountA", "accountB", "oracle",
];
const PERP_SETTLE_FEES_ROLES: &[&str] = &["group", "mangoAccount", "perpMarket", "feeAccount"];
const PERP_FORCE_CLOSE_ROLES: &[&str] = &[
    "group", "mangoAccount", "perpMarket", "oracle", "liqor", "liqorOwner",
];
const PERP_FILL_ROLES: &[&str] = &["group", "mangoAccount", "perpMarket", "maker", "taker"];

// ---------- 参数borsh布局 / Borsh arg layouts ----------

#[derive(BorshDeserialize)]
struct TokenDepositRaw {
    amount: u64,
}

#[derive(BorshDeserialize)]
struct TokenWithdrawRaw {
    amount: u64,
    #[allow(dead_code)]
    allow_borrow: bool,
}

#[derive(BorshDeserialize)]
struct PerpPlaceOrderRaw {
    side: u8,
    price_lots: i64,
    max_base_lots: i64,
    max_quote_lots: i64,
    client_order_id: u64,
    order_type: u8,
    reduce_only: bool,
    expiry_timestamp: u64,
    limit: u8,
}

#[derive(BorshDeserialize)]
struct PerpPlaceOrderPeggedRaw {
    side: u8,
    price_offset_lots: i64,
    #[allow(dead_code)]
    peg_limit: i64,
    max_base_lots: i64,
    max_quote_lots: i64,
    client_order_id: u64,
    order_type: u8,
    reduce_only: bool,
    expiry_timestamp: u64,
    limit: u8,
}

#[derive(BorshDeserialize)]
struct Serum3PlaceOrderRaw {
    side: u8,
    limit_price: u64,
    max_base_qty: u64,
    max_native_quote_qty_including_fees: u64,
    self_trade_behavior: u8,
    order_type: u8,
    client_order_id: u64,
    limit: u16,
}

#[derive(BorshDeserialize)]
struct TokenConditionalSwapTriggerRaw {
    max_buy_token_to_release: u64,
    max_sell_token_to_release: u64,
    buy_token_index: u16,
    sell_token_index: u16,
}

#[derive(BorshDeserialize)]
struct LiquidateTokenAndTokenRaw {
    asset_token_index: u16,
    liab_token_index: u16,
    max_liab_transfer: u128,
}

#[derive(BorshDeserialize)]
struct PerpForceClosePositionRaw {
    base_transfer: i64,
}

#[derive(BorshDeserialize)]
struct PerpCancelOrderRaw {
    order_id: i128,
    client_order_id: u64,
}

#[derive(BorshDeserialize)]
struct PerpCancelAllOrdersRaw {
    limit: u8,
}

#[derive(BorshDeserialize)]
struct PerpFillRaw {
    maker_order_id: u128,
    taker_order_id: u128,
    maker_fee: i64,
    taker_fee: i64,
    price: i64,
    quantity: i64,
}

fn order_type_name(raw: u8) -> String {
    match raw {
        0 => "limit",
        1 => "immediateOrCancel",
        2 => "postOnly",
        3 => "market",
        4 => "postOnlySlide",
        _ => "unknown",
    }
    .to_string()
}

fn self_trade_behavior_name(raw: u8) -> String {
    match raw {
        0 => "decrementTake",
        1 => "cancelProvide",
        2 => "abortTransaction",
        _ => "unknown",
    }
    .to_string()
}

/// 单条指令引用的账户视图 / View of the accounts one instruction references
struct AccountsView<'a> {
    keys: &'a [Pubkey],
    indexes: &'a [u8],
    kind: &'static str,
}

impl<'a> AccountsView<'a> {
    fn role(&self, roles: &[&'static str], name: &'static str) -> Result<String, DecodeError> {
        let pos = roles
            .iter()
            .position(|r| *r == name)
            .ok_or(DecodeError::MissingAccount { kind: self.kind, role: name })?;
        let idx = *self
            .indexes
            .get(pos)
            .ok_or(DecodeError::MissingAccount { kind: self.kind, role: name })?;
        let key = self
            .keys
            .get(idx as usize)
            .ok_or(DecodeError::AccountIndexOutOfRange(idx))?;
        Ok(key.to_string())
    }
}

/// 指令解码器，group快照在构建时注入 / Instruction decoder, group snapshot injected at construction
pub struct InstructionDecoder {
    registry: InstructionRegistry,
    group: GroupCache,
}

impl InstructionDecoder {
    pub fn new(group: GroupCache) -> Self {
        Self {
            registry: InstructionRegistry::new(),
            group,
        }
    }

    /// 解码一笔交易的全部可识别指令
    /// Decode every recognizable instruction of one transaction
    ///
    /// 前两条指令是compute budget前置，跳过。单条指令失败只记日志。
    /// The first two instructions are compute budget setup, skipped. A failing instruction is only logged.
    pub async fn decode(
        &self,
        transaction: &VersionedTransaction,
        signature: &str,
        block_time: Option<i64>,
    ) -> Result<Vec<MangoEvent>, GroupError> {
        // 快照缺失是致命错误，不能静默产出无符号事件
        // A missing snapshot is fatal, never silently emit symbol-less events
        let snapshot = self.group.snapshot().await?;

        let message = &transaction.message;
        let keys = message.static_account_keys();
        let num_signers = message.header().num_required_signatures as usize;
        let signers: Vec<String> = keys
            .iter()
            .take(num_signers)
            .map(|k| k.to_string())
            .collect();

        let timestamp = block_time
            .map(|t| t * 1000)
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

        let mut events = Vec::new();
        for ix in message.instructions().iter().skip(2) {
            let Some(kind) = self.registry.lookup(&ix.data) else {
                continue;
            };
            match self.decode_one(&snapshot, kind, ix, keys, signature, timestamp, &signers) {
                Ok(event) => events.push(event),
                Err(DecodeError::Group(GroupError::NotInitialized)) => {
                    return Err(GroupError::NotInitialized)
                }
                Err(e) => {
                    warn!(
                        "⚠️ Skipping undecodable instruction, signature: {}, error: {}",
                        signature, e
                    );
                }
            }
        }

        debug!(
            "📦 Decoded {} events from transaction {}",
            events.len(),
            signature
        );
        Ok(events)
    }

    fn decode_one(
        &self,
        snapshot: &GroupSnapshot,
        kind: InstructionKind,
        ix: &CompiledInstruction,
        keys: &[Pubkey],
        signature: &str,
        timestamp: i64,
        signers: &[String],
    ) -> Result<MangoEvent, DecodeError> {
        let kind_name = match kind {
            InstructionKind::TokenDeposit => "tokenDeposit",
            InstructionKind::TokenWithdraw => "tokenWithdraw",
            InstructionKind::PerpPlaceOrder => "perpPlaceOrder",
            InstructionKind::PerpPlaceOrderPegged => "perpTrade",
            InstructionKind::Serum3PlaceOrder => "spotTrade",
            InstructionKind::TokenConditionalSwapTrigger => "tokenConditionalSwap",
            InstructionKind::LiquidateTokenAndToken => "liquidation",
            InstructionKind::PerpSettlePnl => "perpSettlePnl",
            InstructionKind::PerpSettleFees => "perpSettleFees",
            InstructionKind::PerpForceClosePosition => "perpForceClosePosition",
            InstructionKind::PerpCancelOrder => "perpCancelOrder",
            InstructionKind::PerpCancelAllOrders => "perpCancelAllOrders",
            InstructionKind::PerpFill => "perpFill",
        };
        let view = AccountsView {
            keys,
            indexes: &ix.accounts,
            kind: kind_name,
        };
        let args = &ix.data[8..];

        let meta = |view: &AccountsView, roles: &[&'static str]| -> Result<EventMeta, DecodeError> {
            Ok(EventMeta {
                signature: signature.to_string(),
                mango_account: view.role(roles, "mangoAccount")?,
                timestamp,
                group_pubkey: view.role(roles, "group")?,
                signers: signers.to_vec(),
            })
        };

        match kind {
            InstructionKind::TokenDeposit => {
                let roles = TOKEN_DEPOSIT_ROLES;
                let raw = TokenDepositRaw::deserialize(&mut &args[..])?;
                let bank = view.role(roles, "bank")?;
                let token = snapshot.token_by_bank(&bank)?.symbol.clone();
                Ok(MangoEvent::TokenDeposit(DepositEvent {
                    meta: meta(&view, roles)?,
                    amount: raw.amount,
                    token,
                    owner: view.role(roles, "owner")?,
                    bank,
                    vault: view.role(roles, "vault")?,
                    token_account: view.role(roles, "tokenAccount")?,
                }))
            }
            InstructionKind::TokenWithdraw => {
                let roles = TOKEN_WITHDRAW_ROLES;
                let raw = TokenWithdrawRaw::deserialize(&mut &args[..])?;
                let bank = view.role(roles, "bank")?;
                let token = snapshot.token_by_bank(&bank)?.symbol.clone();
                Ok(MangoEvent::TokenWithdraw(WithdrawEvent {
                    meta: meta(&view, roles)?,
                    amount: raw.amount,
                    token,
                    owner: view.role(roles, "owner")?,
                    bank,
                    vault: view.role(roles, "vault")?,
                    token_account: view.role(roles, "tokenAccount")?,
                }))
            }
            InstructionKind::PerpPlaceOrder => {
                let roles = PERP_ORDER_ROLES;
                let raw = PerpPlaceOrderRaw::deserialize(&mut &args[..])?;
                let perp_market = view.role(roles, "perpMarket")?;
                let token = snapshot.perp_market(&perp_market)?.name.clone();
                Ok(MangoEvent::PerpPlaceOrder(PerpPlaceOrderEvent {
                    meta: meta(&view, roles)?,
                    perp_market,
                    side: Side::from_u8(raw.side),
                    price: raw.price_lots.to_string(),
                    quantity: raw.max_base_lots.to_string(),
                    client_order_id: raw.client_order_id.to_string(),
                    order_type: order_type_name(raw.order_type),
                    reduce_only: raw.reduce_only,
                    token,
                    owner: view.role(roles, "owner")?,
                    max_base_quantity: raw.max_base_lots.to_string(),
                    max_quote_quantity: raw.max_quote_lots.to_string(),
                    expiry_timestamp: raw.expiry_timestamp.to_string(),
                    limit: raw.limit.to_string(),
                }))
            }
            InstructionKind::PerpPlaceOrderPegged => {
                let roles = PERP_TRADE_ROLES;
                let raw = PerpPlaceOrderPeggedRaw::deserialize(&mut &args[..])?;
                let perp_market = view.role(roles, "perpMarket")?;
                let token = snapshot.perp_market(&perp_market)?.name.clone();
                Ok(MangoEvent::PerpTrade(TradeEvent {
                    meta: meta(&view, roles)?,
                    perp_market: Some(perp_market),
                    serum_market: None,
                    side: Side::from_u8(raw.side),
                    price: raw.price_offset_lots.to_string(),
                    quantity: raw.max_base_lots.to_string(),
                    client_order_id: raw.client_order_id.to_string(),
                    order_type: order_type_name(raw.order_type),
                    reduce_only: Some(raw.reduce_only),
                    token,
                    owner: view.role(roles, "owner")?,
                    max_base_quantity: Some(raw.max_base_lots.to_string()),
                    max_quote_quantity: Some(raw.max_quote_lots.to_string()),
                    expiry_timestamp: Some(raw.expiry_timestamp.to_string()),
                    limit: raw.limit.to_string(),
                    open_orders: None,
                    self_trade_behavior: None,
                }))
            }
            InstructionKind::Serum3PlaceOrder => {
                let roles = SERUM3_PLACE_ORDER_ROLES;
                let raw = Serum3PlaceOrderRaw::deserialize(&mut &args[..])?;
                let serum_market = view.role(roles, "serumMarket")?;
                let token = snapshot.serum_market(&serum_market)?.name.clone();
                Ok(MangoEvent::SpotTrade(TradeEvent {
                    meta: meta(&view, roles)?,
                    perp_market: None,
                    serum_market: Some(serum_market),
                    side: Side::from_u8(raw.side),
                    price: raw.limit_price.to_string(),
                    quantity: raw.max_base_qty.to_string(),
                    client_order_id: raw.client_order_id.to_string(),
                    order_type: order_type_name(raw.order_type),
                    reduce_only: None,
                    token,
                    owner: view.role(roles, "owner")?,
                    max_base_quantity: Some(raw.max_base_qty.to_string()),
                    max_quote_quantity: Some(
                        raw.max_native_quote_qty_including_fees.to_string(),
                    ),
                    expiry_timestamp: None,
                    limit: raw.limit.to_string(),
                    open_orders: Some(view.role(roles, "openOrders")?),
                    self_trade_behavior: Some(self_trade_behavior_name(raw.self_trade_behavior)),
                }))
            }
            InstructionKind::TokenConditionalSwapTrigger => {
                let roles = SWAP_TRIGGER_ROLES;
                let raw = TokenConditionalSwapTriggerRaw::deserialize(&mut &args[..])?;
                let buy_token = snapshot.token_by_index(raw.buy_token_index)?.symbol.clone();
                let sell_token = snapshot.token_by_index(raw.sell_token_index)?.symbol.clone();
                Ok(MangoEvent::TokenConditionalSwap(SwapEvent {
                    meta: meta(&view, roles)?,
                    buy_token_index: raw.buy_token_index,
                    sell_token_index: raw.sell_token_index,
                    buy_token,
                    sell_token,
                    owner: view.role(roles, "owner")?,
                    buy_bank: view.role(roles, "buyBank")?,
                    sell_bank: view.role(roles, "sellBank")?,
                    max_buy_token_to_release: raw.max_buy_token_to_release.to_string(),
                    max_sell_token_to_release: raw.max_sell_token_to_release.to_string(),
                }))
            }
            InstructionKind::LiquidateTokenAndToken => {
                let roles = LIQUIDATION_ROLES;
                let raw = LiquidateTokenAndTokenRaw::deserialize(&mut &args[..])?;
                let asset_token = snapshot.token_by_index(raw.asset_token_index)?.symbol.clone();
                let liab_token = snapshot.token_by_index(raw.liab_token_index)?.symbol.clone();
                Ok(MangoEvent::Liquidation(LiquidationEvent {
                    meta: meta(&view, roles)?,
                    liqor: view.role(roles, "liqor")?,
                    liqee: view.role(roles, "liqee")?,
                    asset_token_index: raw.asset_token_index,
                    liab_token_index: raw.liab_token_index,
                    asset_token,
                    liab_token,
                    asset_bank: view.role(roles, "assetBank")?,
                    liab_bank: view.role(roles, "liabBank")?,
                    max_liab_transfer: raw.max_liab_transfer.to_string(),
                }))
            }
            InstructionKind::PerpSettlePnl => {
                let roles = PERP_SETTLE_PNL_ROLES;
                let perp_market = view.role(roles, "perpMarket")?;
                let token = snapshot.perp_market(&perp_market)?.name.clone();
                Ok(MangoEvent::PerpSettlePnl(PerpSettlePnlEvent {
                    meta: meta(&view, roles)?,
                    perp_market,
                    token,
                    account_a: view.role(roles, "accountA")?,
                    account_b: view.role(roles, "accountB")?,
                }))
            }
            InstructionKind::PerpSettleFees => {
                let roles = PERP_SETTLE_FEES_ROLES;
                let perp_market = view.role(roles, "perpMarket")?;
                let token = snapshot.perp_market(&perp_market)?.name.clone();
                Ok(MangoEvent::PerpSettleFees(PerpSettleFeesEvent {
                    meta: meta(&view, roles)?,
                    perp_market,
                    token,
                    fee_account: view.role(roles, "feeAccount")?,
                }))
            }
            InstructionKind::PerpForceClosePosition => {
                let roles = PERP_FORCE_CLOSE_ROLES;
                let raw = PerpForceClosePositionRaw::deserialize(&mut &args[..])?;
                let perp_market = view.role(roles, "perpMarket")?;
                let token = snapshot.perp_market(&perp_market)?.name.clone();
                Ok(MangoEvent::PerpForceClosePosition(PerpForceClosePositionEvent {
                    meta: meta(&view, roles)?,
                    perp_market,
                    token,
                    liqor: view.role(roles, "liqor")?,
                    liqor_owner: view.role(roles, "liqorOwner")?,
                    base_transfer: raw.base_transfer.to_string(),
                }))
            }
            InstructionKind::PerpCancelOrder => {
                let roles = PERP_ORDER_ROLES;
                let raw = PerpCancelOrderRaw::deserialize(&mut &args[..])?;
                let perp_market = view.role(roles, "perpMarket")?;
                let token = snapshot.perp_market(&perp_market)?.name.clone();
                Ok(MangoEvent::PerpCancelOrder(PerpCancelOrderEvent {
                    meta: meta(&view, roles)?,
                    perp_market,
                    order_id: raw.order_id,
                    client_order_id: raw.client_order_id,
                    token,
                    owner: view.role(roles, "owner")?,
                }))
            }
            InstructionKind::PerpCancelAllOrders => {
                let roles = PERP_ORDER_ROLES;
                let raw = PerpCancelAllOrdersRaw::deserialize(&mut &args[..])?;
                let perp_market = view.role(roles, "perpMarket")?;
                let token = snapshot.perp_market(&perp_market)?.name.clone();
                Ok(MangoEvent::PerpCancelAllOrders(PerpCancelAllOrdersEvent {
                    meta: meta(&view, roles)?,
                    perp_market,
                    limit: raw.limit.to_string(),
                    token,
                    owner: view.role(roles, "owner")?,
                }))
            }
            InstructionKind::PerpFill => {
                let roles = PERP_FILL_ROLES;
                let raw = PerpFillRaw::deserialize(&mut &args[..])?;
                let perp_market = view.role(roles, "perpMarket")?;
                let token = snapshot.perp_market(&perp_market)?.name.clone();
                Ok(MangoEvent::PerpFill(PerpFillEvent {
                    meta: meta(&view, roles)?,
                    perp_market,
                    maker: view.role(roles, "maker")?,
                    taker: view.role(roles, "taker")?,
                    maker_order_id: raw.maker_order_id,
                    taker_order_id: raw.taker_order_id,
                    maker_fee: raw.maker_fee.to_string(),
                    taker_fee: raw.taker_fee.to_string(),
                    price: raw.price.to_string(),
                    quantity: raw.quantity.to_string(),
                    token,
                }))
            }
        }
    }
}
