// 事件模型 - Mango指令解码产物 / Event model - decoded Mango instructions
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use utoipa::ToSchema;

/// 事件种类 - 封闭枚举，新增种类必须更新所有match / Event kind - closed enum, adding a kind must update every match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum MangoEventType {
    TokenDeposit,
    TokenWithdraw,
    PerpTrade,
    SpotTrade,
    TokenConditionalSwap,
    Liquidation,
    PerpPlaceOrder,
    PerpSettlePnl,
    PerpSettleFees,
    PerpForceClosePosition,
    PerpCancelOrder,
    PerpCancelAllOrders,
    PerpFill,
}

impl MangoEventType {
    pub const ALL: [MangoEventType; 13] = [
        MangoEventType::TokenDeposit,
        MangoEventType::TokenWithdraw,
        MangoEventType::PerpTrade,
        MangoEventType::SpotTrade,
        MangoEventType::TokenConditionalSwap,
        MangoEventType::Liquidation,
        MangoEventType::PerpPlaceOrder,
        MangoEventType::PerpSettlePnl,
        MangoEventType::PerpSettleFees,
        MangoEventType::PerpForceClosePosition,
        MangoEventType::PerpCancelOrder,
        MangoEventType::PerpCancelAllOrders,
        MangoEventType::PerpFill,
    ];

    /// 对外的事件类型名 / Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            MangoEventType::TokenDeposit => "tokenDeposit",
            MangoEventType::TokenWithdraw => "tokenWithdraw",
            MangoEventType::PerpTrade => "perpTrade",
            MangoEventType::SpotTrade => "spotTrade",
            MangoEventType::TokenConditionalSwap => "tokenConditionalSwap",
            MangoEventType::Liquidation => "liquidation",
            MangoEventType::PerpPlaceOrder => "perpPlaceOrder",
            MangoEventType::PerpSettlePnl => "perpSettlePnl",
            MangoEventType::PerpSettleFees => "perpSettleFees",
            MangoEventType::PerpForceClosePosition => "perpForceClosePosition",
            MangoEventType::PerpCancelOrder => "perpCancelOrder",
            MangoEventType::PerpCancelAllOrders => "perpCancelAllOrders",
            MangoEventType::PerpFill => "perpFill",
        }
    }

    /// 存储键里的短编码 / Short code used in storage keys
    pub fn code(&self) -> &'static str {
        match self {
            MangoEventType::TokenDeposit => "td",
            MangoEventType::TokenWithdraw => "tw",
            MangoEventType::PerpTrade => "pt",
            MangoEventType::SpotTrade => "st",
            MangoEventType::TokenConditionalSwap => "cs",
            MangoEventType::Liquidation => "lq",
            MangoEventType::PerpPlaceOrder => "po",
            MangoEventType::PerpSettlePnl => "sp",
            MangoEventType::PerpSettleFees => "sf",
            MangoEventType::PerpForceClosePosition => "fp",
            MangoEventType::PerpCancelOrder => "co",
            MangoEventType::PerpCancelAllOrders => "ca",
            MangoEventType::PerpFill => "pf",
        }
    }
}

/// 订单方向 - 链上0/1编码 / Order side - encoded on-chain as 0/1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// 0 -> buy, 其余 -> sell / 0 -> buy, anything else -> sell
    pub fn from_u8(raw: u8) -> Self {
        if raw == 0 {
            Side::Buy
        } else {
            Side::Sell
        }
    }
}

/// 所有事件共有的字段 / Fields shared by every event
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    pub signature: String,
    pub mango_account: String,
    /// epoch 毫秒，取区块时间，无则取入库时间 / Epoch millis, block time or ingestion time
    pub timestamp: i64,
    pub group_pubkey: String,
    /// 交易签名者，按出现顺序 / Transaction signers in order
    pub signers: Vec<String>,
}

/// 存入 / Token deposit
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepositEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    /// 原生单位，线上是十进制字符串 / Native units, a decimal string on the wire
    #[serde_as(as = "DisplayFromStr")]
    #[schema(value_type = String)]
    pub amount: u64,
    pub token: String,
    pub owner: String,
    pub bank: String,
    pub vault: String,
    pub token_account: String,
}

/// 取出 / Token withdraw
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    #[serde_as(as = "DisplayFromStr")]
    #[schema(value_type = String)]
    pub amount: u64,
    pub token: String,
    pub owner: String,
    pub bank: String,
    pub vault: String,
    pub token_account: String,
}

/// 永续/现货成交类事件，两个种类共用一个结构 / Perp/spot trade, one struct for both kinds
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TradeEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perp_market: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serum_market: Option<String>,
    pub side: Side,
    pub price: String,
    pub quantity: String,
    pub client_order_id: String,
    pub order_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce_only: Option<bool>,
    pub token: String,
    pub owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_base_quantity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_quote_quantity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_timestamp: Option<String>,
    pub limit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_orders: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_trade_behavior: Option<String>,
}

/// 条件换币触发 / Token conditional swap trigger
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwapEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub buy_token_index: u16,
    pub sell_token_index: u16,
    pub buy_token: String,
    pub sell_token: String,
    pub owner: String,
    pub buy_bank: String,
    pub sell_bank: String,
    pub max_buy_token_to_release: String,
    pub max_sell_token_to_release: String,
}

/// 清算 / Liquidation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub liqor: String,
    pub liqee: String,
    pub asset_token_index: u16,
    pub liab_token_index: u16,
    pub asset_token: String,
    pub liab_token: String,
    pub asset_bank: String,
    pub liab_bank: String,
    pub max_liab_transfer: String,
}

/// 永续下单 / Perp place order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerpPlaceOrderEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub perp_market: String,
    pub side: Side,
    pub price: String,
    pub quantity: String,
    pub client_order_id: String,
    pub order_type: String,
    pub reduce_only: bool,
    pub token: String,
    pub owner: String,
    pub max_base_quantity: String,
    pub max_quote_quantity: String,
    pub expiry_timestamp: String,
    pub limit: String,
}

/// 永续盈亏结算 / Perp PnL settlement
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerpSettlePnlEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub perp_market: String,
    pub token: String,
    pub account_a: String,
    pub account_b: String,
}

/// 永续手续费结算 / Perp fee settlement
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerpSettleFeesEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub perp_market: String,
    pub token: String,
    pub fee_account: String,
}

/// 永续强制平仓 / Perp force close position
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerpForceClosePositionEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub perp_market: String,
    pub token: String,
    pub liqor: String,
    pub liqor_owner: String,
    pub base_transfer: String,
}

/// 永续撤单 / Perp cancel order
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerpCancelOrderEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub perp_market: String,
    /// 128位订单号超出JSON安全整数，线上走字符串 / 128-bit order ids exceed JSON safe integers, strings on the wire
    #[serde_as(as = "DisplayFromStr")]
    #[schema(value_type = String)]
    pub order_id: i128,
    #[serde_as(as = "DisplayFromStr")]
    #[schema(value_type = String)]
    pub client_order_id: u64,
    pub token: String,
    pub owner: String,
}

/// 永续全部撤单 / Perp cancel all orders
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerpCancelAllOrdersEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub perp_market: String,
    pub limit: String,
    pub token: String,
    pub owner: String,
}

/// 永续成交回报 / Perp fill
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerpFillEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub perp_market: String,
    pub maker: String,
    pub taker: String,
    #[serde_as(as = "DisplayFromStr")]
    #[schema(value_type = String)]
    pub maker_order_id: u128,
    #[serde_as(as = "DisplayFromStr")]
    #[schema(value_type = String)]
    pub taker_order_id: u128,
    pub maker_fee: String,
    pub taker_fee: String,
    pub price: String,
    pub quantity: String,
    pub token: String,
}

/// 所有Mango事件的统一枚举 / Unified enum for all Mango events
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "eventType")]
pub enum MangoEvent {
    #[serde(rename = "tokenDeposit")]
    TokenDeposit(DepositEvent),
    #[serde(rename = "tokenWithdraw")]
    TokenWithdraw(WithdrawEvent),
    #[serde(rename = "perpTrade")]
    PerpTrade(TradeEvent),
    #[serde(rename = "spotTrade")]
    SpotTrade(TradeEvent),
    #[serde(rename = "tokenConditionalSwap")]
    TokenConditionalSwap(SwapEvent),
    #[serde(rename = "liquidation")]
    Liquidation(LiquidationEvent),
    #[serde(rename = "perpPlaceOrder")]
    PerpPlaceOrder(PerpPlaceOrderEvent),
    #[serde(rename = "perpSettlePnl")]
    PerpSettlePnl(PerpSettlePnlEvent),
    #[serde(rename = "perpSettleFees")]
    PerpSettleFees(PerpSettleFeesEvent),
    #[serde(rename = "perpForceClosePosition")]
    PerpForceClosePosition(PerpForceClosePositionEvent),
    #[serde(rename = "perpCancelOrder")]
    PerpCancelOrder(PerpCancelOrderEvent),
    #[serde(rename = "perpCancelAllOrders")]
    PerpCancelAllOrders(PerpCancelAllOrdersEvent),
    #[serde(rename = "perpFill")]
    PerpFill(PerpFillEvent),
}

impl MangoEvent {
    pub fn event_type(&self) -> MangoEventType {
        match self {
            MangoEvent::TokenDeposit(_) => MangoEventType::TokenDeposit,
            MangoEvent::TokenWithdraw(_) => MangoEventType::TokenWithdraw,
            MangoEvent::PerpTrade(_) => MangoEventType::PerpTrade,
            MangoEvent::SpotTrade(_) => MangoEventType::SpotTrade,
            MangoEvent::TokenConditionalSwap(_) => MangoEventType::TokenConditionalSwap,
            MangoEvent::Liquidation(_) => MangoEventType::Liquidation,
            MangoEvent::PerpPlaceOrder(_) => MangoEventType::PerpPlaceOrder,
            MangoEvent::PerpSettlePnl(_) => MangoEventType::PerpSettlePnl,
            MangoEvent::PerpSettleFees(_) => MangoEventType::PerpSettleFees,
            MangoEvent::PerpForceClosePosition(_) => MangoEventType::PerpForceClosePosition,
            MangoEvent::PerpCancelOrder(_) => MangoEventType::PerpCancelOrder,
            MangoEvent::PerpCancelAllOrders(_) => MangoEventType::PerpCancelAllOrders,
            MangoEvent::PerpFill(_) => MangoEventType::PerpFill,
        }
    }

    /// 共有字段 / Shared fields
    pub fn meta(&self) -> &EventMeta {
        match self {
            MangoEvent::TokenDeposit(e) => &e.meta,
            MangoEvent::TokenWithdraw(e) => &e.meta,
            MangoEvent::PerpTrade(e) => &e.meta,
            MangoEvent::SpotTrade(e) => &e.meta,
            MangoEvent::TokenConditionalSwap(e) => &e.meta,
            MangoEvent::Liquidation(e) => &e.meta,
            MangoEvent::PerpPlaceOrder(e) => &e.meta,
            MangoEvent::PerpSettlePnl(e) => &e.meta,
            MangoEvent::PerpSettleFees(e) => &e.meta,
            MangoEvent::PerpForceClosePosition(e) => &e.meta,
            MangoEvent::PerpCancelOrder(e) => &e.meta,
            MangoEvent::PerpCancelAllOrders(e) => &e.meta,
            MangoEvent::PerpFill(e) => &e.meta,
        }
    }

    pub fn signature(&self) -> &str {
        &self.meta().signature
    }

    pub fn mango_account(&self) -> &str {
        &self.meta().mango_account
    }

    pub fn timestamp(&self) -> i64 {
        self.meta().timestamp
    }

    pub fn signers(&self) -> &[String] {
        &self.meta().signers
    }

    pub fn is_deposit(&self) -> bool {
        matches!(self, MangoEvent::TokenDeposit(_))
    }

    pub fn is_withdraw(&self) -> bool {
        matches!(self, MangoEvent::TokenWithdraw(_))
    }

    pub fn is_trade(&self) -> bool {
        matches!(self, MangoEvent::PerpTrade(_) | MangoEvent::SpotTrade(_))
    }
}
