// 事件模型测试 / Event model tests
use std::collections::HashSet;

use crate::mango::events::*;

fn meta() -> EventMeta {
    EventMeta {
        signature: "sig".to_string(),
        mango_account: "acct".to_string(),
        timestamp: 1_700_000_000_000,
        group_pubkey: "group".to_string(),
        signers: vec!["owner".to_string()],
    }
}

#[test]
fn test_event_kind_count_is_pinned() {
    // 新增种类必须同步调这里和所有match分支 / A new kind must update this and every match arm
    assert_eq!(MangoEventType::ALL.len(), 13);
}

#[test]
fn test_codes_and_names_are_unique() {
    let codes: HashSet<_> = MangoEventType::ALL.iter().map(|t| t.code()).collect();
    let names: HashSet<_> = MangoEventType::ALL.iter().map(|t| t.as_str()).collect();
    assert_eq!(codes.len(), 13);
    assert_eq!(names.len(), 13);
    assert!(codes.iter().all(|c| c.len() == 2));
}

#[test]
fn test_serde_tag_round_trip() {
    let event = MangoEvent::TokenDeposit(DepositEvent {
        meta: meta(),
        amount: u64::MAX,
        token: "USDC".to_string(),
        owner: "owner".to_string(),
        bank: "bank".to_string(),
        vault: "vault".to_string(),
        token_account: "ta".to_string(),
    });

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["eventType"], "tokenDeposit");
    assert_eq!(json["mangoAccount"], "acct");
    // u64::MAX不能丢精度，所以是字符串 / u64::MAX must not lose precision, hence a string
    assert_eq!(json["amount"], "18446744073709551615");

    let back: MangoEvent = serde_json::from_value(json).unwrap();
    assert!(back.is_deposit());
    assert_eq!(back.signature(), "sig");
}

#[test]
fn test_trade_event_shared_by_both_kinds() {
    let trade = TradeEvent {
        meta: meta(),
        perp_market: Some("pm".to_string()),
        serum_market: None,
        side: Side::Buy,
        price: "1".to_string(),
        quantity: "2".to_string(),
        client_order_id: "3".to_string(),
        order_type: "limit".to_string(),
        reduce_only: Some(false),
        token: "SOL-PERP".to_string(),
        owner: "owner".to_string(),
        max_base_quantity: None,
        max_quote_quantity: None,
        expiry_timestamp: None,
        limit: "10".to_string(),
        open_orders: None,
        self_trade_behavior: None,
    };

    let perp = MangoEvent::PerpTrade(trade.clone());
    let spot = MangoEvent::SpotTrade(trade);
    assert_eq!(perp.event_type().as_str(), "perpTrade");
    assert_eq!(spot.event_type().as_str(), "spotTrade");
    assert!(perp.is_trade() && spot.is_trade());

    let json = serde_json::to_value(&perp).unwrap();
    assert_eq!(json["side"], "buy");
    // 未设置的可选字段不出现在wire上 / Unset optional fields stay off the wire
    assert!(json.get("serumMarket").is_none());
}
