// 事件存储集成测试
// Event store integration test
//
// 这是一个独立的集成测试,不依赖其他测试文件
// This is a standalone integration test, independent of other test files

use mango_bots_server::db::{RocksDbStorage, Saved};
use mango_bots_server::mango::events::{
    DepositEvent, EventMeta, MangoEvent, MangoEventType, WithdrawEvent,
};
use std::sync::Arc;
use uuid::Uuid;

/// 创建临时测试数据库
fn create_test_storage() -> (RocksDbStorage, String) {
    let temp_dir = std::env::temp_dir().join(format!("event_store_test_{}", Uuid::new_v4()));
    let path = temp_dir.to_string_lossy().to_string();
    let storage = RocksDbStorage::open_at(&path).expect("Failed to open test DB");
    (storage, path)
}

/// 清理临时测试数据库
fn cleanup_test_db(path: &str) {
    let _ = std::fs::remove_dir_all(path);
}

fn meta(signature: &str, mango_account: &str, timestamp: i64, signers: &[&str]) -> EventMeta {
    EventMeta {
        signature: signature.to_string(),
        mango_account: mango_account.to_string(),
        timestamp,
        group_pubkey: "78b8f4cGCwmZ9ysPFMWLaLTkkaYnUjwMJYStWe5RTSSX".to_string(),
        signers: signers.iter().map(|s| s.to_string()).collect(),
    }
}

fn deposit(signature: &str, mango_account: &str, timestamp: i64, signers: &[&str]) -> MangoEvent {
    MangoEvent::TokenDeposit(DepositEvent {
        meta: meta(signature, mango_account, timestamp, signers),
        amount: 1_000_000,
        token: "USDC".to_string(),
        owner: signers.first().unwrap_or(&"owner").to_string(),
        bank: "bank".to_string(),
        vault: "vault".to_string(),
        token_account: "ta".to_string(),
    })
}

fn withdraw(signature: &str, mango_account: &str, timestamp: i64, signers: &[&str]) -> MangoEvent {
    MangoEvent::TokenWithdraw(WithdrawEvent {
        meta: meta(signature, mango_account, timestamp, signers),
        amount: 500_000,
        token: "USDC".to_string(),
        owner: signers.first().unwrap_or(&"owner").to_string(),
        bank: "bank".to_string(),
        vault: "vault".to_string(),
        token_account: "ta".to_string(),
    })
}

#[test]
fn test_duplicate_save_is_idempotent() {
    let (storage, path) = create_test_storage();
    let events = storage.create_event_storage();

    let event = deposit("sigA", "acct1", 1_700_000_000_000, &["ownerA"]);
    assert_eq!(events.save(&event).unwrap(), Saved::Inserted);
    assert_eq!(events.save(&event).unwrap(), Saved::Duplicate);

    let stored = events.get_by_account("acct1", None).unwrap();
    assert_eq!(stored.len(), 1);
    assert!(events.exists(MangoEventType::TokenDeposit, "sigA").unwrap());

    cleanup_test_db(&path);
    println!("✅ test_duplicate_save_is_idempotent passed");
}

#[test]
fn test_same_signature_different_kind_both_stored() {
    let (storage, path) = create_test_storage();
    let events = storage.create_event_storage();

    // 一笔交易可以同时产生存入和取出 / One transaction can carry both a deposit and a withdraw
    let sig = "sigMixed";
    assert_eq!(
        events
            .save(&deposit(sig, "acct1", 1_700_000_000_000, &["ownerA"]))
            .unwrap(),
        Saved::Inserted
    );
    assert_eq!(
        events
            .save(&withdraw(sig, "acct1", 1_700_000_000_000, &["ownerA"]))
            .unwrap(),
        Saved::Inserted
    );

    let stored = events.get_by_account("acct1", None).unwrap();
    assert_eq!(stored.len(), 2);

    cleanup_test_db(&path);
    println!("✅ test_same_signature_different_kind_both_stored passed");
}

#[test]
fn test_get_by_account_newest_first() {
    let (storage, path) = create_test_storage();
    let events = storage.create_event_storage();

    let base = 1_700_000_000_000i64;
    events
        .save(&deposit("sig1", "acct1", base, &["ownerA"]))
        .unwrap();
    events
        .save(&withdraw("sig2", "acct1", base + 2_000, &["ownerA"]))
        .unwrap();
    events
        .save(&deposit("sig3", "acct1", base + 1_000, &["ownerA"]))
        .unwrap();
    // 别的账户不应混进来 / Another account must not leak in
    events
        .save(&deposit("sig4", "acct2", base + 3_000, &["ownerB"]))
        .unwrap();

    let stored = events.get_by_account("acct1", None).unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[0].signature(), "sig2");
    assert_eq!(stored[1].signature(), "sig3");
    assert_eq!(stored[2].signature(), "sig1");

    let limited = events.get_by_account("acct1", Some(2)).unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].signature(), "sig2");

    cleanup_test_db(&path);
    println!("✅ test_get_by_account_newest_first passed");
}

#[test]
fn test_get_by_owner_indexes_every_signer() {
    let (storage, path) = create_test_storage();
    let events = storage.create_event_storage();

    events
        .save(&deposit(
            "sigMulti",
            "acct1",
            1_700_000_000_000,
            &["ownerA", "ownerB"],
        ))
        .unwrap();

    let by_a = events.get_by_owner("ownerA", None).unwrap();
    let by_b = events.get_by_owner("ownerB", None).unwrap();
    let by_c = events.get_by_owner("ownerC", None).unwrap();
    assert_eq!(by_a.len(), 1);
    assert_eq!(by_b.len(), 1);
    assert!(by_c.is_empty());

    cleanup_test_db(&path);
    println!("✅ test_get_by_owner_indexes_every_signer passed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_event_inserts_once() {
    let (storage, path) = create_test_storage();
    let events = Arc::new(storage.create_event_storage());

    // webhook和日志流两条路径可能同时送达同一事件，只能有一次Inserted
    // The webhook and log-feed paths can deliver the same event at once, only one Inserted allowed
    let mut handles = Vec::new();
    for _ in 0..8 {
        let events = Arc::clone(&events);
        handles.push(tokio::spawn(async move {
            events
                .save(&deposit("sigRace", "acct1", 1_700_000_000_000, &["ownerA"]))
                .unwrap()
        }));
    }

    let mut inserted = 0;
    for handle in handles {
        if handle.await.unwrap() == Saved::Inserted {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 1);
    assert_eq!(events.get_by_account("acct1", None).unwrap().len(), 1);

    cleanup_test_db(&path);
    println!("✅ test_concurrent_same_event_inserts_once passed");
}

#[test]
fn test_record_event_bumps_totals_and_daily() {
    let (storage, path) = create_test_storage();
    let accounts = storage.create_account_storage();

    // 2023-11-14T22:13:20Z
    let ts = 1_700_000_000_000i64;
    accounts
        .record_event("acct1", MangoEventType::TokenDeposit, ts)
        .unwrap();
    accounts
        .record_event("acct1", MangoEventType::PerpTrade, ts + 1_000)
        .unwrap();
    accounts
        .record_event("acct1", MangoEventType::TokenWithdraw, ts + 2_000)
        .unwrap();

    let stats = accounts.get_stats("acct1").unwrap();
    assert_eq!(stats.events_total, 3);
    assert_eq!(stats.deposits_total, 1);
    assert_eq!(stats.withdrawals_total, 1);
    assert_eq!(stats.trades_total, 1);
    assert_eq!(stats.last_event_at, ts + 2_000);

    let daily = accounts
        .get_daily_stats("acct1", "2023-11-14", "2023-11-14")
        .unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].events, 3);
    assert_eq!(daily[0].trades, 1);

    cleanup_test_db(&path);
    println!("✅ test_record_event_bumps_totals_and_daily passed");
}
