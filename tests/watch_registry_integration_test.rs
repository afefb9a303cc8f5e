// 账户监听注册表集成测试
// Account watch registry integration test
//
// webhook指向不可达地址，推送失败只记日志，不影响本地语义
// The webhook points at an unreachable address, failed pushes only log and local semantics stand

use mango_bots_server::config::WebhookConfig;
use mango_bots_server::db::RocksDbStorage;
use mango_bots_server::watch::{AccountWatchRegistry, WebhookClient};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

fn create_test_registry() -> (Arc<AccountWatchRegistry>, String) {
    let temp_dir = std::env::temp_dir().join(format!("watch_registry_test_{}", Uuid::new_v4()));
    let path = temp_dir.to_string_lossy().to_string();
    let storage = RocksDbStorage::open_at(&path).expect("Failed to open test DB");
    let webhook = WebhookClient::new(&WebhookConfig {
        webhook_id: "test".to_string(),
        api_url: "http://127.0.0.1:1".to_string(),
        api_key: "test".to_string(),
        callback_url: "http://127.0.0.1:1/accountsListener".to_string(),
        shared_secret: "secret".to_string(),
    });
    let registry = AccountWatchRegistry::new(Arc::new(storage.create_account_storage()), webhook);
    (Arc::new(registry), path)
}

fn cleanup_test_db(path: &str) {
    let _ = std::fs::remove_dir_all(path);
}

#[tokio::test]
async fn test_register_and_deactivate_lifecycle() {
    let (registry, path) = create_test_registry();

    let entry = registry.register("ownerA", "acct1").await.unwrap();
    assert_eq!(entry.account_number, 1);
    assert!(entry.active);
    assert!(registry.is_watched("acct1").await);

    // 重复注册返回已有条目，不再分配编号 / Re-registering returns the existing entry, no new number
    let again = registry.register("ownerA", "acct1").await.unwrap();
    assert_eq!(again.account_number, 1);

    let second = registry.register("ownerA", "acct2").await.unwrap();
    assert_eq!(second.account_number, 2);

    registry.deactivate("acct1").await.unwrap();
    assert!(!registry.is_watched("acct1").await);
    assert!(registry.is_watched("acct2").await);

    let active = registry.active_accounts_of("ownerA").await.unwrap();
    assert_eq!(active, vec!["acct2".to_string()]);

    // 停用的条目还在，编号保留 / The deactivated entry remains, its number stays taken
    let entries = registry.entries_of("ownerA").unwrap();
    assert_eq!(entries.len(), 2);
    let third = registry.register("ownerA", "acct3").await.unwrap();
    assert_eq!(third.account_number, 3);

    cleanup_test_db(&path);
    println!("✅ test_register_and_deactivate_lifecycle passed");
}

#[tokio::test]
async fn test_next_account_number_starts_at_one() {
    let (registry, path) = create_test_registry();

    assert_eq!(registry.next_account_number("fresh").await.unwrap(), 1);
    registry.register("fresh", "acctX").await.unwrap();
    assert_eq!(registry.next_account_number("fresh").await.unwrap(), 2);
    // 别的owner从头计数 / Another owner counts from the start
    assert_eq!(registry.next_account_number("other").await.unwrap(), 1);

    cleanup_test_db(&path);
    println!("✅ test_next_account_number_starts_at_one passed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_allocates_unique_numbers() {
    let (registry, path) = create_test_registry();

    let mut handles = Vec::new();
    for i in 0..8 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry
                .register("ownerA", &format!("acct{}", i))
                .await
                .unwrap()
                .account_number
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        numbers.insert(handle.await.unwrap());
    }

    assert_eq!(numbers.len(), 8);
    assert_eq!(numbers, (1..=8).collect::<HashSet<u32>>());

    cleanup_test_db(&path);
    println!("✅ test_concurrent_registration_allocates_unique_numbers passed");
}

#[tokio::test]
async fn test_warm_up_restores_active_set() {
    let (registry, path) = create_test_registry();
    registry.register("ownerA", "acct1").await.unwrap();
    registry.register("ownerA", "acct2").await.unwrap();
    registry.deactivate("acct1").await.unwrap();

    // 重开存储，模拟重启 / Reopen the storage to simulate a restart
    drop(registry);
    let storage = RocksDbStorage::open_at(&path).expect("Failed to reopen test DB");
    let webhook = WebhookClient::new(&WebhookConfig {
        webhook_id: "test".to_string(),
        api_url: "http://127.0.0.1:1".to_string(),
        api_key: "test".to_string(),
        callback_url: "http://127.0.0.1:1/accountsListener".to_string(),
        shared_secret: "secret".to_string(),
    });
    let restarted =
        AccountWatchRegistry::new(Arc::new(storage.create_account_storage()), webhook);
    restarted.warm_up().await.unwrap();

    assert!(!restarted.is_watched("acct1").await);
    assert!(restarted.is_watched("acct2").await);

    cleanup_test_db(&path);
    println!("✅ test_warm_up_restores_active_set passed");
}
