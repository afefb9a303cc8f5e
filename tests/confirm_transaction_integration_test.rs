// 交易确认集成测试 - 本地mock RPC
// Transaction confirmation integration test - local mock RPC
//
// 执行失败的交易也会到达confirmed，getSignatureStatuses的err才是成败
// Failed transactions reach confirmed too, the err field of getSignatureStatuses decides

use axum::routing::post;
use axum::{Json, Router};
use mango_bots_server::mango::accounts::build_unsigned_transaction;
use mango_bots_server::solana::confirm::{confirm_transaction, ConfirmPolicy};
use mango_bots_server::solana::SolanaClient;
use serde_json::{json, Value};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;
use std::time::Duration;

const MOCK_SIGNATURE: &str = "MockSig1111111111111111111111111111111111111";

/// 起一个固定应答的JSON-RPC mock，返回base URL
/// Spawn a canned-answer JSON-RPC mock, returns the base URL
async fn spawn_rpc_mock(status: Value) -> String {
    let app = Router::new().route(
        "/",
        post(move |Json(request): Json<Value>| {
            let status = status.clone();
            async move {
                let result = match request["method"].as_str().unwrap_or_default() {
                    "sendTransaction" => json!(MOCK_SIGNATURE),
                    "getSignatureStatuses" => {
                        json!({ "context": { "slot": 1 }, "value": [status] })
                    }
                    _ => Value::Null,
                };
                Json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

fn unsigned_tx() -> String {
    let payer = Pubkey::new_unique();
    let ix = system_instruction::transfer(&payer, &Pubkey::new_unique(), 1);
    build_unsigned_transaction(&[ix], &payer, Hash::default()).unwrap()
}

fn policy() -> ConfirmPolicy {
    ConfirmPolicy {
        timeout: Duration::from_secs(5),
        max_retries: 1,
    }
}

#[tokio::test]
async fn test_on_chain_failure_fails_confirmation() {
    let url = spawn_rpc_mock(json!({
        "slot": 1,
        "confirmations": null,
        "confirmationStatus": "confirmed",
        "err": { "InstructionError": [0, { "Custom": 1 }] }
    }))
    .await;
    let client = SolanaClient::new(url, "confirmed".to_string()).unwrap();

    let result = confirm_transaction(&client, &policy(), &unsigned_tx()).await;
    let error = result.unwrap_err().to_string();
    assert!(
        error.contains("Transaction failed"),
        "unexpected error: {}",
        error
    );
    println!("✅ test_on_chain_failure_fails_confirmation passed");
}

#[tokio::test]
async fn test_confirmed_without_err_succeeds() {
    let url = spawn_rpc_mock(json!({
        "slot": 1,
        "confirmations": 10,
        "confirmationStatus": "finalized",
        "err": null
    }))
    .await;
    let client = SolanaClient::new(url, "confirmed".to_string()).unwrap();

    let signature = confirm_transaction(&client, &policy(), &unsigned_tx())
        .await
        .unwrap();
    assert_eq!(signature, MOCK_SIGNATURE);
    println!("✅ test_confirmed_without_err_succeeds passed");
}
