// Webhook回调接收 - 被监听账户的交易推送从这里入库
// Webhook callback receiver - pushed transactions for watched accounts enter here
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::util::response::unauthorized;
use crate::AppState;

/// 单个签名最多轮询次数 / Polling attempts per signature
const CONFIRMATION_ATTEMPTS: u32 = 10;

/// 账户活动回调 / Account activity callback
#[utoipa::path(
    post,
    path = "/accountsListener",
    tag = "listener",
    responses(
        (status = 200, description = "处理结果，见响应体success字段"),
        (status = 401, description = "鉴权失败")
    )
)]
pub async fn accounts_listener(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == state.config.webhook.shared_secret)
        .unwrap_or(false);
    if !authorized {
        warn!("⚠️ Unauthorized accountsListener call");
        return unauthorized().into_response();
    }

    let signatures = extract_signatures(&body);
    info!("📨 Webhook delivered {} signatures", signatures.len());

    let mut confirmed = Vec::new();
    for signature in &signatures {
        if state
            .pipeline
            .await_confirmation(signature, CONFIRMATION_ATTEMPTS)
            .await
        {
            confirmed.push(signature.clone());
        }
    }

    if confirmed.is_empty() {
        return Json(json!({
            "success": false,
            "message": "No transactions were confirmed",
        }))
        .into_response();
    }

    for signature in &confirmed {
        if let Err(e) = state.pipeline.confirm_and_ingest(signature).await {
            warn!("⚠️ Failed to ingest {}: {}", signature, e);
        }
    }

    Json(json!({
        "success": true,
        "message": "Transactions processed successfully",
    }))
    .into_response()
}

/// 回调体是交易数组，签名平铺取出 / The body is a transaction array, signatures are flattened out
fn extract_signatures(body: &Value) -> Vec<String> {
    let Some(items) = body.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| item.get("transaction")?.get("signatures")?.as_array())
        .flatten()
        .filter_map(|s| s.as_str().map(str::to_string))
        .collect()
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/accountsListener", post(accounts_listener))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_signatures_flattens_transactions() {
        let body = json!([
            { "transaction": { "signatures": ["sig1", "sig2"] } },
            { "transaction": { "signatures": ["sig3"] } },
            { "other": true },
        ]);
        assert_eq!(extract_signatures(&body), vec!["sig1", "sig2", "sig3"]);
    }

    #[test]
    fn test_extract_signatures_tolerates_non_array() {
        assert!(extract_signatures(&json!({ "foo": 1 })).is_empty());
    }
}
