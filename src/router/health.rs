use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;

/// Health check 响应数据 / Health check response data
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(
    title = "HealthResponse",
    description = "健康检查响应数据",
    example = json!({
        "status": "ok",
        "version": "0.1.0"
    })
)]
pub struct HealthResponse {
    /// 服务状态 / Service status
    #[schema(example = "ok")]
    pub status: String,

    /// 服务版本 / Service version
    #[schema(example = "0.1.0")]
    pub version: String,
}

/// Health check 接口 / Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    summary = "健康检查",
    description = "检查服务是否正常运行",
    responses(
        (status = 200, description = "服务正常", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// 创建健康检查路由 / Create health check routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}
