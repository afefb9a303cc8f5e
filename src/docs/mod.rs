use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{OpenApi, ToSchema};

/// 业务状态响应格式（用于 Swagger 文档）
/// 传输层固定200，业务状态在 status 字段里
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(
    title = "StatusResponse",
    description = "业务状态响应格式，status 字段承载业务状态码",
    example = json!({
        "status": 200,
        "message": "ok"
    })
)]
pub struct StatusResponse {
    /// 业务状态码：200=成功，其他=错误
    #[schema(example = 200)]
    pub status: u32,

    /// 可选的提示消息
    pub message: Option<String>,
}

/// 错误响应格式（用于 Swagger 文档）
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(title = "ErrorApiResponse", description = "错误响应格式")]
pub struct ErrorApiResponse {
    /// 业务状态码：非200表示错误
    pub status: u32,

    /// 错误消息
    pub error: String,

    /// 错误时附带数据为空
    pub data: Option<Value>,
}

/// OpenAPI 文档配置
#[derive(OpenApi)]
#[openapi(
    paths(
        // 路由函数列表
        crate::router::health::health,
        crate::router::bots::get_balances,
        crate::router::bots::get_bot_data,
        crate::router::bots::deposit,
        crate::router::bots::withdraw,
        crate::router::bots::send_transaction,
        crate::router::listener::accounts_listener,
    ),
    components(
        schemas(
            // 请求与响应结构体列表
            crate::router::health::HealthResponse,
            crate::router::bots::DepositRequest,
            crate::router::bots::WithdrawRequest,
            crate::router::bots::SendTransactionRequest,
            crate::bots::BotData,
            crate::bots::BotPnl,
            crate::mango::events::MangoEvent,
            StatusResponse,
            ErrorApiResponse,
        )
    ),
    tags(
        (name = "system", description = "系统相关接口"),
        (name = "bots", description = "机器人账户与交易接口"),
        (name = "listener", description = "Webhook回调接口"),
    ),
    info(
        title = "Mango Bots Server API",
        version = "0.1.0",
        description = "Mango 交易机器人后端 API 文档"
    )
)]
pub struct ApiDoc;
