// HTTP 响应工具 - 业务状态写在响应体里，传输层保持200
// HTTP response helpers - business status lives in the body, transport stays 200
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

/// 成功响应，向载荷里并入 status:200 / Success response, merges status:200 into the payload
pub fn success(payload: Value) -> Json<Value> {
    with_status(200, payload)
}

/// 任意业务状态的响应，status 字段并入载荷 / Response with any business status merged into the payload
pub fn with_status(status: u16, mut payload: Value) -> Json<Value> {
    if let Value::Object(ref mut map) = payload {
        map.insert("status".to_string(), json!(status));
    }
    Json(payload)
}

/// 错误响应 {error, status} / Error response {error, status}
pub fn failure(status: u16, message: impl Into<String>) -> Json<Value> {
    with_status(status, json!({ "error": message.into() }))
}

/// 消息响应 {message, status} / Message response {message, status}
pub fn message(status: u16, message: impl Into<String>) -> Json<Value> {
    with_status(status, json!({ "message": message.into() }))
}

/// 鉴权失败是唯一走传输层状态码的情况 / Auth failure is the only case on the transport status
pub fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        with_status(401, json!({ "error": "Unauthorized" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_embeds_status() {
        let Json(body) = success(json!({"balance": "100"}));
        assert_eq!(body["status"], 200);
        assert_eq!(body["balance"], "100");
    }

    #[test]
    fn test_failure_shape() {
        let Json(body) = failure(400, "no balance");
        assert_eq!(body["status"], 400);
        assert_eq!(body["error"], "no balance");
    }

    #[test]
    fn test_unauthorized_transport_code() {
        let (code, Json(body)) = unauthorized();
        assert_eq!(code, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], 401);
    }
}
