//! 服务器工具函数
//!
//! 包含健康检查、就绪提示与响应构建等公共工具函数。

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// 就绪提示
pub const READY_HINT: &str = "service chatgate is ready";

/// 就绪检查端点响应
pub async fn ready() -> &'static str {
    READY_HINT
}

/// 健康检查端点响应
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 构建 SSE 响应
pub fn build_sse_response(body: Body) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .body(body)
        .unwrap_or_else(|e| {
            tracing::error!("Failed to build SSE response: {}", e);
            fallback_response()
        })
}

/// 按上游状态码与内容类型构建原样转发的响应
pub fn build_relay_response(
    status: StatusCode,
    content_type: Option<HeaderValue>,
    body: Body,
) -> Response {
    let content_type =
        content_type.unwrap_or_else(|| HeaderValue::from_static("application/json"));

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(body)
        .unwrap_or_else(|e| {
            tracing::error!("Failed to build relay response: {}", e);
            fallback_response()
        })
}

fn fallback_response() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_response_headers() {
        let response = build_sse_response(Body::from("data: [DONE]\n\n"));

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers["x-accel-buffering"], "no");
    }

    #[test]
    fn test_relay_response_defaults_to_json() {
        let response = build_relay_response(StatusCode::BAD_GATEWAY, None, Body::empty());

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn test_health_body() {
        let response = health().await.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
