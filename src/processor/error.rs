//! 网关错误类型
//!
//! 定义请求处理过程中可能发生的错误及其 HTTP 表示

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

/// 网关错误
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// 上游不可达或读取失败
    #[error("{0}")]
    Transport(String),

    /// 上游返回 401 / 403
    #[error("上游鉴权失败: {status}")]
    UpstreamAuth { status: u16, body: Value },

    /// 上游限流
    #[error("{message}")]
    RateLimited { message: String },

    /// 上游返回其他非 2xx 状态
    #[error("上游返回状态码 {status}")]
    UpstreamStatus { status: u16, body: Value },

    /// 上游响应无法解析
    #[error("上游响应格式错误: {0}")]
    UpstreamMalformed(String),

    /// 上游信封中只有错误消息
    #[error("{0}")]
    UpstreamMessage(String),

    /// 请求不合法
    #[error("请求不合法: {0}")]
    InvalidRequest(String),

    /// 分组或端点不存在
    #[error("未找到: {0}")]
    NotFound(String),
}

impl GatewayError {
    /// 获取对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Transport(_) => 500,
            GatewayError::UpstreamAuth { status, .. } => *status,
            GatewayError::RateLimited { .. } => 429,
            GatewayError::UpstreamStatus { status, .. } => *status,
            GatewayError::UpstreamMalformed(_) => 500,
            GatewayError::UpstreamMessage(_) => 500,
            GatewayError::InvalidRequest(_) => 400,
            GatewayError::NotFound(_) => 404,
        }
    }

    /// 获取错误类型字符串
    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::Transport(_) => "transport_error",
            GatewayError::UpstreamAuth { .. } => "upstream_auth_error",
            GatewayError::RateLimited { .. } => "rate_limit_error",
            GatewayError::UpstreamStatus { .. } => "upstream_status_error",
            GatewayError::UpstreamMalformed(_) => "upstream_malformed",
            GatewayError::UpstreamMessage(_) => "upstream_message",
            GatewayError::InvalidRequest(_) => "invalid_request_error",
            GatewayError::NotFound(_) => "not_found",
        }
    }

    /// 转换为 JSON 错误响应体
    ///
    /// 上游状态错误保留上游响应体；限流使用 OpenAI 错误格式；其余为 `{errorMessage}`。
    pub fn to_json(&self) -> Value {
        match self {
            GatewayError::UpstreamAuth { body, .. } | GatewayError::UpstreamStatus { body, .. } => {
                body.clone()
            }
            GatewayError::RateLimited { message } => json!({
                "error": {
                    "message": message,
                    "type": "rate_limit_error",
                    "param": "",
                    "code": "invalid_api_key"
                }
            }),
            other => json!({ "errorMessage": other.to_string() }),
        }
    }

    /// 记录带上下文的错误日志
    pub fn log_with_context(&self, request_id: &str, group: &str, model: &str) {
        tracing::warn!(
            request_id = %request_id,
            group = %group,
            model = %model,
            error_type = %self.error_type(),
            error_message = %self.to_string(),
            "[GATEWAY] 请求处理失败"
        );
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::Transport("x".into()).status_code(), 500);
        assert_eq!(
            GatewayError::UpstreamAuth {
                status: 403,
                body: json!({})
            }
            .status_code(),
            403
        );
        assert_eq!(
            GatewayError::RateLimited {
                message: "slow down".into()
            }
            .status_code(),
            429
        );
        assert_eq!(GatewayError::InvalidRequest("x".into()).status_code(), 400);
        assert_eq!(GatewayError::NotFound("x".into()).status_code(), 404);
    }

    #[test]
    fn test_transport_error_body() {
        let error = GatewayError::Transport("connection refused".to_string());
        assert_eq!(error.to_json(), json!({"errorMessage": "connection refused"}));
    }

    #[test]
    fn test_rate_limit_body() {
        let error = GatewayError::RateLimited {
            message: "quota exceeded".to_string(),
        };
        assert_eq!(
            error.to_json(),
            json!({
                "error": {
                    "message": "quota exceeded",
                    "type": "rate_limit_error",
                    "param": "",
                    "code": "invalid_api_key"
                }
            })
        );
    }

    #[test]
    fn test_upstream_body_preserved() {
        let body = json!({"error": {"message": "bad model"}});
        let error = GatewayError::UpstreamStatus {
            status: 404,
            body: body.clone(),
        };
        assert_eq!(error.to_json(), body);
    }

    #[tokio::test]
    async fn test_into_response() {
        let response = GatewayError::UpstreamMessage("余额不足".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"errorMessage": "余额不足"}));
    }
}
