//! 上游错误映射
//!
//! 将上游 HTTP 状态与信封错误码转换为 [`GatewayError`]。

use super::error::GatewayError;
use super::RequestContext;
use crate::models::UpstreamEnvelope;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// 解析 JSON 响应体，失败时返回空对象
pub fn decode_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|_| json!({}))
}

/// 从响应体中提取可读的错误消息
fn error_message(body: &Value) -> Option<String> {
    body.get("msg")
        .and_then(Value::as_str)
        .or_else(|| body.pointer("/error/message").and_then(Value::as_str))
        .map(str::to_string)
}

/// 非 2xx 状态映射
///
/// 401 / 403 记录调用方身份后透传；429 转换为限流错误；其余透传状态码和响应体。
pub fn classify_status(status: u16, body: &[u8], identity: &str) -> GatewayError {
    let decoded = decode_body(body);

    match status {
        401 => {
            tracing::error!("[UPSTREAM] account {} is deactivated", identity);
            GatewayError::UpstreamAuth {
                status,
                body: decoded,
            }
        }
        403 => {
            tracing::error!("[UPSTREAM] account {} is forbidden", identity);
            GatewayError::UpstreamAuth {
                status,
                body: decoded,
            }
        }
        429 => GatewayError::RateLimited {
            message: error_message(&decoded).unwrap_or_else(|| "Too Many Requests".to_string()),
        },
        _ => GatewayError::UpstreamStatus {
            status,
            body: decoded,
        },
    }
}

/// 检查上游响应状态，非 2xx 时读取响应体并映射为错误
pub async fn check_response(
    resp: reqwest::Response,
    ctx: &RequestContext,
) -> Result<reqwest::Response, GatewayError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.bytes().await.unwrap_or_default();
    let error = classify_status(status.as_u16(), &body, &ctx.identity());
    error.log_with_context(&ctx.request_id, &ctx.group, &ctx.model);
    Err(error)
}

/// 解包上游信封
///
/// - 无法解析 → `UpstreamMalformed`
/// - `error_code == 429` → `RateLimited`
/// - 缺少 `data` 但有 `msg` → `UpstreamMessage`
pub fn unwrap_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<T, GatewayError> {
    let envelope: UpstreamEnvelope<T> = serde_json::from_slice(body)
        .map_err(|e| GatewayError::UpstreamMalformed(e.to_string()))?;

    if envelope.error_code == Some(429) {
        return Err(GatewayError::RateLimited {
            message: envelope.msg.unwrap_or_default(),
        });
    }

    match (envelope.data, envelope.msg) {
        (Some(data), _) => Ok(data),
        (None, Some(msg)) => Err(GatewayError::UpstreamMessage(msg)),
        (None, None) => Err(GatewayError::UpstreamMalformed(
            "响应中缺少 data 字段".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UpstreamCompletion;

    #[test]
    fn test_auth_errors_pass_through() {
        let body = br#"{"error":"invalid credential"}"#;

        let error = classify_status(401, body, "sk-a***");
        assert_eq!(error.status_code(), 401);
        assert_eq!(error.to_json(), json!({"error": "invalid credential"}));

        let error = classify_status(403, body, "sk-a***");
        assert!(matches!(error, GatewayError::UpstreamAuth { status: 403, .. }));
    }

    #[test]
    fn test_http_429_becomes_rate_limit() {
        let error = classify_status(429, br#"{"msg":"too fast"}"#, "x");
        assert_eq!(error.status_code(), 429);
        assert_eq!(error.to_json()["error"]["type"], "rate_limit_error");
        assert_eq!(error.to_json()["error"]["message"], "too fast");
    }

    #[test]
    fn test_other_status_undecodable_body() {
        let error = classify_status(502, b"<html>bad gateway</html>", "x");
        assert_eq!(error.status_code(), 502);
        assert_eq!(error.to_json(), json!({}));
    }

    #[test]
    fn test_envelope_rate_limit() {
        let body = br#"{"error_code":429,"msg":"quota exhausted","data":null}"#;
        let error = unwrap_envelope::<UpstreamCompletion>(body).unwrap_err();

        assert_eq!(error.status_code(), 429);
        assert_eq!(
            error.to_json(),
            json!({
                "error": {
                    "message": "quota exhausted",
                    "type": "rate_limit_error",
                    "param": "",
                    "code": "invalid_api_key"
                }
            })
        );
    }

    #[test]
    fn test_envelope_message_only() {
        let body = br#"{"error_code":1,"msg":"model offline"}"#;
        let error = unwrap_envelope::<UpstreamCompletion>(body).unwrap_err();

        assert_eq!(error.status_code(), 500);
        assert_eq!(error.to_json(), json!({"errorMessage": "model offline"}));
    }

    #[test]
    fn test_envelope_malformed() {
        let error = unwrap_envelope::<UpstreamCompletion>(b"not json").unwrap_err();
        assert!(matches!(error, GatewayError::UpstreamMalformed(_)));

        let error = unwrap_envelope::<UpstreamCompletion>(b"{}").unwrap_err();
        assert!(matches!(error, GatewayError::UpstreamMalformed(_)));
    }

    #[test]
    fn test_envelope_data() {
        let data: UpstreamCompletion =
            unwrap_envelope(br#"{"error_code":0,"data":{"message":"hi"}}"#).unwrap();
        assert_eq!(data.message.as_deref(), Some("hi"));
    }
}
