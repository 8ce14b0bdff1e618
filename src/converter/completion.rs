//! 非流式补全结果整形
//!
//! 将上游信封中的 `data` 整形为 OpenAI `chat.completion` 对象。

use crate::models::UpstreamCompletion;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// OpenAI Chat Completion 响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub system_fingerprint: Option<String>,
    pub usage: Option<Value>,
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: CompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub role: String,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<Value>,
}

pub(crate) fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// finish_reason 统一为字符串，数字按十进制输出
pub fn finish_reason_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// 整形上游补全结果
///
/// 上游未给出模型名时使用请求中的模型。
pub fn reshape_completion(data: UpstreamCompletion, requested_model: &str) -> ChatCompletion {
    let created = unix_timestamp();

    ChatCompletion {
        id: format!("chatcmpl-{}", created),
        object: "chat.completion".to_string(),
        created,
        model: data
            .model
            .unwrap_or_else(|| requested_model.to_string()),
        system_fingerprint: data.system_fingerprint,
        usage: data.usage,
        choices: vec![CompletionChoice {
            index: 0,
            finish_reason: finish_reason_text(data.finish_reason.as_ref()),
            message: CompletionMessage {
                role: "assistant".to_string(),
                content: data.message,
                tool_calls: data.tool_calls,
                function_call: data.function_call,
            },
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reshape_completion() {
        let data: UpstreamCompletion = serde_json::from_value(json!({
            "message": "hello",
            "finish_reason": "stop",
            "model": "gpt-4o-2024",
            "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4},
            "system_fingerprint": "fp_1"
        }))
        .unwrap();

        let out = serde_json::to_value(reshape_completion(data, "gpt-4o")).unwrap();

        assert!(out["id"].as_str().unwrap().starts_with("chatcmpl-"));
        assert_eq!(out["object"], "chat.completion");
        assert_eq!(out["model"], "gpt-4o-2024");
        assert_eq!(out["system_fingerprint"], "fp_1");
        assert_eq!(out["usage"]["total_tokens"], 4);
        assert_eq!(out["choices"][0]["index"], 0);
        assert_eq!(out["choices"][0]["message"]["role"], "assistant");
        assert_eq!(out["choices"][0]["message"]["content"], "hello");
        assert_eq!(out["choices"][0]["finish_reason"], "stop");
        assert!(out["choices"][0]["message"].get("tool_calls").is_none());
    }

    #[test]
    fn test_reshape_tool_call_without_content() {
        let data: UpstreamCompletion = serde_json::from_value(json!({
            "tool_calls": [{"id": "call_1", "type": "function"}],
            "finish_reason": 1
        }))
        .unwrap();

        let out = serde_json::to_value(reshape_completion(data, "claude-x")).unwrap();
        let message = &out["choices"][0]["message"];

        assert_eq!(out["model"], "claude-x");
        assert!(message["content"].is_null());
        assert_eq!(message["tool_calls"][0]["id"], "call_1");
        assert_eq!(out["choices"][0]["finish_reason"], "1");
    }
}
