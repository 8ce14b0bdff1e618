//! 上游响应数据模型
//!
//! 上游以 `{error_code, msg, data}` 信封包裹结果。所有字段均为可选，
//! 缺失或类型不符的字段按"无值"处理，不会导致解析失败。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 上游响应信封
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub struct UpstreamEnvelope<T> {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub error_code: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub msg: Option<String>,
    #[serde(default, deserialize_with = "lenient_data")]
    pub data: Option<T>,
}

/// 上游非流式补全结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamCompletion {
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    #[serde(default)]
    pub finish_reason: Option<Value>,
    #[serde(default, deserialize_with = "lenient_array")]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(default)]
    pub function_call: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub system_fingerprint: Option<String>,
}

/// 上游 Embeddings 结果（OpenAI 列表格式）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamEmbeddings {
    #[serde(default)]
    pub object: Option<Value>,
    #[serde(default)]
    pub model: Option<Value>,
    #[serde(default, deserialize_with = "lenient_array")]
    pub data: Option<Vec<Value>>,
    #[serde(default)]
    pub usage: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

fn lenient_array<'de, D>(deserializer: D) -> Result<Option<Vec<Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    })
}

fn lenient_data<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(v @ Value::Object(_)) => serde_json::from_value(v).ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mistyped_fields_become_none() {
        let env: UpstreamEnvelope<UpstreamCompletion> = serde_json::from_value(json!({
            "error_code": "429",
            "msg": 12,
            "data": {"message": 5, "model": "m", "tool_calls": "nope"}
        }))
        .unwrap();

        assert_eq!(env.error_code, Some(429));
        assert!(env.msg.is_none());
        let data = env.data.unwrap();
        assert!(data.message.is_none());
        assert!(data.tool_calls.is_none());
        assert_eq!(data.model.as_deref(), Some("m"));
    }

    #[test]
    fn test_missing_data() {
        let env: UpstreamEnvelope<UpstreamCompletion> =
            serde_json::from_value(json!({"msg": "quota exhausted"})).unwrap();
        assert!(env.data.is_none());
        assert_eq!(env.msg.as_deref(), Some("quota exhausted"));

        let env: UpstreamEnvelope<UpstreamCompletion> =
            serde_json::from_value(json!({"data": [1, 2]})).unwrap();
        assert!(env.data.is_none());
    }
}
