//! OpenAI 兼容请求数据模型
//!
//! 调用方发送的 Chat Completions / Embeddings 请求体。
//! 未显式建模的字段（tools、tool_choice、stop 等）通过 `extra` 原样透传。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 消息角色
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    /// 未知角色，保留原始字符串
    Other(String),
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "system" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::Other(s) => s.as_str(),
        }
    }
}

/// Chat Completions 请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// 其余字段原样透传
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 对话消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    /// 创建纯文本消息
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(text.into())),
            tool_calls: None,
            extra: Map::new(),
        }
    }
}

/// 消息内容：纯文本或多模态内容块列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// 多模态内容块
///
/// 结构不完整的块（例如缺少 `image_url.url`）落入 `Opaque`，原样透传。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentBlock {
    Typed(TypedBlock),
    Opaque(Value),
}

/// 已识别类型的内容块，未列出的字段保存在 `extra` 中原样透传
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedBlock {
    Text {
        text: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    ImageUrl {
        image_url: ImageUrl,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    /// Provider 原生的内联图片格式
    Image {
        source: ImageSource,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

impl ImageSource {
    pub fn base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            source_type: "base64".to_string(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }
}

/// Embeddings 请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    #[serde(default)]
    pub input: EmbeddingInput,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EmbeddingRequest {
    /// 是否要求 base64 编码的向量
    pub fn wants_base64(&self) -> bool {
        self.encoding_format.as_deref() == Some("base64")
    }

    /// 以单个输入项构造子请求
    pub fn with_single_input(&self, input: Value) -> Self {
        Self {
            input: EmbeddingInput::Single(input),
            ..self.clone()
        }
    }
}

/// Embeddings 输入：单个值或批量数组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Batch(Vec<Value>),
    Single(Value),
}

impl Default for EmbeddingInput {
    fn default() -> Self {
        EmbeddingInput::Single(Value::String(String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_roundtrip() {
        let body = json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hi", "name": "bob"}],
            "tools": [{"type": "function"}],
            "tool_choice": "auto"
        });
        let request: ChatRequest = serde_json::from_value(body).unwrap();
        assert!(!request.stream);
        assert_eq!(request.messages[0].role, Role::User);

        let out = serde_json::to_value(&request).unwrap();
        assert_eq!(out["tools"][0]["type"], "function");
        assert_eq!(out["tool_choice"], "auto");
        assert_eq!(out["messages"][0]["name"], "bob");
    }

    #[test]
    fn test_content_blocks_decode() {
        let msg: ChatMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "what is this"},
                {"type": "image_url", "image_url": {"url": "https://x/y.png"}},
                {"type": "image_url", "image_url": {}},
                {"type": "input_audio", "input_audio": {"data": "AAA"}}
            ]
        }))
        .unwrap();

        let Some(MessageContent::Blocks(blocks)) = msg.content else {
            panic!("expected blocks");
        };
        assert!(matches!(
            blocks[0],
            ContentBlock::Typed(TypedBlock::Text { .. })
        ));
        assert!(matches!(
            blocks[1],
            ContentBlock::Typed(TypedBlock::ImageUrl { .. })
        ));
        // 缺少 url 的块保持原样
        assert_eq!(
            blocks[2],
            ContentBlock::Opaque(json!({"type": "image_url", "image_url": {}}))
        );
        assert!(matches!(blocks[3], ContentBlock::Opaque(_)));
    }

    #[test]
    fn test_block_extra_fields_roundtrip() {
        let content = json!([
            {"type": "text", "text": "long doc", "cache_control": {"type": "ephemeral"}},
            {
                "type": "image_url",
                "image_url": {"url": "https://x/y.png", "detail": "high", "format": "png"},
                "cache_control": {"type": "ephemeral"}
            }
        ]);
        let msg: ChatMessage =
            serde_json::from_value(json!({"role": "user", "content": content.clone()})).unwrap();

        let out = serde_json::to_value(&msg).unwrap();
        assert_eq!(out["content"], content);
    }

    #[test]
    fn test_unknown_role_preserved() {
        let msg: ChatMessage =
            serde_json::from_value(json!({"role": "developer", "content": "x"})).unwrap();
        assert_eq!(msg.role, Role::Other("developer".to_string()));
        let out = serde_json::to_value(&msg).unwrap();
        assert_eq!(out["role"], "developer");
    }

    #[test]
    fn test_embedding_input_variants() {
        let single: EmbeddingRequest =
            serde_json::from_value(json!({"input": "hello", "model": "m"})).unwrap();
        assert!(matches!(single.input, EmbeddingInput::Single(_)));

        let batch: EmbeddingRequest = serde_json::from_value(
            json!({"input": ["a", "b"], "model": "m", "encoding_format": "base64"}),
        )
        .unwrap();
        assert!(batch.wants_base64());
        assert!(matches!(batch.input, EmbeddingInput::Batch(ref v) if v.len() == 2));
    }
}
