//! OpenAI SSE 生成器
//!
//! 将 `UpstreamEvent` 转换为 OpenAI Chat Completions SSE 格式。
//!
//! # 格式说明
//!
//! ```text
//! data: {"id":"chatcmpl-1700000000","object":"chat.completion.chunk","created":1700000000,"model":"gpt-4","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}
//!
//! data: [DONE]
//! ```

use crate::converter::completion::unix_timestamp;
use crate::stream::events::UpstreamEvent;
use serde::Serialize;
use serde_json::Value;

/// chunk 输出方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkMode {
    /// 提取 delta 并重新包装为标准 chunk
    Rewrap,
    /// 负载已是标准格式，只做分帧
    Frame,
}

/// OpenAI SSE 生成器
#[derive(Debug)]
pub struct OpenAiSseGenerator {
    /// 响应 ID，同一个流内保持不变
    response_id: String,
    /// 上游未给出模型名时使用
    model: String,
    created: u64,
    mode: ChunkMode,
    /// delta 的 JSON Pointer
    delta_pointer: String,
    /// finish_reason 的 JSON Pointer（与 delta 同级）
    finish_pointer: String,
}

#[derive(Debug, Serialize)]
struct OpenAiStreamChunk<'a> {
    id: &'a str,
    object: &'static str,
    created: u64,
    model: &'a str,
    choices: Vec<OpenAiChoice<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<&'a Value>,
}

#[derive(Debug, Serialize)]
struct OpenAiChoice<'a> {
    index: u32,
    delta: &'a Value,
    finish_reason: Option<&'a Value>,
}

impl OpenAiSseGenerator {
    pub fn new(model: impl Into<String>, mode: ChunkMode, delta_pointer: &str) -> Self {
        let created = unix_timestamp();

        let finish_pointer = match delta_pointer.rsplit_once('/') {
            Some((parent, _)) => format!("{parent}/finish_reason"),
            None => "/finish_reason".to_string(),
        };

        Self {
            response_id: format!("chatcmpl-{created}"),
            model: model.into(),
            created,
            mode,
            delta_pointer: delta_pointer.to_string(),
            finish_pointer,
        }
    }

    pub fn mode(&self) -> ChunkMode {
        self.mode
    }

    /// 生成结束标记
    pub fn generate_done(&self) -> String {
        "data: [DONE]\n\n".to_string()
    }

    /// 将一个上游事件转换为 SSE 文本
    ///
    /// # 返回
    ///
    /// - `Some(String)` - 一帧 SSE 文本（包含 `data: ` 前缀和空行）
    /// - `None` - 该事件不产生输出
    pub fn generate(&self, event: UpstreamEvent) -> Option<String> {
        match event {
            UpstreamEvent::Skip => None,
            UpstreamEvent::Done => Some(self.generate_done()),
            UpstreamEvent::Raw(payload) => Some(format!("data: {}\n\n", payload)),
            UpstreamEvent::Other(line) => Some(format!("{}\n\n", line)),
            UpstreamEvent::Json(value) => match self.mode {
                ChunkMode::Frame => Some(format!("data: {}\n\n", value)),
                ChunkMode::Rewrap => Some(self.rewrap(value)),
            },
        }
    }

    fn rewrap(&self, mut value: Value) -> String {
        if value.pointer(&self.delta_pointer).is_none() {
            // 找不到 delta 时转发解码后的负载
            return format!("data: {}\n\n", value);
        }
        if let Some(delta) = value.pointer_mut(&self.delta_pointer) {
            ensure_tool_call_content(delta);
        }

        let delta = value.pointer(&self.delta_pointer).unwrap_or(&Value::Null);
        let model = value
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(&self.model);

        let chunk = OpenAiStreamChunk {
            id: &self.response_id,
            object: "chat.completion.chunk",
            created: self.created,
            model,
            choices: vec![OpenAiChoice {
                index: 0,
                delta,
                finish_reason: value
                    .pointer(&self.finish_pointer)
                    .filter(|v| !v.is_null()),
            }],
            usage: value.get("usage").filter(|v| !v.is_null()),
        };

        match serde_json::to_string(&chunk) {
            Ok(json) => format!("data: {}\n\n", json),
            Err(_) => format!("data: {}\n\n", value),
        }
    }
}

/// assistant 的工具调用 delta 缺少 content 时补上显式 null
fn ensure_tool_call_content(delta: &mut Value) {
    let Some(obj) = delta.as_object_mut() else {
        return;
    };

    let is_assistant = obj.get("role").and_then(Value::as_str) == Some("assistant");
    let has_call = ["tool_calls", "function_call"]
        .iter()
        .any(|key| obj.get(*key).is_some_and(|v| !v.is_null()));

    if is_assistant && has_call && !obj.contains_key("content") {
        obj.insert("content".to_string(), Value::Null);
    }
}
