//! 上游流事件
//!
//! 一行上游 SSE 文本解码后的中间表示，解耦行解析器 (parsers)
//! 与标准 chunk 生成器 (generators)。

use serde_json::Value;

/// 上游流事件
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// 空行或 `event:` 行，不产生输出
    Skip,
    /// 结束标记（`data: finish` 或 `data: [DONE]`）
    Done,
    /// 可解析的 JSON 负载
    Json(Value),
    /// 无法解析或未解析的负载，原样转发
    Raw(String),
    /// 非 `data:` 的其他行
    Other(String),
}

impl UpstreamEvent {
    /// 解码一行
    ///
    /// `decode_json` 为 false 时负载不做 JSON 解析，直接作为 `Raw`。
    pub fn from_line(line: &str, decode_json: bool) -> Self {
        let line = line.trim();

        if line.is_empty() || line.starts_with("event:") {
            return UpstreamEvent::Skip;
        }

        let Some(payload) = line.strip_prefix("data:") else {
            return UpstreamEvent::Other(line.to_string());
        };
        let payload = payload.trim();

        if payload == "finish" || payload == "[DONE]" {
            return UpstreamEvent::Done;
        }

        if !decode_json {
            return UpstreamEvent::Raw(payload.to_string());
        }

        match serde_json::from_str(payload) {
            Ok(value) => UpstreamEvent::Json(value),
            Err(e) => {
                tracing::debug!("[STREAM] 上游负载不是合法 JSON，原样转发: {}", e);
                UpstreamEvent::Raw(payload.to_string())
            }
        }
    }
}
