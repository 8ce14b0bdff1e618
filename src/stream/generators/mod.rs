//! SSE 流生成器
//!
//! 将 `UpstreamEvent` 转换为 OpenAI SSE 格式 (data: {...})。

pub mod openai_sse;

pub use openai_sse::{ChunkMode, OpenAiSseGenerator};
