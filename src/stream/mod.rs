//! 流式处理层
//!
//! 将上游 SSE 字节流翻译为标准 OpenAI chunk 流，包括：
//! - 上游事件类型定义 (events)
//! - 增量行解析 (parsers)
//! - 标准 chunk 生成 (generators)
//!
//! # 架构设计
//!
//! ```text
//! 上游字节流 ──> [SseLineParser] ──> UpstreamEvent ──> [OpenAiSseGenerator] ──> OpenAI SSE
//! ```

pub mod events;
pub mod generators;
pub mod parsers;
pub mod pipeline;

// 重新导出核心类型
pub use events::UpstreamEvent;
pub use generators::{ChunkMode, OpenAiSseGenerator};
pub use parsers::{ParserState, SseLineParser};
pub use pipeline::{create_relay_stream, create_sse_stream, PipelineConfig, StreamPipeline};
