//! 流式数据解析器
//!
//! 从上游字节流中切分 SSE 行。

pub mod sse_lines;

pub use sse_lines::{ParserState, SseLineParser};
