//! SSE 行解析器
//!
//! 从增量字节流中切分完整的行。跨读取块的半行保留在缓冲区中，
//! 流结束时由 [`SseLineParser::finish`] 取出。

/// 解析器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserState {
    /// 等待下一行
    #[default]
    AwaitingLine,
    /// 缓冲区中有未完成的行
    PartialLine,
    /// 已结束
    Finished,
}

/// SSE 行解析器
#[derive(Debug, Default)]
pub struct SseLineParser {
    buffer: Vec<u8>,
    state: ParserState,
}

impl SseLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// 处理一个字节块，返回其中所有完整的行（不含换行符）
    pub fn process(&mut self, bytes: &[u8]) -> Vec<String> {
        if self.state == ParserState::Finished {
            return Vec::new();
        }

        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + pos;
            lines.push(decode_line(&self.buffer[start..end]));
            start = end + 1;
        }
        self.buffer.drain(..start);

        self.state = if self.buffer.is_empty() {
            ParserState::AwaitingLine
        } else {
            ParserState::PartialLine
        };
        lines
    }

    /// 结束解析，返回缓冲区中剩余的半行
    pub fn finish(&mut self) -> Option<String> {
        self.state = ParserState::Finished;
        if self.buffer.is_empty() {
            return None;
        }
        let line = decode_line(&self.buffer);
        self.buffer.clear();
        Some(line)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let line = String::from_utf8_lossy(bytes);
    line.trim_end_matches('\r').to_string()
}
