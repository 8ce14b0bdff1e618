//! 统一流处理管道
//!
//! 封装完整的流式处理流程：上游字节流 → 行解析 → 事件解码 → 标准 SSE
//!
//! 每一行输出单独成帧；每次读取上游前检查取消令牌；
//! 上游流由管道持有，任何退出路径都会将其释放。

use crate::config::{GroupProfile, ResponseMode};
use crate::stream::events::UpstreamEvent;
use crate::stream::generators::{ChunkMode, OpenAiSseGenerator};
use crate::stream::parsers::SseLineParser;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 流处理管道配置
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: ChunkMode,
    /// 请求的模型名
    pub model: String,
    pub delta_pointer: String,
    /// 两次读取之间的最长等待时间
    pub idle_timeout: Option<Duration>,
}

impl PipelineConfig {
    pub fn new(mode: ChunkMode, model: impl Into<String>) -> Self {
        Self {
            mode,
            model: model.into(),
            delta_pointer: "/choices/0/delta".to_string(),
            idle_timeout: None,
        }
    }

    /// 按分组的响应方式创建
    pub fn for_profile(profile: &GroupProfile, model: &str) -> Self {
        let mode = match profile.response_mode {
            ResponseMode::Envelope => ChunkMode::Rewrap,
            ResponseMode::OpenAi | ResponseMode::Relay => ChunkMode::Frame,
        };
        Self {
            mode,
            model: model.to_string(),
            delta_pointer: profile.delta_pointer.clone(),
            idle_timeout: None,
        }
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

/// 统一流处理管道
pub struct StreamPipeline {
    parser: SseLineParser,
    generator: OpenAiSseGenerator,
    decode_json: bool,
}

impl StreamPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            parser: SseLineParser::new(),
            generator: OpenAiSseGenerator::new(
                config.model.clone(),
                config.mode,
                &config.delta_pointer,
            ),
            decode_json: config.mode == ChunkMode::Rewrap,
        }
    }

    /// 处理单个字节块，返回生成的 SSE 帧
    pub fn process_chunk(&mut self, bytes: &[u8]) -> Vec<String> {
        self.parser
            .process(bytes)
            .into_iter()
            .filter_map(|line| self.translate(&line))
            .collect()
    }

    /// 处理流结束时缓冲区中剩余的半行
    pub fn finish(&mut self) -> Vec<String> {
        self.parser
            .finish()
            .and_then(|line| self.translate(&line))
            .into_iter()
            .collect()
    }

    fn translate(&self, line: &str) -> Option<String> {
        self.generator
            .generate(UpstreamEvent::from_line(line, self.decode_json))
    }
}

/// 流结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    Eof,
    ReadError,
    Cancelled,
    IdleTimeout,
}

/// 读取下一块，带可选的空闲超时
async fn next_chunk<S, E>(
    stream: &mut S,
    idle_timeout: Option<Duration>,
) -> Result<Option<Result<Bytes, E>>, ()>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    match idle_timeout {
        Some(timeout) => tokio::time::timeout(timeout, stream.next())
            .await
            .map_err(|_| ()),
        None => Ok(stream.next().await),
    }
}

/// 创建翻译后的 SSE 流
///
/// 每一项是一帧完整的 SSE 文本。上游读取错误、空闲超时和取消都会静默结束流。
pub fn create_sse_stream<S, E>(
    byte_stream: S,
    config: PipelineConfig,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Bytes, Infallible>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let mut pipeline = StreamPipeline::new(&config);
        let mut byte_stream = Box::pin(byte_stream);
        let mut frames = 0usize;

        let end = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break StreamEnd::Cancelled,
                next = next_chunk(&mut byte_stream, config.idle_timeout) => next,
            };

            match next {
                Ok(Some(Ok(bytes))) => {
                    for frame in pipeline.process_chunk(&bytes) {
                        frames += 1;
                        yield Ok(Bytes::from(frame));
                    }
                }
                Ok(Some(Err(e))) => {
                    tracing::warn!("[STREAM] 读取上游流失败: {}", e);
                    break StreamEnd::ReadError;
                }
                Ok(None) => break StreamEnd::Eof,
                Err(()) => break StreamEnd::IdleTimeout,
            }
        };

        if end == StreamEnd::Eof {
            for frame in pipeline.finish() {
                frames += 1;
                yield Ok(Bytes::from(frame));
            }
        }

        drop(byte_stream);
        tracing::debug!("[STREAM] 流结束: reason={:?} frames={}", end, frames);
    }
}

/// 创建原样转发的字节流
///
/// 不做任何翻译，仅在每次读取前检查取消令牌。
pub fn create_relay_stream<S, E>(
    byte_stream: S,
    cancel: CancellationToken,
    idle_timeout: Option<Duration>,
) -> impl Stream<Item = Result<Bytes, Infallible>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let mut byte_stream = Box::pin(byte_stream);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = next_chunk(&mut byte_stream, idle_timeout) => next,
            };

            match next {
                Ok(Some(Ok(bytes))) => yield Ok(bytes),
                Ok(Some(Err(e))) => {
                    tracing::warn!("[STREAM] 转发上游流失败: {}", e);
                    break;
                }
                Ok(None) | Err(()) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_utils::build_sse_response;
    use axum::body::Body;
    use futures::stream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        stream::iter(
            parts
                .iter()
                .copied()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(s: impl Stream<Item = Result<Bytes, Infallible>>) -> Vec<String> {
        s.map(|item| match item {
            Ok(bytes) => String::from_utf8(bytes.to_vec()).unwrap(),
            Err(never) => match never {},
        })
        .collect()
        .await
    }

    #[test]
    fn test_pipeline_config_for_profile() {
        let config = PipelineConfig::for_profile(&GroupProfile::patgpt("http://x"), "claude-x");
        assert_eq!(config.mode, ChunkMode::Rewrap);
        assert_eq!(config.delta_pointer, "/choices/0/delta");

        let config = PipelineConfig::for_profile(&GroupProfile::patgpt_new("http://x"), "gpt-4");
        assert_eq!(config.mode, ChunkMode::Frame);
    }

    #[test]
    fn test_pipeline_finish_marker() {
        let mut pipeline = StreamPipeline::new(&PipelineConfig::new(ChunkMode::Rewrap, "m"));

        let frames = pipeline.process_chunk(b"event: end\n\ndata: finish\n");
        assert_eq!(frames, vec!["data: [DONE]\n\n"]);
    }

    #[test]
    fn test_pipeline_malformed_forwarded_raw() {
        let mut pipeline = StreamPipeline::new(&PipelineConfig::new(ChunkMode::Rewrap, "m"));

        let frames = pipeline.process_chunk(b"data: {not json}\n");
        assert_eq!(frames, vec!["data: {not json}\n\n"]);
    }

    #[test]
    fn test_frame_mode_keeps_payload_bytes() {
        let mut pipeline = StreamPipeline::new(&PipelineConfig::new(ChunkMode::Frame, "m"));

        let frames = pipeline.process_chunk(b"data:{\"b\":1,\"a\":2}\r\n");
        assert_eq!(frames, vec!["data: {\"b\":1,\"a\":2}\n\n"]);
    }

    #[tokio::test]
    async fn test_sse_stream_one_frame_per_line() {
        let upstream = chunks(&[
            "event: message\ndata: {\"choices\":[{\"delta\":{\"content\":\"He\"}}]}\n\ndata: {\"cho",
            "ices\":[{\"delta\":{\"content\":\"llo\"}}]}\n",
            "data: finish",
        ]);

        let frames = collect(create_sse_stream(
            upstream,
            PipelineConfig::new(ChunkMode::Rewrap, "gpt-4"),
            CancellationToken::new(),
        ))
        .await;

        assert_eq!(frames.len(), 3);
        assert!(frames[0].contains("\"content\":\"He\""));
        assert!(frames[1].contains("\"content\":\"llo\""));
        assert!(frames[0].contains("chat.completion.chunk"));
        // 末尾不带换行的半行在 EOF 时处理
        assert_eq!(frames[2], "data: [DONE]\n\n");
    }

    #[tokio::test]
    async fn test_sse_stream_stops_on_read_error() {
        let upstream = stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"x\":1}\n")),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "reset")),
            Ok(Bytes::from_static(b"data: finish\n")),
        ]);

        let frames = collect(create_sse_stream(
            upstream,
            PipelineConfig::new(ChunkMode::Frame, "m"),
            CancellationToken::new(),
        ))
        .await;

        assert_eq!(frames, vec!["data: {\"x\":1}\n\n"]);
    }

    #[tokio::test]
    async fn test_sse_stream_cancellation_is_prompt() {
        let first = Ok::<_, std::io::Error>(Bytes::from_static(b"data: {\"x\":1}\n"));
        let upstream = stream::once(async move { first }).chain(stream::pending());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let frames = tokio::time::timeout(
            Duration::from_secs(2),
            collect(create_sse_stream(
                upstream,
                PipelineConfig::new(ChunkMode::Frame, "m"),
                cancel,
            )),
        )
        .await
        .expect("stream should end after cancellation");

        assert_eq!(frames.len(), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    /// 上游流被释放时置位
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// 先产出一行，之后永远挂起；流被释放时置位标志
    fn hanging_upstream(
        dropped: Arc<AtomicBool>,
    ) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
        let flag = DropFlag(dropped);
        async_stream::stream! {
            let _flag = flag;
            yield Ok::<_, std::io::Error>(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n",
            ));
            futures::future::pending::<()>().await;
        }
    }

    #[tokio::test]
    async fn test_dropping_sse_stream_releases_upstream() {
        let dropped = Arc::new(AtomicBool::new(false));
        let mut frames = Box::pin(create_sse_stream(
            hanging_upstream(dropped.clone()),
            PipelineConfig::new(ChunkMode::Frame, "m"),
            CancellationToken::new(),
        ));

        let first = frames.next().await;
        assert!(first.is_some());
        assert!(!dropped.load(Ordering::SeqCst));

        drop(frames);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_dropping_response_body_releases_upstream() {
        let dropped = Arc::new(AtomicBool::new(false));
        let stream = create_sse_stream(
            hanging_upstream(dropped.clone()),
            PipelineConfig::new(ChunkMode::Rewrap, "m"),
            CancellationToken::new(),
        );
        let response = build_sse_response(Body::from_stream(stream));

        let mut body = response.into_body().into_data_stream();
        let first = tokio::time::timeout(Duration::from_secs(2), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let first = String::from_utf8_lossy(&first).to_string();
        assert!(first.contains("chat.completion.chunk"));
        assert!(first.contains("\"content\":\"hi\""));

        // 客户端断开：响应体被丢弃
        drop(body);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_sse_stream_idle_timeout() {
        let upstream = stream::pending::<Result<Bytes, std::io::Error>>();
        let config = PipelineConfig::new(ChunkMode::Rewrap, "m")
            .with_idle_timeout(Some(Duration::from_millis(20)));

        let frames = tokio::time::timeout(
            Duration::from_secs(2),
            collect(create_sse_stream(upstream, config, CancellationToken::new())),
        )
        .await
        .unwrap();

        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn test_relay_stream() {
        let upstream = chunks(&["{\"id\":", "\"x\"}"]);
        let frames = collect(create_relay_stream(upstream, CancellationToken::new(), None)).await;
        assert_eq!(frames.concat(), "{\"id\":\"x\"}");

        let cancel = CancellationToken::new();
        cancel.cancel();
        let frames = collect(create_relay_stream(
            stream::pending::<Result<Bytes, std::io::Error>>(),
            cancel,
            None,
        ))
        .await;
        assert!(frames.is_empty());
    }
}
