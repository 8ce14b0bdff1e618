//! chatgate
//!
//! OpenAI 兼容的补全网关：接收 OpenAI 格式的 Chat Completions / Embeddings 请求，
//! 按分组配置转发到上游 Provider，并把响应（包括流式输出）翻译回 OpenAI 格式。

pub mod batch;
pub mod config;
pub mod converter;
pub mod credential;
pub mod injection;
pub mod logger;
pub mod models;
pub mod processor;
pub mod proxy;
pub mod router;
pub mod server;
pub mod server_utils;
pub mod stream;

pub use models::ProviderFamily;
