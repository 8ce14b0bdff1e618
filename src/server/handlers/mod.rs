//! 请求处理器

mod chat;
mod embeddings;

pub use chat::chat_completions;
pub use embeddings::embeddings;
