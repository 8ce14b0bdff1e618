//! 数据模型

pub mod openai;
pub mod provider_model;
pub mod upstream;

pub use openai::{
    ChatMessage, ChatRequest, ContentBlock, EmbeddingInput, EmbeddingRequest, ImageSource,
    ImageUrl, MessageContent, Role, TypedBlock,
};
pub use provider_model::ProviderFamily;
pub use upstream::{UpstreamCompletion, UpstreamEmbeddings, UpstreamEnvelope};
