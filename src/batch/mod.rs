//! 批量请求扇出
//!
//! - `fanout`: 通用的有序并发扇出
//! - `embedding`: Embeddings 批量结果组装与 base64 向量编码

pub mod embedding;
pub mod fanout;

pub use embedding::{
    assemble, decode_embedding, encode_embedding, encode_embeddings_in_place, EmbeddingList,
};
pub use fanout::{fan_out, BatchItem, FanOutResult};
