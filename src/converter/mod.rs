//! 协议转换模块
//!
//! 入站请求规范化与上游响应整形

pub mod completion;
pub mod image;
pub mod normalizer;

pub use completion::{reshape_completion, ChatCompletion};
pub use image::{HttpImageFetcher, ImageFetchError, ImageFetcher};
pub use normalizer::{normalize, NormalizerPolicy};
