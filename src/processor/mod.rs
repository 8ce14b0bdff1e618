//! 请求处理模块
//!
//! 请求上下文、错误类型与上游错误映射

pub mod error;
pub mod error_mapper;

pub use error::GatewayError;

use crate::logger::mask_credential;

/// 单次请求的上下文
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// 请求 ID
    pub request_id: String,
    /// 入站分组
    pub group: String,
    /// 调用方凭证（原始 Authorization 头）
    pub credential: String,
    /// 请求的模型
    pub model: String,
    pub stream: bool,
}

impl RequestContext {
    pub fn new(group: &str, credential: &str) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            group: group.to_string(),
            credential: credential.to_string(),
            model: String::new(),
            stream: false,
        }
    }

    pub fn with_model(mut self, model: &str, stream: bool) -> Self {
        self.model = model.to_string();
        self.stream = stream;
        self
    }

    /// 可记录的调用方身份
    pub fn identity(&self) -> String {
        mask_credential(&self.credential)
    }
}
