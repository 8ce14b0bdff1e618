//! 会话凭证模块
//!
//! - 会话令牌交换与缓存（按 TTL 刷新）
//! - 进程级机器标识

mod cache;
mod identity;

pub use cache::{CachedToken, CredentialCache, HttpTokenExchanger, TokenExchanger};
pub use identity::MachineIdentity;

use crate::processor::GatewayError;
use serde_json::json;
use thiserror::Error;

/// 凭证错误
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("令牌交换请求失败: {0}")]
    Request(String),

    #[error("令牌交换返回状态码 {0}")]
    Status(u16),

    #[error("令牌交换响应中缺少 token")]
    MissingToken,

    #[error("调用方未提供凭证")]
    EmptyCredential,
}

impl From<CredentialError> for GatewayError {
    fn from(err: CredentialError) -> Self {
        let message = err.to_string();
        match err {
            CredentialError::Request(msg) => GatewayError::Transport(msg),
            CredentialError::Status(status) => GatewayError::UpstreamAuth {
                status,
                body: json!({ "errorMessage": message }),
            },
            CredentialError::MissingToken => GatewayError::UpstreamMalformed(message),
            CredentialError::EmptyCredential => GatewayError::InvalidRequest(message),
        }
    }
}
