//! 出站代理模块
//!
//! 出站客户端构建、鉴权头转换与请求分发

mod auth;
mod client_factory;
mod dispatcher;

pub use auth::{
    caller_credential, strip_bearer, to_basic, to_bearer, to_github_token, AUTHORIZATION_HEADER,
    X_AUTHORIZATION_HEADER,
};
pub use client_factory::{ProxyClientFactory, ProxyError, ProxyProtocol};
pub use dispatcher::{OutboundRequest, RequestDispatcher, ENGINE_HEADER};
