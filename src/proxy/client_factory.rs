//! 出站客户端工厂
//!
//! 按网络配置创建访问上游的 HTTP 客户端，支持 http / https 出站代理。

use crate::config::NetworkConfig;
use reqwest::{Client, Proxy};
use std::time::Duration;
use thiserror::Error;

/// 代理协议类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyProtocol {
    Http,
    Https,
}

impl ProxyProtocol {
    /// 从 URL 字符串解析代理协议
    pub fn from_url(url: &str) -> Option<Self> {
        let url_lower = url.to_lowercase();
        if url_lower.starts_with("http://") {
            Some(ProxyProtocol::Http)
        } else if url_lower.starts_with("https://") {
            Some(ProxyProtocol::Https)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
        }
    }
}

/// 客户端构建错误
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("无效的代理 URL: {0}")]
    InvalidUrl(String),

    #[error("不支持的代理协议: {0}")]
    UnsupportedProtocol(String),

    #[error("代理配置错误: {0}")]
    ConfigError(String),

    #[error("客户端构建错误: {0}")]
    ClientBuildError(String),
}

/// 出站客户端工厂
///
/// 普通请求带整体超时；流式请求只限制连接时间，空闲超时由流水线负责。
#[derive(Debug, Clone)]
pub struct ProxyClientFactory {
    proxy: Option<String>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl Default for ProxyClientFactory {
    fn default() -> Self {
        Self {
            proxy: None,
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(300),
        }
    }
}

impl ProxyClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从网络配置创建
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new()
            .with_proxy(config.proxy.clone().filter(|p| !p.trim().is_empty()))
            .with_connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .with_request_timeout(Duration::from_secs(config.request_timeout_secs))
    }

    pub fn with_proxy(mut self, proxy_url: Option<String>) -> Self {
        self.proxy = proxy_url;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// 解析代理 URL 并返回协议类型
    pub fn parse_proxy_url(url: &str) -> Result<ProxyProtocol, ProxyError> {
        if url.trim().is_empty() {
            return Err(ProxyError::InvalidUrl("代理 URL 不能为空".to_string()));
        }

        ProxyProtocol::from_url(url).ok_or_else(|| ProxyError::UnsupportedProtocol(url.to_string()))
    }

    /// 创建普通请求客户端
    pub fn create_client(&self) -> Result<Client, ProxyError> {
        self.build(Some(self.request_timeout))
    }

    /// 创建流式请求客户端
    pub fn create_streaming_client(&self) -> Result<Client, ProxyError> {
        self.build(None)
    }

    fn build(&self, timeout: Option<Duration>) -> Result<Client, ProxyError> {
        let mut builder = Client::builder().connect_timeout(self.connect_timeout);

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(url) = self.proxy.as_deref() {
            Self::parse_proxy_url(url)?;
            let proxy = Proxy::all(url).map_err(|e| ProxyError::ConfigError(e.to_string()))?;
            tracing::info!("[NETWORK] 使用出站代理 {}", url);
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| ProxyError::ClientBuildError(e.to_string()))
    }
}
