//! 请求分发
//!
//! 构造出站请求（鉴权、引擎标签、内容协商头）并发送到上游。
//! 传输失败直接返回错误，不做重试。

use super::auth::{strip_bearer, to_basic, to_bearer, to_github_token};
use super::client_factory::{ProxyClientFactory, ProxyError};
use crate::config::{AuthScheme, GroupProfile};
use crate::credential::{CredentialCache, MachineIdentity};
use crate::injection::Injector;
use crate::models::ChatRequest;
use crate::processor::{GatewayError, RequestContext};
use bytes::Bytes;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;

/// 引擎标签头
pub const ENGINE_HEADER: &str = "X-Ai-Engine";

/// 出站请求
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub body: Bytes,
    /// `X-Ai-Engine` 头的值
    pub engine_tag: Option<String>,
}

/// 请求分发器
pub struct RequestDispatcher {
    client: reqwest::Client,
    streaming_client: reqwest::Client,
    injector: Arc<Injector>,
    credentials: Arc<CredentialCache>,
    identity: Arc<MachineIdentity>,
}

impl RequestDispatcher {
    pub fn new(
        factory: &ProxyClientFactory,
        injector: Arc<Injector>,
        credentials: Arc<CredentialCache>,
        identity: Arc<MachineIdentity>,
    ) -> Result<Self, ProxyError> {
        Ok(Self {
            client: factory.create_client()?,
            streaming_client: factory.create_streaming_client()?,
            injector,
            credentials,
            identity,
        })
    }

    /// 序列化规范化后的请求并执行参数注入
    ///
    /// 注入作用于序列化结果，`request` 本身不变。
    pub fn prepare_chat_body(&self, request: &ChatRequest) -> Result<Bytes, GatewayError> {
        let mut payload = serde_json::to_value(request)
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

        let result = self.injector.inject(&request.model, &mut payload);
        if result.has_injections() {
            tracing::debug!(
                "[INJECT] model={} applied_rules={:?} injected_params={:?}",
                request.model,
                result.applied_rules,
                result.injected_params
            );
        }

        serde_json::to_vec(&payload)
            .map(Bytes::from)
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))
    }

    /// 按分组的鉴权方案生成 Authorization 头
    pub async fn authorization(
        &self,
        profile: &GroupProfile,
        credential: &str,
    ) -> Result<String, GatewayError> {
        Ok(match profile.auth {
            AuthScheme::Basic => to_basic(credential),
            AuthScheme::Bearer => to_bearer(credential),
            AuthScheme::GithubToken => to_github_token(credential),
            AuthScheme::SessionExchange => {
                let token = self
                    .credentials
                    .get_or_refresh(&strip_bearer(credential))
                    .await?;
                to_bearer(&token)
            }
        })
    }

    /// 发送出站请求
    pub async fn dispatch(
        &self,
        ctx: &RequestContext,
        profile: &GroupProfile,
        outbound: OutboundRequest,
    ) -> Result<reqwest::Response, GatewayError> {
        let authorization = self.authorization(profile, &ctx.credential).await?;
        let client = if ctx.stream {
            &self.streaming_client
        } else {
            &self.client
        };

        let mut builder = client
            .post(&outbound.url)
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, "application/json");

        for (name, value) in &profile.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(tag) = outbound.engine_tag.as_deref() {
            builder = builder.header(ENGINE_HEADER, tag);
        }

        if profile.identity_headers {
            builder = builder
                .header("X-Request-Id", self.identity.request_id())
                .header("Vscode-Sessionid", self.identity.session_id())
                .header("Vscode-Machineid", self.identity.machine_id());
        }

        if ctx.stream {
            builder = builder.header(ACCEPT, "text/event-stream");
        }

        tracing::info!(
            "[DISPATCH] request_id={} group={} model={} stream={} engine={}",
            ctx.request_id,
            ctx.group,
            ctx.model,
            ctx.stream,
            outbound.engine_tag.as_deref().unwrap_or("-")
        );

        let resp = builder.body(outbound.body).send().await.map_err(|e| {
            let error = GatewayError::Transport(e.to_string());
            error.log_with_context(&ctx.request_id, &ctx.group, &ctx.model);
            error
        })?;

        // 交换得到的令牌被上游拒绝，下次请求重新交换
        if profile.auth == AuthScheme::SessionExchange
            && resp.status() == reqwest::StatusCode::UNAUTHORIZED
        {
            tracing::warn!(
                "[CREDENTIAL] request_id={} 上游拒绝短期令牌，清除缓存",
                ctx.request_id
            );
            self.credentials
                .invalidate(&strip_bearer(&ctx.credential))
                .await;
        }

        Ok(resp)
    }
}
