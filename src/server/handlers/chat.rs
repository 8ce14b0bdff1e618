//! Chat Completions 处理器
//!
//! 处理流程：
//! 1. 解析请求，建立请求上下文
//! 2. 路由到 Provider 家族（一次查询，引擎标签与请求体共用）
//! 3. 按分组的请求体方式规范化或原样转发
//! 4. 按分组的响应方式翻译流、整形结果或原样转发

use crate::config::{BodyMode, GroupProfile, ResponseMode};
use crate::converter::{normalize, reshape_completion};
use crate::models::{ChatRequest, UpstreamCompletion};
use crate::processor::error_mapper::{check_response, classify_status, unwrap_envelope};
use crate::processor::{GatewayError, RequestContext};
use crate::proxy::{caller_credential, OutboundRequest};
use crate::server::AppState;
use crate::server_utils::{build_relay_response, build_sse_response};
use crate::stream::{create_relay_stream, create_sse_stream, PipelineConfig};
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// `POST /{group}/v1/chat/completions` 与 `POST /{group}/v1/completions`
pub async fn chat_completions(
    State(state): State<AppState>,
    Path(group): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let profile = state.profile(&group)?;
    let credential = caller_credential(&headers);

    let request: ChatRequest = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
    let ctx = RequestContext::new(&group, &credential).with_model(&request.model, request.stream);
    let target = state.router.resolve(&request.model, &profile.chat_url());

    let payload = match profile.body_mode {
        BodyMode::Rewrite => {
            let normalized =
                normalize(request, &profile.normalizer, state.image_fetcher.as_ref()).await;
            state.dispatcher.prepare_chat_body(&normalized)?
        }
        BodyMode::Relay => body,
    };

    let outbound = OutboundRequest {
        url: target.endpoint_url.clone(),
        body: payload,
        engine_tag: profile.send_engine_tag.then(|| target.engine_tag.clone()),
    };
    let resp = state.dispatcher.dispatch(&ctx, profile, outbound).await?;

    match profile.response_mode {
        ResponseMode::Relay => relay(&state, &ctx, resp).await,
        ResponseMode::Envelope | ResponseMode::OpenAi => {
            let resp = check_response(resp, &ctx).await?;
            if ctx.stream {
                Ok(translate_stream(&state, &ctx, profile, resp))
            } else {
                single_shot(&ctx, profile, resp).await
            }
        }
    }
}

fn translate_stream(
    state: &AppState,
    ctx: &RequestContext,
    profile: &GroupProfile,
    resp: reqwest::Response,
) -> Response {
    let config = PipelineConfig::for_profile(profile, &ctx.model)
        .with_idle_timeout(state.config.network.stream_idle_timeout());

    tracing::debug!(
        "[STREAM] request_id={} mode={:?}",
        ctx.request_id,
        config.mode
    );

    let stream = create_sse_stream(resp.bytes_stream(), config, state.shutdown.child_token());
    build_sse_response(Body::from_stream(stream))
}

async fn single_shot(
    ctx: &RequestContext,
    profile: &GroupProfile,
    resp: reqwest::Response,
) -> Result<Response, GatewayError> {
    let bytes = resp.bytes().await?;

    match profile.response_mode {
        ResponseMode::Envelope => {
            let data: UpstreamCompletion = unwrap_envelope(&bytes).map_err(|e| {
                e.log_with_context(&ctx.request_id, &ctx.group, &ctx.model);
                e
            })?;
            Ok(Json(reshape_completion(data, &ctx.model)).into_response())
        }
        _ => Ok(build_relay_response(StatusCode::OK, None, Body::from(bytes))),
    }
}

/// 原样转发上游响应，仅 401 / 403 走错误映射
async fn relay(
    state: &AppState,
    ctx: &RequestContext,
    resp: reqwest::Response,
) -> Result<Response, GatewayError> {
    let status = resp.status();
    if matches!(status.as_u16(), 401 | 403) {
        let body = resp.bytes().await.unwrap_or_default();
        let error = classify_status(status.as_u16(), &body, &ctx.identity());
        error.log_with_context(&ctx.request_id, &ctx.group, &ctx.model);
        return Err(error);
    }

    let status = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| header::HeaderValue::from_bytes(v.as_bytes()).ok());

    let stream = create_relay_stream(
        resp.bytes_stream(),
        state.shutdown.child_token(),
        state.config.network.stream_idle_timeout(),
    );
    Ok(build_relay_response(
        status,
        content_type,
        Body::from_stream(stream),
    ))
}
