//! Embeddings 处理器
//!
//! 字符串输入发送单个请求；数组输入在扇出模式下拆分为并发子请求，
//! 按输入顺序组装结果。

use crate::batch::{assemble, encode_embeddings_in_place, fan_out};
use crate::config::{EmbeddingMode, GroupProfile, ResponseMode};
use crate::models::{EmbeddingInput, EmbeddingRequest, ProviderFamily, UpstreamEmbeddings};
use crate::processor::error_mapper::{check_response, unwrap_envelope};
use crate::processor::{GatewayError, RequestContext};
use crate::proxy::{caller_credential, OutboundRequest, RequestDispatcher};
use crate::server::AppState;
use crate::server_utils::build_relay_response;
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// 一个分组上的 embeddings 调用
struct EmbeddingCall {
    dispatcher: Arc<RequestDispatcher>,
    profile: GroupProfile,
    ctx: RequestContext,
    url: String,
    engine_tag: Option<String>,
}

impl EmbeddingCall {
    async fn post(&self, body: Bytes) -> Result<reqwest::Response, GatewayError> {
        let outbound = OutboundRequest {
            url: self.url.clone(),
            body,
            engine_tag: self.engine_tag.clone(),
        };
        let resp = self
            .dispatcher
            .dispatch(&self.ctx, &self.profile, outbound)
            .await?;
        check_response(resp, &self.ctx).await
    }

    /// 发送请求并解包信封，需要时把向量编码为 base64
    async fn envelope(
        &self,
        body: Bytes,
        wants_base64: bool,
    ) -> Result<UpstreamEmbeddings, GatewayError> {
        let bytes = self.post(body).await?.bytes().await?;
        let mut data: UpstreamEmbeddings = unwrap_envelope(&bytes).map_err(|e| {
            e.log_with_context(&self.ctx.request_id, &self.ctx.group, &self.ctx.model);
            e
        })?;
        if wants_base64 {
            encode_embeddings_in_place(&mut data);
        }
        Ok(data)
    }
}

/// `POST /{group}/v1/embeddings`
pub async fn embeddings(
    State(state): State<AppState>,
    Path(group): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let profile = state.profile(&group)?;
    let url = profile
        .embeddings_url()
        .ok_or_else(|| GatewayError::NotFound(format!("分组 {group} 不提供 embeddings")))?;

    let request: EmbeddingRequest = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
    let credential = caller_credential(&headers);

    let call = Arc::new(EmbeddingCall {
        dispatcher: state.dispatcher.clone(),
        profile: profile.clone(),
        ctx: RequestContext::new(&group, &credential).with_model(&request.model, false),
        url,
        engine_tag: profile
            .send_engine_tag
            .then(|| ProviderFamily::OpenAI.engine_tag().to_string()),
    });

    match (&request.input, profile.embedding_mode, profile.response_mode) {
        (EmbeddingInput::Batch(inputs), EmbeddingMode::FanOut, ResponseMode::Envelope) => {
            fan_out_batch(call, &request, inputs.clone()).await
        }
        (_, _, ResponseMode::Envelope) => {
            let data = call.envelope(body, request.wants_base64()).await?;
            Ok(Json(data).into_response())
        }
        _ => {
            let bytes = call.post(body).await?.bytes().await?;
            Ok(build_relay_response(StatusCode::OK, None, Body::from(bytes)))
        }
    }
}

async fn fan_out_batch(
    call: Arc<EmbeddingCall>,
    request: &EmbeddingRequest,
    inputs: Vec<serde_json::Value>,
) -> Result<Response, GatewayError> {
    let total = inputs.len();
    let template = Arc::new(request.clone());
    let wants_base64 = request.wants_base64();

    let worker_call = call.clone();
    let result = fan_out(inputs, move |_, input| {
        let call = worker_call.clone();
        let sub_request = template.with_single_input(input);
        async move {
            let body = serde_json::to_vec(&sub_request)
                .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
            call.envelope(Bytes::from(body), wants_base64).await
        }
    })
    .await;

    tracing::info!(
        "[BATCH] request_id={} total={} succeeded={}",
        call.ctx.request_id,
        total,
        result.success_count()
    );

    let list = assemble(result, &call.ctx.model)?;
    Ok(Json(list).into_response())
}
