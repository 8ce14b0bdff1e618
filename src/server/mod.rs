//! HTTP 服务
//!
//! 路由表：
//! - `POST /{group}/v1/chat/completions`
//! - `POST /{group}/v1/completions`
//! - `POST /{group}/v1/embeddings`
//! - `GET /` 就绪提示
//! - `GET /health` 健康检查

pub mod handlers;

use crate::config::{GatewayConfig, GroupProfile};
use crate::converter::{HttpImageFetcher, ImageFetcher};
use crate::credential::{CredentialCache, HttpTokenExchanger, MachineIdentity};
use crate::injection::Injector;
use crate::processor::GatewayError;
use crate::proxy::{ProxyClientFactory, ProxyError, RequestDispatcher};
use crate::router::Router as ModelRouter;
use crate::server_utils;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::limit::RequestBodyLimitLayer;

/// 共享状态，启动时构建一次
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub router: Arc<ModelRouter>,
    pub dispatcher: Arc<RequestDispatcher>,
    pub image_fetcher: Arc<dyn ImageFetcher>,
    /// 关闭时取消所有进行中的流
    pub shutdown: CancellationToken,
}

impl AppState {
    /// 按配置构建全部共享对象
    pub fn new(config: GatewayConfig) -> Result<Self, ProxyError> {
        let factory = ProxyClientFactory::from_config(&config.network);
        let client = factory.create_client()?;

        let exchanger = HttpTokenExchanger::from_config(client.clone(), &config.credential);
        let credentials = Arc::new(CredentialCache::new(
            Arc::new(exchanger),
            config.credential.ttl(),
        ));
        let injector = Arc::new(Injector::from_config(&config.injection));
        let dispatcher = RequestDispatcher::new(
            &factory,
            injector,
            credentials,
            Arc::new(MachineIdentity::new()),
        )?;

        Ok(Self::with_parts(
            config,
            Arc::new(dispatcher),
            Arc::new(HttpImageFetcher::new(client)),
        ))
    }

    /// 使用外部构建的分发器与图片下载器
    pub fn with_parts(
        config: GatewayConfig,
        dispatcher: Arc<RequestDispatcher>,
        image_fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        let router = config.build_router();
        Self {
            config: Arc::new(config),
            router: Arc::new(router),
            dispatcher,
            image_fetcher,
            shutdown: CancellationToken::new(),
        }
    }

    /// 查找分组配置
    pub fn profile(&self, group: &str) -> Result<&GroupProfile, GatewayError> {
        self.config
            .groups
            .get(group)
            .ok_or_else(|| GatewayError::NotFound(format!("分组 {group} 不存在")))
    }
}

/// 构建 axum 路由
pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        .route("/", get(server_utils::ready))
        .route("/health", get(server_utils::health))
        .route(
            "/:group/v1/chat/completions",
            post(handlers::chat_completions),
        )
        .route("/:group/v1/completions", post(handlers::chat_completions))
        .route("/:group/v1/embeddings", post(handlers::embeddings))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

/// 监听并处理请求，收到 Ctrl-C 后优雅退出
pub async fn serve(state: AppState) -> std::io::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    )
    .parse()
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let groups: Vec<&str> = state.config.groups.iter().map(|g| g.name.as_str()).collect();
    tracing::info!("[GATEWAY] 监听 {} groups={:?}", addr, groups);

    let shutdown = state.shutdown.clone();
    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("[GATEWAY] 监听退出信号失败: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("[GATEWAY] 正在关闭");
            shutdown.cancel();
        })
        .await
}
