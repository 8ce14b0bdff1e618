use anyhow::Context;
use chatgate_lib::config::GatewayConfig;
use chatgate_lib::logger;
use chatgate_lib::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::load().context("加载配置失败")?;
    logger::init_logging(&config.logging);

    tracing::info!("chatgate v{}", env!("CARGO_PKG_VERSION"));
    if let Some(proxy) = config.network.proxy.as_deref() {
        tracing::info!("[NETWORK] 出站代理: {}", logger::sanitize_log_message(proxy));
    }

    let state = AppState::new(config).context("初始化 HTTP 客户端失败")?;
    server::serve(state).await.context("HTTP 服务异常退出")?;
    Ok(())
}
