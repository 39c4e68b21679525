use anyhow::{Context, Result};
use bulk_sender::api::{router, AppState};
use bulk_sender::config::Config;
use bulk_sender::transport::BrowserConnector;
use bulk_sender::utils::logging;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Arc::new(Config::load().context("加载配置失败")?);

    // 初始化日志
    logging::init(config.verbose_logging);
    logging::log_startup(&config);

    let connector = Arc::new(BrowserConnector::new(config.clone()));
    let app = router(AppState::new(config.clone(), connector));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("无法监听 {}", config.bind_addr))?;
    info!("✅ 服务已启动: {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP 服务异常退出")?;

    info!("👋 服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("⚠️ 无法监听退出信号: {}", e);
    }
}
