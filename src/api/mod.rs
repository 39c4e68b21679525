//! HTTP 接口层
//!
//! 只做参数解析和响应组装，业务全部委托给会话注册表和任务调度器。
//! 发送接口以 NDJSON 流式返回进度，长任务不受请求超时影响。

pub mod dispatch;
pub mod error;
pub mod health;
pub mod runs;
pub mod sessions;

pub use error::ApiError;

use crate::config::Config;
use crate::orchestrator::Dispatcher;
use crate::session::SessionRegistry;
use crate::transport::TransportConnector;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// 所有处理函数共享的状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionRegistry,
    pub dispatcher: Dispatcher,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Arc<Config>, connector: Arc<dyn TransportConnector>) -> Self {
        let dispatcher = Dispatcher::new(config.dispatch.clone(), config.address_suffix.clone());
        Self {
            sessions: SessionRegistry::new(connector),
            dispatcher,
            started_at: Instant::now(),
            config,
        }
    }
}

/// 组装路由
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/sessions/{user}",
            get(sessions::status).delete(sessions::logout),
        )
        .route("/api/sessions/{user}/init", post(sessions::init))
        .route("/api/sessions/{user}/qr", get(sessions::pairing_code))
        .route("/api/sessions/{user}/dispatch", post(dispatch::dispatch))
        .route("/api/runs/{run_id}", get(runs::progress))
        .route("/api/runs/{run_id}/cancel", post(runs::cancel))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
