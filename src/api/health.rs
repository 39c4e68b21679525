//! 运行状态接口

use crate::api::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sysinfo::System;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub active_sessions: usize,
    pub active_runs: usize,
    pub memory: MemoryUsage,
    pub load_average: LoadAverage,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut sys = System::new();
    sys.refresh_memory();
    let load = System::load_average();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        active_sessions: state.sessions.live_count().await,
        active_runs: state.dispatcher.runs().len().await,
        memory: MemoryUsage {
            total_bytes: sys.total_memory(),
            used_bytes: sys.used_memory(),
        },
        load_average: LoadAverage {
            one: load.one,
            five: load.five,
            fifteen: load.fifteen,
        },
    })
}
