//! 任务接口：进度轮询与取消

use crate::api::{ApiError, AppState};
use crate::models::RunProgress;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub run_id: String,
    pub status: &'static str,
}

/// GET /api/runs/{run_id}
///
/// 404 表示任务已结束或从未存在，调用方不应把它当成失败
pub async fn progress(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunProgress>, ApiError> {
    state
        .dispatcher
        .runs()
        .get_progress(&run_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("任务 {} 已结束或不存在", run_id)))
}

/// POST /api/runs/{run_id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<(StatusCode, Json<CancelResponse>), ApiError> {
    if state.dispatcher.runs().cancel(&run_id).await {
        Ok((
            StatusCode::ACCEPTED,
            Json(CancelResponse {
                run_id,
                status: "cancelling",
            }),
        ))
    } else {
        Err(ApiError::not_found(format!("任务 {} 已结束或不存在", run_id)))
    }
}
