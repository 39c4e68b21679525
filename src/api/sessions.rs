//! 会话接口：初始化、状态、配对码、登出

use crate::api::{ApiError, AppState};
use crate::session::{InitOutcome, SessionStatus};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct InitResponse {
    pub status: InitOutcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingCodeResponse {
    pub pairing_code: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub user: String,
    pub status: &'static str,
}

/// POST /api/sessions/{user}/init
pub async fn init(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> (StatusCode, Json<InitResponse>) {
    let outcome = state.sessions.get_or_init(&user).await;
    let code = match outcome {
        InitOutcome::Ready => StatusCode::OK,
        InitOutcome::Initializing => StatusCode::ACCEPTED,
    };
    (code, Json(InitResponse { status: outcome }))
}

/// GET /api/sessions/{user}
pub async fn status(State(state): State<AppState>, Path(user): Path<String>) -> Json<SessionStatus> {
    Json(state.sessions.status(&user).await)
}

/// GET /api/sessions/{user}/qr
///
/// 没有配对码（已配对或未初始化）时返回 404
pub async fn pairing_code(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<PairingCodeResponse>, ApiError> {
    state
        .sessions
        .pairing_code(&user)
        .await
        .map(|pairing_code| Json(PairingCodeResponse { pairing_code }))
        .ok_or_else(|| ApiError::not_found(format!("用户 {} 当前没有配对码", user)))
}

/// DELETE /api/sessions/{user}
pub async fn logout(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<LogoutResponse>, ApiError> {
    if state.sessions.invalidate(&user).await {
        Ok(Json(LogoutResponse {
            user,
            status: "closed",
        }))
    } else {
        Err(ApiError::not_found(format!("用户 {} 没有会话", user)))
    }
}
