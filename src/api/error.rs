//! HTTP 错误映射

use crate::error::{AppError, DispatchError, SessionError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

/// 接口层错误：状态码 + 机器可读代码 + 描述
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::AlreadyRunning { .. } => {
                Self::new(StatusCode::CONFLICT, "run_already_active", err.to_string())
            }
            DispatchError::MissingMessage => Self::new(StatusCode::BAD_REQUEST, "missing_message", err.to_string()),
            DispatchError::MissingRecipients => {
                Self::new(StatusCode::BAD_REQUEST, "missing_recipients", err.to_string())
            }
            DispatchError::EmptyRecipients => {
                Self::new(StatusCode::BAD_REQUEST, "empty_recipients", err.to_string())
            }
            DispatchError::InvalidField { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "invalid_field", err.to_string())
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "session_not_found", err.to_string()),
            SessionError::NotReady { .. } => {
                Self::new(StatusCode::CONFLICT, "session_not_ready", err.to_string())
            }
            SessionError::InvalidTransition { .. } => {
                Self::new(StatusCode::CONFLICT, "invalid_transition", err.to_string())
            }
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Dispatch(e) => e.into(),
            AppError::Session(e) => e.into(),
            other => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("❌ 请求处理失败: {}", self.message);
        }
        let body = ErrorBody {
            error: self.message,
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(DispatchError::MissingMessage).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(DispatchError::AlreadyRunning {
                user: "alice".into(),
                run_id: "alice-1".into()
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(SessionError::NotFound("bob".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(AppError::Other("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
