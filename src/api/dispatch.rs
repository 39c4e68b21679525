//! 发送接口
//!
//! multipart 表单字段：
//! - `message` 消息内容（必填）
//! - `recipients` 号码列表，文件或文本，每行一个（必填）
//! - `exclusions` 已发送号码列表（可选）
//! - `batchSize` 每批数量（可选）
//! - `pacing` 节奏倍数（可选）
//!
//! 响应为 `application/x-ndjson`，每行一个进度事件，最后一行是终止事件。

use crate::api::{ApiError, AppState};
use crate::error::DispatchError;
use crate::models::DispatchEvent;
use crate::orchestrator::{DispatchRequest, StartedRun};
use crate::services::recipients::{build_send_list, parse_lines};
use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";
pub const RUN_ID_HEADER: &str = "x-run-id";

/// 解析后的表单
#[derive(Debug, Default)]
pub struct DispatchForm {
    pub message: Option<String>,
    pub recipients: Option<String>,
    pub exclusions: Option<String>,
    pub batch_size: Option<i64>,
    pub pacing: Option<f64>,
}

impl DispatchForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("表单解析失败: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("读取字段 {} 失败: {}", name, e)))?;

            match name.as_str() {
                "message" => form.message = Some(value),
                "recipients" => form.recipients = Some(value),
                "exclusions" => form.exclusions = Some(value),
                "batchSize" => form.batch_size = parse_optional(&name, &value)?,
                "pacing" => form.pacing = parse_optional(&name, &value)?,
                other => debug!("忽略未知字段: {}", other),
            }
        }
        Ok(form)
    }

    /// 发送前的同步校验，失败时不创建任何状态
    pub fn validate(&self) -> Result<(), DispatchError> {
        match self.message.as_deref() {
            Some(message) if !message.trim().is_empty() => {}
            _ => return Err(DispatchError::MissingMessage),
        }
        let recipients = self
            .recipients
            .as_deref()
            .ok_or(DispatchError::MissingRecipients)?;
        if parse_lines(recipients).is_empty() {
            return Err(DispatchError::EmptyRecipients);
        }
        Ok(())
    }

    pub fn into_request(self, user: &str) -> Result<DispatchRequest, DispatchError> {
        self.validate()?;
        let recipients = build_send_list(
            self.recipients.as_deref().unwrap_or_default(),
            self.exclusions.as_deref(),
        );
        Ok(DispatchRequest {
            user: user.to_string(),
            recipients,
            message: self.message.unwrap_or_default(),
            batch_size: self.batch_size,
            pacing_multiplier: self.pacing,
        })
    }
}

fn parse_optional<T: std::str::FromStr>(field: &str, value: &str) -> Result<Option<T>, DispatchError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| DispatchError::InvalidField {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// POST /api/sessions/{user}/dispatch
pub async fn dispatch(
    State(state): State<AppState>,
    Path(user): Path<String>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let request = DispatchForm::from_multipart(multipart).await?.into_request(&user)?;
    let transport = state.sessions.ready_handle(&user).await?;

    let StartedRun { run_id, events, .. } = state.dispatcher.start(transport, request).await?;
    info!("[运行 {}] 📡 开始推送进度", run_id);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
        .header(RUN_ID_HEADER, run_id.as_str())
        .body(Body::from_stream(ndjson_stream(run_id, events)))
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string()))
}

/// 把事件通道转成 NDJSON 行流，终止事件之后结束
fn ndjson_stream(
    run_id: String,
    mut events: mpsc::Receiver<DispatchEvent>,
) -> impl futures::Stream<Item = Result<String, Infallible>> {
    async_stream::stream! {
        while let Some(event) = events.recv().await {
            let terminal = event.is_terminal();
            match serde_json::to_string(&event) {
                Ok(mut line) => {
                    line.push('\n');
                    yield Ok(line);
                }
                Err(e) => warn!("[运行 {}] ⚠️ 事件序列化失败: {}", run_id, e),
            }
            if terminal {
                break;
            }
        }
    }
}
