//! 发送任务调度
//!
//! 把请求变成一次登记在运行表里的后台任务，返回事件流

use crate::config::DispatchSettings;
use crate::error::DispatchError;
use crate::models::{DispatchEvent, Recipient};
use crate::orchestrator::dispatch_runner::{DispatchRunner, ProgressSink, RunPlan, RunReport};
use crate::orchestrator::run_registry::RunRegistry;
use crate::services::{Pacer, PacingPolicy};
use crate::transport::MessagingTransport;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// 事件通道容量
const EVENT_BUFFER: usize = 64;

/// 一次发送请求（已完成号码过滤）
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub user: String,
    pub recipients: Vec<Recipient>,
    pub message: String,
    pub batch_size: Option<i64>,
    pub pacing_multiplier: Option<f64>,
}

/// 已启动的任务
pub struct StartedRun {
    pub run_id: String,
    pub events: mpsc::Receiver<DispatchEvent>,
    pub handle: JoinHandle<RunReport>,
}

/// 任务调度器：持有编排器和运行表
#[derive(Clone)]
pub struct Dispatcher {
    runner: Arc<DispatchRunner>,
    runs: RunRegistry,
}

impl Dispatcher {
    pub fn new(settings: DispatchSettings, address_suffix: impl Into<String>) -> Self {
        Self {
            runner: Arc::new(DispatchRunner::new(settings, address_suffix)),
            runs: RunRegistry::new(),
        }
    }

    pub fn runs(&self) -> &RunRegistry {
        &self.runs
    }

    pub fn settings(&self) -> &DispatchSettings {
        self.runner.settings()
    }

    /// 校验并启动任务
    ///
    /// 校验失败时不登记任何状态；号码列表为空的任务会立即完成
    pub async fn start(
        &self,
        transport: Arc<dyn MessagingTransport>,
        request: DispatchRequest,
    ) -> Result<StartedRun, DispatchError> {
        if request.message.trim().is_empty() {
            return Err(DispatchError::MissingMessage);
        }

        let settings = self.runner.settings();
        let batch_size = settings.clamp_batch_size(request.batch_size);
        let multiplier = DispatchSettings::clamp_pacing_multiplier(request.pacing_multiplier);

        let started_at = Utc::now();
        let run_id = format!("{}-{}", request.user, started_at.timestamp_millis());
        let plan = RunPlan {
            run_id: run_id.clone(),
            user: request.user.clone(),
            recipients: request.recipients,
            message: request.message,
            batch_size,
            pacing: PacingPolicy::new(settings, multiplier),
            started_at,
        };

        let (progress_tx, progress_rx) = watch::channel(plan.initial_progress());
        let cancel = CancellationToken::new();
        self.runs
            .register(&run_id, &request.user, progress_rx, cancel.clone())
            .await?;

        info!(
            "[运行 {}] 🚀 任务已创建: {} 个号码，每批 {}，节奏倍数 {}",
            run_id,
            plan.recipients.len(),
            batch_size,
            multiplier
        );

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let runner = self.runner.clone();
        let runs = self.runs.clone();
        let task_run_id = run_id.clone();
        let handle = tokio::spawn(async move {
            let sink = ProgressSink::new(progress_tx, Some(events_tx));
            let report = runner
                .run(transport.as_ref(), plan, sink, Pacer::new(cancel))
                .await;
            runs.remove(&task_run_id).await;
            report
        });

        Ok(StartedRun {
            run_id,
            events: events_rx,
            handle,
        })
    }
}
