//! 批量发送编排器 - 编排层
//!
//! ## 职责
//!
//! 接收过滤后的号码列表，按批次顺序逐个发送，并负责：
//!
//! 1. **分批**：每批不超过 `batch_size`（调用方的值已按硬上限截断）
//! 2. **节奏**：成功后随机间隔、失败后短冷却、批次之间固定间隔
//! 3. **健康**：每次发送前（由重试原语）检查，批次之间再检查
//! 4. **进度**：每个号码后更新轮询快照，每批后推送一条进度事件
//! 5. **终态**：完成 / 中止（会话丢失）/ 取消，都带上已有结果和汇总
//!
//! 单个任务内部严格串行，绝不并发发送。
//!
//! ## 中途失去健康时的边界
//!
//! - 发送前健康检查失败：该号码未被尝试，不计入结果
//! - 发送本身返回会话级错误：该号码记为 `failed`，然后中止

use crate::config::DispatchSettings;
use crate::error::SendError;
use crate::models::{DispatchEvent, Recipient, RunCounters, RunProgress, RunStatus, SendRecord, Summary};
use crate::services::{HealthMonitor, Pacer, PacingPolicy, RetryPolicy};
use crate::transport::MessagingTransport;
use crate::utils::logging::{log_batch_complete, log_batch_start, log_run_start, print_final_stats};
use crate::workflow::{FlowOutcome, RecipientCtx, RecipientFlow};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{error, warn};

/// 一次任务的不可变输入
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub run_id: String,
    pub user: String,
    pub recipients: Vec<Recipient>,
    pub message: String,
    /// 已截断到 [1, 上限]
    pub batch_size: usize,
    pub pacing: PacingPolicy,
    pub started_at: DateTime<Utc>,
}

impl RunPlan {
    /// 初始进度快照
    pub fn initial_progress(&self) -> RunProgress {
        RunProgress {
            run_id: self.run_id.clone(),
            user: self.user.clone(),
            counters: RunCounters::new(self.recipients.len()),
            status: RunStatus::Starting,
            started_at: self.started_at,
        }
    }
}

/// 任务结束时的完整结果
#[derive(Debug, Clone)]
pub struct RunReport {
    pub progress: RunProgress,
    pub results: Vec<SendRecord>,
    pub summary: Summary,
    pub error: Option<String>,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        self.progress.status
    }
}

/// 进度发布：`watch` 给轮询，`mpsc` 给流式响应
pub struct ProgressSink {
    progress: watch::Sender<RunProgress>,
    events: Option<mpsc::Sender<DispatchEvent>>,
}

impl ProgressSink {
    pub fn new(progress: watch::Sender<RunProgress>, events: Option<mpsc::Sender<DispatchEvent>>) -> Self {
        Self { progress, events }
    }

    fn update(&self, f: impl FnOnce(&mut RunProgress)) {
        self.progress.send_modify(f);
    }

    fn snapshot(&self) -> RunProgress {
        self.progress.borrow().clone()
    }

    /// 推送事件；调用方断开后继续执行，只是不再推送
    async fn emit(&self, event: DispatchEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event).await;
        }
    }
}

/// 任务如何结束
enum Ending {
    Completed,
    Aborted(SendError),
    Cancelled,
}

/// 批量发送编排器
pub struct DispatchRunner {
    settings: DispatchSettings,
    flow: RecipientFlow,
}

impl DispatchRunner {
    pub fn new(settings: DispatchSettings, address_suffix: impl Into<String>) -> Self {
        let flow = RecipientFlow::new(address_suffix, RetryPolicy::from(&settings));
        Self { settings, flow }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// 执行一次发送任务
    pub async fn run(
        &self,
        transport: &dyn MessagingTransport,
        plan: RunPlan,
        sink: ProgressSink,
        pacer: Pacer,
    ) -> RunReport {
        let total = plan.recipients.len();
        let batch_size = plan.batch_size.max(1);
        let total_batches = total.div_ceil(batch_size);
        let mut counters = RunCounters::new(total);
        let mut results: Vec<SendRecord> = Vec::with_capacity(total);

        log_run_start(&plan.run_id, total, batch_size, total_batches);
        sink.emit(DispatchEvent::progress(&sink.snapshot(), None)).await;

        let ending = 'run: {
            if total == 0 {
                break 'run Ending::Completed;
            }
            sink.update(|p| p.status = RunStatus::Processing);

            for (batch_idx, batch) in plan.recipients.chunks(batch_size).enumerate() {
                let batch_num = batch_idx + 1;
                let batch_start = batch_idx * batch_size;
                log_batch_start(
                    &plan.run_id,
                    batch_num,
                    total_batches,
                    batch_start + 1,
                    batch_start + batch.len(),
                    total,
                );

                let mut batch_success = 0;
                for (offset, recipient) in batch.iter().enumerate() {
                    if pacer.is_cancelled() {
                        break 'run Ending::Cancelled;
                    }
                    let ctx = RecipientCtx::new(&plan.run_id, batch_start + offset + 1, total, batch_num);

                    let pause = match self.flow.run(transport, recipient, &plan.message, &ctx).await {
                        FlowOutcome::Delivered(record) => {
                            counters.record_sent();
                            results.push(record);
                            batch_success += 1;
                            plan.pacing.next_delay()
                        }
                        FlowOutcome::Failed(record) => {
                            counters.record_failed();
                            results.push(record);
                            self.settings.failure_cooldown()
                        }
                        FlowOutcome::Fatal { record, error } => {
                            if let Some(record) = record {
                                counters.record_failed();
                                results.push(record);
                                sink.update(|p| p.counters = counters);
                            }
                            break 'run Ending::Aborted(error);
                        }
                    };
                    debug_assert!(counters.is_consistent());
                    sink.update(|p| p.counters = counters);

                    if !ctx.is_last() && pacer.pause(pause).await.is_err() {
                        break 'run Ending::Cancelled;
                    }
                }

                log_batch_complete(&plan.run_id, batch_num, batch_success, batch.len());
                sink.emit(DispatchEvent::progress(
                    &sink.snapshot(),
                    Some((batch_num, total_batches)),
                ))
                .await;

                if batch_num < total_batches {
                    if !HealthMonitor::is_healthy(Some(transport)) {
                        error!("[运行 {}] ❌ 批次之间健康检查未通过，中止任务", plan.run_id);
                        break 'run Ending::Aborted(SendError::NotHealthy);
                    }
                    if pacer.pause(self.settings.inter_batch_delay()).await.is_err() {
                        break 'run Ending::Cancelled;
                    }
                }
            }
            Ending::Completed
        };

        let (status, error) = match ending {
            Ending::Completed => (RunStatus::Completed, None),
            Ending::Aborted(e) => {
                warn!("[运行 {}] ⚠️ 会话中途丢失: {}", plan.run_id, e);
                (RunStatus::Aborted, Some(format!("session lost mid-run: {}", e)))
            }
            Ending::Cancelled => {
                warn!("[运行 {}] 🛑 任务已取消", plan.run_id);
                (RunStatus::Cancelled, Some("run cancelled".to_string()))
            }
        };

        sink.update(|p| {
            p.counters = counters;
            p.status = status;
        });
        let progress = sink.snapshot();
        let summary = Summary::from_counters(&progress.counters);
        print_final_stats(&plan.run_id, &status.to_string(), &summary);

        sink.emit(DispatchEvent::terminal(&progress, results.clone(), error.clone()))
            .await;

        RunReport {
            progress,
            results,
            summary,
            error,
        }
    }
}
