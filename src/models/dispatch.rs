//! 发送任务的数据模型：计数、逐号结果、汇总、进度事件

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 单个号码的发送状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Sent,
    Failed,
}

/// 单个号码的发送结果，按发送顺序追加
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendRecord {
    /// 原始号码文本
    pub number: String,
    pub status: SendStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendRecord {
    pub fn sent(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            status: SendStatus::Sent,
            error: None,
        }
    }

    pub fn failed(number: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            status: SendStatus::Failed,
            error: Some(reason.into()),
        }
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Starting,
    Processing,
    Completed,
    Aborted,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Aborted | RunStatus::Cancelled
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Starting => "starting",
            RunStatus::Processing => "processing",
            RunStatus::Completed => "completed",
            RunStatus::Aborted => "aborted",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// 运行计数
///
/// 只通过 `record_sent` / `record_failed` 修改，保证
/// `processed == successful + failed` 且 `processed <= total`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
}

impl RunCounters {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record_sent(&mut self) {
        debug_assert!(self.processed < self.total);
        self.successful += 1;
        self.processed += 1;
    }

    pub fn record_failed(&mut self) {
        debug_assert!(self.processed < self.total);
        self.failed += 1;
        self.processed += 1;
    }

    pub fn is_consistent(&self) -> bool {
        self.processed == self.successful + self.failed && self.processed <= self.total
    }
}

/// 最终汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    /// 成功率百分比，两位小数；总数为 0 时为 0.0
    pub success_rate: f64,
}

impl Summary {
    pub fn from_counters(counters: &RunCounters) -> Self {
        Self {
            total: counters.total,
            sent: counters.successful,
            failed: counters.failed,
            success_rate: success_rate(counters.successful, counters.total),
        }
    }
}

/// successful / total 的百分比，保留两位小数
pub fn success_rate(successful: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = successful as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

/// 供轮询接口读取的运行快照
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProgress {
    pub run_id: String,
    pub user: String,
    #[serde(flatten)]
    pub counters: RunCounters,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
}

/// 流式事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Progress,
    Complete,
    Error,
}

/// 流式响应中的一行 JSON
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub session_id: String,
    #[serde(flatten)]
    pub counters: RunCounters,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_batch: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_batches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SendRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchEvent {
    /// 进度事件
    pub fn progress(progress: &RunProgress, batch: Option<(usize, usize)>) -> Self {
        Self {
            kind: EventKind::Progress,
            session_id: progress.run_id.clone(),
            counters: progress.counters,
            status: progress.status,
            current_batch: batch.map(|(current, _)| current),
            total_batches: batch.map(|(_, total)| total),
            results: None,
            summary: None,
            error: None,
        }
    }

    /// 终止事件：完成为 `complete`，中止/取消为 `error`，都带上已有结果
    pub fn terminal(progress: &RunProgress, results: Vec<SendRecord>, error: Option<String>) -> Self {
        let kind = match progress.status {
            RunStatus::Completed => EventKind::Complete,
            _ => EventKind::Error,
        };
        Self {
            kind,
            session_id: progress.run_id.clone(),
            counters: progress.counters,
            status: progress.status,
            current_batch: None,
            total_batches: None,
            results: Some(results),
            summary: Some(Summary::from_counters(&progress.counters)),
            error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
