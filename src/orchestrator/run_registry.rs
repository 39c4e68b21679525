//! 运行表 - 进度查询
//!
//! 每个进行中的任务一条记录。进度通过 `watch` 通道发布，
//! 写方只有任务自己，轮询方读到的永远是完整的一次快照。
//! 任务结束后记录被移除，之后查询得到 None（已结束或从未存在）。

use crate::error::DispatchError;
use crate::models::RunProgress;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct RunEntry {
    user: String,
    progress: watch::Receiver<RunProgress>,
    cancel: CancellationToken,
}

/// 进行中任务表
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<String, RunEntry>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记新任务；同一用户已有进行中的任务时拒绝
    pub async fn register(
        &self,
        run_id: &str,
        user: &str,
        progress: watch::Receiver<RunProgress>,
        cancel: CancellationToken,
    ) -> Result<(), DispatchError> {
        let mut runs = self.runs.write().await;
        if let Some((existing, _)) = runs.iter().find(|(_, entry)| entry.user == user) {
            return Err(DispatchError::AlreadyRunning {
                user: user.to_string(),
                run_id: existing.clone(),
            });
        }
        runs.insert(
            run_id.to_string(),
            RunEntry {
                user: user.to_string(),
                progress,
                cancel,
            },
        );
        debug!("[运行 {}] 已登记", run_id);
        Ok(())
    }

    /// 当前进度；None 表示已结束或不存在
    pub async fn get_progress(&self, run_id: &str) -> Option<RunProgress> {
        let runs = self.runs.read().await;
        runs.get(run_id).map(|entry| entry.progress.borrow().clone())
    }

    /// 请求取消；任务不存在时返回 false
    pub async fn cancel(&self, run_id: &str) -> bool {
        let runs = self.runs.read().await;
        match runs.get(run_id) {
            Some(entry) => {
                info!("[运行 {}] 🛑 收到取消请求", run_id);
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, run_id: &str) {
        if self.runs.write().await.remove(run_id).is_some() {
            debug!("[运行 {}] 已从运行表移除", run_id);
        }
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunCounters, RunStatus};
    use chrono::Utc;

    fn progress(run_id: &str, user: &str) -> RunProgress {
        RunProgress {
            run_id: run_id.to_string(),
            user: user.to_string(),
            counters: RunCounters::new(3),
            status: RunStatus::Starting,
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_poll_sees_latest_snapshot_then_not_found() {
        let registry = RunRegistry::new();
        let (tx, rx) = watch::channel(progress("alice-1", "alice"));
        registry
            .register("alice-1", "alice", rx, CancellationToken::new())
            .await
            .unwrap();

        tx.send_modify(|p| {
            p.counters.record_sent();
            p.status = RunStatus::Processing;
        });
        let seen = registry.get_progress("alice-1").await.unwrap();
        assert_eq!(seen.counters.processed, 1);
        assert_eq!(seen.status, RunStatus::Processing);

        registry.remove("alice-1").await;
        assert!(registry.get_progress("alice-1").await.is_none());
        assert!(registry.get_progress("never-existed").await.is_none());
    }

    #[tokio::test]
    async fn test_one_active_run_per_user() {
        let registry = RunRegistry::new();
        let (_tx1, rx1) = watch::channel(progress("alice-1", "alice"));
        let (_tx2, rx2) = watch::channel(progress("alice-2", "alice"));
        let (_tx3, rx3) = watch::channel(progress("bob-1", "bob"));

        registry.register("alice-1", "alice", rx1, CancellationToken::new()).await.unwrap();
        let err = registry
            .register("alice-2", "alice", rx2, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::AlreadyRunning {
                user: "alice".to_string(),
                run_id: "alice-1".to_string()
            }
        );
        registry.register("bob-1", "bob", rx3, CancellationToken::new()).await.unwrap();
        assert_eq!(registry.len().await, 2);
        assert!(registry.get_progress("bob-1").await.is_some());
    }

    #[tokio::test]
    async fn test_cancel_trips_token() {
        let registry = RunRegistry::new();
        let token = CancellationToken::new();
        let (_tx, rx) = watch::channel(progress("alice-1", "alice"));
        registry.register("alice-1", "alice", rx, token.clone()).await.unwrap();

        assert!(registry.cancel("alice-1").await);
        assert!(token.is_cancelled());
        assert!(!registry.cancel("missing").await);
    }
}
