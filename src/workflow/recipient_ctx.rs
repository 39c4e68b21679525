//! 号码处理上下文
//!
//! 封装"我正在处理哪个任务的第几个号码"这一信息

use std::fmt::Display;

/// 号码处理上下文
#[derive(Debug, Clone)]
pub struct RecipientCtx {
    /// 任务ID
    pub run_id: String,

    /// 号码在发送列表中的位置（从1开始）
    pub position: usize,

    /// 号码总数
    pub total: usize,

    /// 所在批次（从1开始）
    pub batch: usize,
}

impl RecipientCtx {
    /// 创建新的号码上下文
    pub fn new(run_id: impl Into<String>, position: usize, total: usize, batch: usize) -> Self {
        Self {
            run_id: run_id.into(),
            position,
            total,
            batch,
        }
    }

    /// 是否发送列表中的最后一个号码
    pub fn is_last(&self) -> bool {
        self.position >= self.total
    }
}

impl Display for RecipientCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[运行 {} 号码#{}/{} 批次#{}]",
            self.run_id, self.position, self.total, self.batch
        )
    }
}
