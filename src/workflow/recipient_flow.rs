//! 单个号码的发送流程 - 流程层
//!
//! 构造地址 → 带重试发送 → 归类结果。
//! 不持有句柄，不修改计数，只告诉编排层"这个号码怎么样了"。

use tracing::{error, info, warn};

use crate::error::SendError;
use crate::models::{Recipient, SendRecord};
use crate::services::{send_with_retry, RetryPolicy};
use crate::transport::MessagingTransport;
use crate::utils::logging::truncate_text;
use crate::workflow::recipient_ctx::RecipientCtx;

/// 单个号码的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    /// 发送成功
    Delivered(SendRecord),
    /// 发送失败，任务继续
    Failed(SendRecord),
    /// 会话级错误，任务必须中止
    ///
    /// `record` 为 None 表示第一次发送前健康检查就未通过，号码没有被尝试，不计入结果；
    /// 尝试过再失去健康（`HealthLost`）时记为失败
    Fatal {
        record: Option<SendRecord>,
        error: SendError,
    },
}

/// 单个号码的发送流程
pub struct RecipientFlow {
    address_suffix: String,
    retry: RetryPolicy,
}

impl RecipientFlow {
    pub fn new(address_suffix: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            address_suffix: address_suffix.into(),
            retry,
        }
    }

    pub async fn run(
        &self,
        transport: &dyn MessagingTransport,
        recipient: &Recipient,
        message: &str,
        ctx: &RecipientCtx,
    ) -> FlowOutcome {
        let destination = recipient.address(&self.address_suffix);
        info!("{} 📤 正在发送到 {}: {}", ctx, destination, truncate_text(message, 30));

        match send_with_retry(transport, &destination, message, &self.retry).await {
            Ok(_) => {
                info!("{} ✓ 发送成功", ctx);
                FlowOutcome::Delivered(SendRecord::sent(recipient.raw()))
            }
            Err(SendError::NotHealthy) => {
                error!("{} ❌ 发送前健康检查未通过，号码未尝试", ctx);
                FlowOutcome::Fatal {
                    record: None,
                    error: SendError::NotHealthy,
                }
            }
            Err(e) if e.is_session_fatal() => {
                error!("{} ❌ 会话级错误: {}", ctx, e);
                FlowOutcome::Fatal {
                    record: Some(SendRecord::failed(recipient.raw(), e.to_string())),
                    error: e,
                }
            }
            Err(e) => {
                warn!("{} ⚠️ 发送失败: {}", ctx, e);
                FlowOutcome::Failed(SendRecord::failed(recipient.raw(), e.to_string()))
            }
        }
    }
}
