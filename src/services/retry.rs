//! 带重试的单次发送 - 业务能力层
//!
//! 每次尝试前都重新做健康检查；不健康立即失败，不再重试。
//! 临时错误按 `base * 2^(attempt-1) + 抖动` 退避后重试。

use crate::config::DispatchSettings;
use crate::error::SendError;
use crate::services::health::HealthMonitor;
use crate::transport::{MessagingTransport, SendAck};
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// 抖动上限（不含）
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl From<&DispatchSettings> for RetryPolicy {
    fn from(settings: &DispatchSettings) -> Self {
        Self {
            max_attempts: settings.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            max_jitter: Duration::from_millis(settings.retry_jitter_ms),
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次失败后的退避（不含抖动）
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }
}

/// 带重试地发送一条消息
///
/// 第一次尝试前健康检查失败返回 `NotHealthy`（号码没有被尝试）；
/// 重试前健康检查失败返回 `HealthLost`（号码已经尝试过）
pub async fn send_with_retry(
    transport: &dyn MessagingTransport,
    destination: &str,
    payload: &str,
    policy: &RetryPolicy,
) -> Result<SendAck, SendError> {
    let mut attempt = 1;
    let mut last_error: Option<SendError> = None;
    loop {
        if !HealthMonitor::is_healthy(Some(transport)) {
            warn!("发送前健康检查未通过: {} (尝试 {})", destination, attempt);
            return Err(match last_error {
                None => SendError::NotHealthy,
                Some(e) => SendError::HealthLost(e.to_string()),
            });
        }

        match transport.send_text(destination, payload).await {
            Ok(ack) => return Ok(ack),
            Err(e) if !e.is_retryable() || attempt >= policy.max_attempts => {
                debug!("发送 {} 失败 (尝试 {}/{}): {}", destination, attempt, policy.max_attempts, e);
                return Err(e);
            }
            Err(e) => {
                let delay = policy.backoff(attempt) + policy.jitter();
                warn!(
                    "发送 {} 失败 (尝试 {}/{}), 等待 {} 毫秒后重试: {}",
                    destination,
                    attempt,
                    policy.max_attempts,
                    delay.as_millis(),
                    e
                );
                sleep(delay).await;
                last_error = Some(e);
                attempt += 1;
            }
        }
    }
}
