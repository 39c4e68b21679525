//! 发送节奏 - 业务能力层
//!
//! 随机化的发送间隔，以及可被取消令牌打断的等待

use crate::config::DispatchSettings;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// 等待被取消
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// 发送成功后的随机间隔
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingPolicy {
    pub min: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl PacingPolicy {
    pub fn new(settings: &DispatchSettings, multiplier: f64) -> Self {
        Self {
            min: Duration::from_millis(settings.pacing_min_ms),
            max: Duration::from_millis(settings.pacing_max_ms.max(settings.pacing_min_ms)),
            multiplier,
        }
    }

    /// 在 [min, max] 内均匀取值再乘以倍数，避免固定节奏被识别
    pub fn next_delay(&self) -> Duration {
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        let base = if max_ms > min_ms {
            rand::thread_rng().gen_range(min_ms..=max_ms)
        } else {
            min_ms
        };
        Duration::from_millis(base).mul_f64(self.multiplier)
    }
}

/// 可取消的等待器，每个发送任务一个
#[derive(Debug, Clone, Default)]
pub struct Pacer {
    token: CancellationToken,
}

impl Pacer {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 等待 `delay`，期间被取消则提前返回
    pub async fn pause(&self, delay: Duration) -> Result<(), Cancelled> {
        if delay.is_zero() {
            return if self.is_cancelled() { Err(Cancelled) } else { Ok(()) };
        }
        tokio::select! {
            _ = self.token.cancelled() => Err(Cancelled),
            _ = sleep(delay) => Ok(()),
        }
    }
}
