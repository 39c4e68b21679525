//! 业务能力层
//!
//! - `health` - 句柄健康检查
//! - `retry` - 带重试的单次发送
//! - `recipients` - 号码列表解析与排除
//! - `pacing` - 发送节奏与可取消等待

pub mod health;
pub mod pacing;
pub mod recipients;
pub mod retry;

pub use health::{HealthMonitor, HealthReport};
pub use pacing::{Cancelled, Pacer, PacingPolicy};
pub use recipients::build_send_list;
pub use retry::{send_with_retry, RetryPolicy};
