//! 健康检查 - 业务能力层
//!
//! 只回答"这个句柄现在能不能用"，不修改任何状态

use crate::transport::MessagingTransport;
use serde::Serialize;

/// 健康检查的各项信号
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub has_handle: bool,
    pub open: bool,
    pub paired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.has_handle && self.open && self.paired
    }
}

/// 健康检查器
///
/// 句柄存在、控制通道打开、并且带有配对后的账号信息，才算健康。
/// 结果只代表检查那一刻，下一次操作前可能已经变化。
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthMonitor;

impl HealthMonitor {
    pub fn is_healthy(handle: Option<&dyn MessagingTransport>) -> bool {
        match handle {
            Some(handle) => handle.is_open() && handle.identity().is_some(),
            None => false,
        }
    }

    /// 逐项信号，供状态接口展示
    pub fn report(handle: Option<&dyn MessagingTransport>) -> HealthReport {
        match handle {
            Some(handle) => {
                let identity = handle.identity();
                HealthReport {
                    has_handle: true,
                    open: handle.is_open(),
                    paired: identity.is_some(),
                    identity,
                }
            }
            None => HealthReport {
                has_handle: false,
                open: false,
                paired: false,
                identity: None,
            },
        }
    }
}
