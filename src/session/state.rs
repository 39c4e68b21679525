//! 传输会话状态机
//!
//! 外部通知（配对码、就绪、断开……）只作为输入驱动迁移，
//! 不在表内的组合一律返回 `InvalidTransition`。

use crate::error::SessionError;
use serde::Serialize;
use std::fmt;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    AwaitingPairing,
    Ready,
    Degraded,
    Closed,
}

/// 驱动迁移的输入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    InitRequested,
    PairingCode,
    Ready,
    HealthLost,
    HealthRestored,
    AuthFailure,
    Disconnected,
    Logout,
}

impl SessionState {
    /// 迁移表
    pub fn next(self, input: SessionInput) -> Result<SessionState, SessionError> {
        use SessionInput as I;
        use SessionState::*;

        let next = match (self, input) {
            (Uninitialized | Closed | Degraded, I::InitRequested) => Initializing,
            (Initializing | AwaitingPairing, I::PairingCode) => AwaitingPairing,
            (Initializing | AwaitingPairing | Degraded, I::Ready) => Ready,
            (Ready, I::Ready) => Ready,
            (Ready, I::HealthLost) => Degraded,
            (Degraded, I::HealthRestored) => Ready,
            (
                Initializing | AwaitingPairing | Ready | Degraded,
                I::AuthFailure | I::Disconnected | I::Logout,
            ) => Closed,
            (from, input) => {
                return Err(SessionError::InvalidTransition {
                    from: from.to_string(),
                    input: format!("{:?}", input),
                })
            }
        };
        Ok(next)
    }

    /// 是否仍持有（或正在建立）传输句柄
    pub fn is_live(self) -> bool {
        matches!(
            self,
            SessionState::Initializing
                | SessionState::AwaitingPairing
                | SessionState::Ready
                | SessionState::Degraded
        )
    }

    /// 配对流程是否进行中
    pub fn is_pairing(self) -> bool {
        matches!(self, SessionState::Initializing | SessionState::AwaitingPairing)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::AwaitingPairing => "awaiting_pairing",
            SessionState::Ready => "ready",
            SessionState::Degraded => "degraded",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}
