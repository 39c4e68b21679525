//! 传输层抽象
//!
//! 编排层只认识 `MessagingTransport`：能不能用、是谁、发一条消息、关闭。
//! 配对、就绪、掉线等外部通知通过 `TransportEvent` 通道送给会话注册表。

pub mod browser_transport;

pub use browser_transport::{BrowserConnector, BrowserTransport};

use crate::error::{SendError, TransportError};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// 一次成功发送的回执
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendAck {
    /// 实际使用的目标地址
    pub destination: String,
}

/// 就绪时记录的账号信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyInfo {
    /// 登录账号标识
    pub identity: String,
    pub ready_at: chrono::DateTime<chrono::Utc>,
}

/// 传输层推送的外部事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// 收到新的配对码
    PairingCode(String),
    /// 配对完成，可以发送
    Ready(ReadyInfo),
    /// 认证失败
    AuthFailure(String),
    /// 连接断开
    Disconnected(String),
}

/// 单个用户的消息传输句柄
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    /// 底层控制通道是否仍然打开
    fn is_open(&self) -> bool;

    /// 已配对的账号标识，未配对时为 None
    fn identity(&self) -> Option<String>;

    /// 发送一条文本消息
    async fn send_text(&self, destination: &str, payload: &str) -> Result<SendAck, SendError>;

    /// 关闭句柄，释放底层资源
    async fn close(&self) -> Result<(), TransportError>;
}

/// 新建立的传输会话：句柄 + 事件通道
pub struct TransportSession {
    pub handle: Arc<dyn MessagingTransport>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// 为用户建立传输会话
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, user: &str) -> Result<TransportSession, TransportError>;
}
