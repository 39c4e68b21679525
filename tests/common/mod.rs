//! 测试用的假传输层
#![allow(dead_code)]

use async_trait::async_trait;
use bulk_sender::config::{Config, DispatchSettings};
use bulk_sender::error::{SendError, TransportError};
use bulk_sender::transport::{
    MessagingTransport, ReadyInfo, SendAck, TransportConnector, TransportEvent, TransportSession,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

pub const IDENTITY: &str = "5511900000000@c.us";

/// 可编排回复的假传输句柄
pub struct MockTransport {
    open: AtomicBool,
    closed: AtomicBool,
    identity: Mutex<Option<String>>,
    script: Mutex<VecDeque<Result<(), SendError>>>,
    unhealthy_after: Option<usize>,
    calls: AtomicUsize,
    sent: Mutex<Vec<String>>,
    call_times: Mutex<Vec<Instant>>,
}

impl MockTransport {
    /// 已配对、可发送
    pub fn paired() -> Self {
        Self {
            open: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            identity: Mutex::new(Some(IDENTITY.to_string())),
            script: Mutex::new(VecDeque::new()),
            unhealthy_after: None,
            calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            call_times: Mutex::new(Vec::new()),
        }
    }

    /// 已打开但还没配对
    pub fn unpaired() -> Self {
        let transport = Self::paired();
        *transport.identity.lock().unwrap() = None;
        transport
    }

    /// 按顺序返回这些结果，用完之后一律成功
    pub fn with_script(self, script: Vec<Result<(), SendError>>) -> Self {
        *self.script.lock().unwrap() = script.into();
        self
    }

    /// 第 n 次发送之后控制通道关闭
    pub fn unhealthy_after(mut self, sends: usize) -> Self {
        self.unhealthy_after = Some(sends);
        self
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn pair(&self, identity: &str) {
        *self.identity.lock().unwrap() = Some(identity.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingTransport for MockTransport {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn identity(&self) -> Option<String> {
        self.identity.lock().unwrap().clone()
    }

    async fn send_text(&self, destination: &str, _payload: &str) -> Result<SendAck, SendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.call_times.lock().unwrap().push(Instant::now());
        let reply = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));

        if self.unhealthy_after == Some(call) {
            self.set_open(false);
        }

        reply.map(|_| {
            self.sent.lock().unwrap().push(destination.to_string());
            SendAck {
                destination: destination.to_string(),
            }
        })
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        self.set_open(false);
        Ok(())
    }
}

/// 假连接器：记录每次建立的句柄和事件发送端
#[derive(Default)]
pub struct MockConnector {
    auto_ready: bool,
    fail: bool,
    connections: Mutex<Vec<(Arc<MockTransport>, mpsc::Sender<TransportEvent>)>>,
}

impl MockConnector {
    /// 连接后停在等待配对
    pub fn manual() -> Self {
        Self::default()
    }

    /// 连接后立即就绪
    pub fn auto_ready() -> Self {
        Self {
            auto_ready: true,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    pub fn transport(&self, index: usize) -> Arc<MockTransport> {
        self.connections.lock().unwrap()[index].0.clone()
    }

    pub fn events(&self, index: usize) -> mpsc::Sender<TransportEvent> {
        self.connections.lock().unwrap()[index].1.clone()
    }
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn connect(&self, _user: &str) -> Result<TransportSession, TransportError> {
        if self.fail {
            return Err(TransportError::LaunchFailed("no browser".to_string()));
        }

        let (tx, rx) = mpsc::channel(16);
        let transport = Arc::new(MockTransport::unpaired());
        if self.auto_ready {
            transport.pair(IDENTITY);
            let _ = tx.send(TransportEvent::Ready(ready_info())).await;
        }
        self.connections
            .lock()
            .unwrap()
            .push((transport.clone(), tx));

        Ok(TransportSession {
            handle: transport,
            events: rx,
        })
    }
}

pub fn ready_info() -> ReadyInfo {
    ReadyInfo {
        identity: IDENTITY.to_string(),
        ready_at: chrono::Utc::now(),
    }
}

/// 让后台任务跑一会儿
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// 没有任何等待的调度参数
pub fn instant_settings() -> DispatchSettings {
    DispatchSettings {
        pacing_min_ms: 0,
        pacing_max_ms: 0,
        failure_cooldown_ms: 0,
        inter_batch_delay_ms: 0,
        retry_base_delay_ms: 0,
        retry_jitter_ms: 0,
        ..DispatchSettings::default()
    }
}

pub fn test_config() -> Config {
    Config {
        dispatch: instant_settings(),
        ..Config::default()
    }
}

pub fn numbers(raw: &[&str]) -> Vec<bulk_sender::models::Recipient> {
    raw.iter().map(|n| bulk_sender::models::Recipient::new(*n)).collect()
}
