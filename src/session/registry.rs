//! 会话注册表
//!
//! 每个用户一条记录，持有该用户唯一的传输句柄。
//! 重新初始化会生成新的 generation，旧句柄的事件被忽略、旧句柄在后台关闭。

use crate::error::SessionError;
use crate::services::{HealthMonitor, HealthReport};
use crate::session::state::{SessionInput, SessionState};
use crate::transport::{MessagingTransport, ReadyInfo, TransportConnector, TransportEvent};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

/// 初始化请求的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitOutcome {
    /// 已有健康句柄，什么都没做
    Ready,
    /// 配对流程已开始（或本来就在进行中）
    Initializing,
}

/// 会话状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub user: String,
    pub state: SessionState,
    pub healthy: bool,
    /// 健康检查的各项信号
    pub health: HealthReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<ReadyInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

struct SessionEntry {
    state: SessionState,
    generation: u64,
    handle: Option<Arc<dyn MessagingTransport>>,
    pairing_code: Option<String>,
    ready_info: Option<ReadyInfo>,
    last_error: Option<String>,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            generation: 0,
            handle: None,
            pairing_code: None,
            ready_info: None,
            last_error: None,
        }
    }

    fn transition(&mut self, user: &str, input: SessionInput) -> bool {
        match self.state.next(input) {
            Ok(next) => {
                if next != self.state {
                    debug!("[用户 {}] 会话状态: {} → {}", user, self.state, next);
                }
                self.state = next;
                true
            }
            Err(e) => {
                warn!("[用户 {}] ⚠️ 忽略事件: {}", user, e);
                false
            }
        }
    }

    /// 按健康检查结果校正 Ready / Degraded
    fn reconcile(&mut self, user: &str) -> bool {
        let healthy = HealthMonitor::is_healthy(self.handle.as_deref());
        match (self.state, healthy) {
            (SessionState::Ready, false) => {
                self.transition(user, SessionInput::HealthLost);
            }
            (SessionState::Degraded, true) => {
                self.transition(user, SessionInput::HealthRestored);
            }
            _ => {}
        }
        healthy
    }

    /// 处理一条传输事件；会话关闭时返回需要释放的句柄
    fn apply(&mut self, user: &str, event: TransportEvent) -> Option<Arc<dyn MessagingTransport>> {
        match event {
            TransportEvent::PairingCode(code) => {
                if self.transition(user, SessionInput::PairingCode) {
                    info!("[用户 {}] 📱 等待扫码配对", user);
                    self.pairing_code = Some(code);
                }
                None
            }
            TransportEvent::Ready(ready) => {
                if self.transition(user, SessionInput::Ready) {
                    info!("[用户 {}] ✅ 会话已就绪: {}", user, ready.identity);
                    self.pairing_code = None;
                    self.ready_info = Some(ready);
                    self.last_error = None;
                }
                None
            }
            TransportEvent::AuthFailure(reason) => self.close(user, SessionInput::AuthFailure, reason),
            TransportEvent::Disconnected(reason) => self.close(user, SessionInput::Disconnected, reason),
        }
    }

    fn close(
        &mut self,
        user: &str,
        input: SessionInput,
        reason: String,
    ) -> Option<Arc<dyn MessagingTransport>> {
        if !self.transition(user, input) {
            return None;
        }
        warn!("[用户 {}] ⚠️ 会话已关闭: {}", user, reason);
        self.pairing_code = None;
        self.ready_info = None;
        self.last_error = Some(reason);
        self.handle.take()
    }

    fn status(&self, user: &str, healthy: bool) -> SessionStatus {
        SessionStatus {
            user: user.to_string(),
            state: self.state,
            healthy,
            health: HealthMonitor::report(self.handle.as_deref()),
            pairing_code: self.pairing_code.clone(),
            info: self.ready_info.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

struct RegistryInner {
    connector: Arc<dyn TransportConnector>,
    sessions: RwLock<HashMap<String, SessionEntry>>,
    next_generation: AtomicU64,
}

/// 会话注册表
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn TransportConnector>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                connector,
                sessions: RwLock::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// 已有健康句柄时直接返回 Ready；配对进行中时返回 Initializing；
    /// 否则替换旧记录并在后台开始新的配对流程
    pub async fn get_or_init(&self, user: &str) -> InitOutcome {
        let superseded = {
            let mut sessions = self.inner.sessions.write().await;
            let entry = sessions
                .entry(user.to_string())
                .or_insert_with(SessionEntry::new);

            if entry.reconcile(user) {
                return InitOutcome::Ready;
            }
            if entry.state.is_pairing() {
                debug!("[用户 {}] 配对流程已在进行中", user);
                return InitOutcome::Initializing;
            }
            if entry.state == SessionState::Ready {
                entry.transition(user, SessionInput::HealthLost);
            }
            entry.transition(user, SessionInput::InitRequested);
            entry.generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
            entry.pairing_code = None;
            entry.ready_info = None;
            entry.last_error = None;

            let generation = entry.generation;
            let registry = self.clone();
            let owner = user.to_string();
            tokio::spawn(async move { registry.establish(owner, generation).await });

            entry.handle.take()
        };

        if let Some(old) = superseded {
            info!("[用户 {}] 🔄 旧句柄被替换，后台关闭", user);
            dispose(user, old);
        }
        info!("[用户 {}] 🚀 开始初始化会话", user);
        InitOutcome::Initializing
    }

    /// 当前句柄（任意状态）
    pub async fn get(&self, user: &str) -> Option<Arc<dyn MessagingTransport>> {
        let sessions = self.inner.sessions.read().await;
        sessions.get(user).and_then(|entry| entry.handle.clone())
    }

    /// 健康的句柄，否则返回错误
    pub async fn ready_handle(&self, user: &str) -> Result<Arc<dyn MessagingTransport>, SessionError> {
        let mut sessions = self.inner.sessions.write().await;
        let entry = sessions
            .get_mut(user)
            .ok_or_else(|| SessionError::NotFound(user.to_string()))?;
        if entry.reconcile(user) {
            if let Some(handle) = entry.handle.clone() {
                return Ok(handle);
            }
        }
        Err(SessionError::NotReady {
            user: user.to_string(),
            state: entry.state.to_string(),
        })
    }

    /// 会话状态（顺带按健康检查校正 Ready / Degraded）
    pub async fn status(&self, user: &str) -> SessionStatus {
        let mut sessions = self.inner.sessions.write().await;
        match sessions.get_mut(user) {
            Some(entry) => {
                let healthy = entry.reconcile(user);
                entry.status(user, healthy)
            }
            None => SessionEntry::new().status(user, false),
        }
    }

    /// 当前配对码；已配对或未初始化时为 None
    pub async fn pairing_code(&self, user: &str) -> Option<String> {
        let sessions = self.inner.sessions.read().await;
        sessions.get(user).and_then(|entry| entry.pairing_code.clone())
    }

    /// 登出：移除记录并关闭句柄
    pub async fn invalidate(&self, user: &str) -> bool {
        let removed = self.inner.sessions.write().await.remove(user);
        match removed {
            Some(mut entry) => {
                entry.transition(user, SessionInput::Logout);
                if let Some(handle) = entry.handle.take() {
                    dispose(user, handle);
                }
                info!("[用户 {}] 👋 会话已注销", user);
                true
            }
            None => false,
        }
    }

    /// 仍持有或正在建立句柄的会话数量
    pub async fn live_count(&self) -> usize {
        let sessions = self.inner.sessions.read().await;
        sessions.values().filter(|entry| entry.state.is_live()).count()
    }

    /// 建立连接并持续消费事件
    async fn establish(self, user: String, generation: u64) {
        let session = match self.inner.connector.connect(&user).await {
            Ok(session) => session,
            Err(e) => {
                error!("[用户 {}] ❌ 建立连接失败: {}", user, e);
                let mut sessions = self.inner.sessions.write().await;
                if let Some(entry) = sessions.get_mut(&user).filter(|e| e.generation == generation) {
                    entry.close(&user, SessionInput::Disconnected, e.to_string());
                }
                return;
            }
        };

        {
            let mut sessions = self.inner.sessions.write().await;
            match sessions.get_mut(&user).filter(|e| e.generation == generation) {
                Some(entry) => entry.handle = Some(session.handle.clone()),
                None => {
                    drop(sessions);
                    debug!("[用户 {}] 连接建立时已被替换，关闭新句柄", user);
                    dispose(&user, session.handle);
                    return;
                }
            }
        }

        self.pump(&user, generation, session.events).await;
    }

    async fn pump(&self, user: &str, generation: u64, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            let released = {
                let mut sessions = self.inner.sessions.write().await;
                let Some(entry) = sessions.get_mut(user).filter(|e| e.generation == generation) else {
                    debug!("[用户 {}] 会话已被替换，停止处理旧事件", user);
                    break;
                };
                let closed = matches!(
                    event,
                    TransportEvent::AuthFailure(_) | TransportEvent::Disconnected(_)
                );
                let released = entry.apply(user, event);
                if closed {
                    Some(released)
                } else {
                    None
                }
            };

            if let Some(released) = released {
                if let Some(handle) = released {
                    dispose(user, handle);
                }
                break;
            }
        }
    }
}

/// 后台关闭句柄，失败只记日志
fn dispose(user: &str, handle: Arc<dyn MessagingTransport>) {
    let user = user.to_string();
    tokio::spawn(async move {
        if let Err(e) = handle.close().await {
            warn!("[用户 {}] ⚠️ 关闭旧句柄失败: {}", user, e);
        }
    });
}
