//! 基于 chromiumoxide 的网页消息客户端传输
//!
//! 每个用户一个浏览器（或附加模式下一个页面）。后台探测任务轮询页面，
//! 把配对码、就绪、登出翻译成 `TransportEvent`。

use crate::browser::{self, BrowserLink, LaunchOptions};
use crate::config::Config;
use crate::error::{SendError, TransportError};
use crate::infrastructure::JsExecutor;
use crate::transport::{
    MessagingTransport, ReadyInfo, SendAck, TransportConnector, TransportEvent, TransportSession,
};
use async_trait::async_trait;
use chromiumoxide::Browser;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// 页面状态探测脚本
const PROBE_SCRIPT: &str = r#"
(() => {
    const qrEl = document.querySelector('div[data-ref]');
    const ready = !!document.querySelector('#pane-side');
    let me = null;
    try {
        const raw = localStorage.getItem('last-wid-md') || localStorage.getItem('last-wid');
        if (raw) me = raw.replace(/"/g, '');
    } catch (e) {}
    return { qr: qrEl ? qrEl.getAttribute('data-ref') : null, ready, me };
})()
"#;

/// 发送页状态：出现发送按钮 / 号码无效弹窗 / 仍在加载
const SEND_STATE_SCRIPT: &str = r#"
(() => {
    if (document.querySelector('span[data-icon="send"]')) return 'send';
    const popup = document.querySelector('div[data-animate-modal-popup="true"]');
    if (popup && /invalid|inválido|无效/i.test(popup.innerText)) return 'invalid';
    return 'pending';
})()
"#;

const SEND_BUTTON_SELECTOR: &str = r#"span[data-icon="send"]"#;

/// 发送页地址：地址中 `@` 之前的部分作为号码，号码和消息都做 URL 编码
fn send_url(target_url: &str, destination: &str, payload: &str) -> String {
    let phone = destination.split('@').next().unwrap_or(destination);
    format!(
        "{}/send?phone={}&text={}",
        target_url,
        urlencoding::encode(phone),
        urlencoding::encode(payload)
    )
}

#[derive(Debug, Deserialize)]
struct PageProbe {
    qr: Option<String>,
    ready: bool,
    me: Option<String>,
}

/// 浏览器连接器
pub struct BrowserConnector {
    config: Arc<Config>,
}

impl BrowserConnector {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// 用户 profile 目录，用户名中的特殊字符替换为 `_`
    fn profile_dir(&self, user: &str) -> PathBuf {
        let safe: String = user
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        PathBuf::from(&self.config.profile_root).join(safe)
    }
}

#[async_trait]
impl TransportConnector for BrowserConnector {
    async fn connect(&self, user: &str) -> Result<TransportSession, TransportError> {
        let (link, owns_browser) = match self.config.browser_debug_port {
            Some(port) => (
                browser::connect_to_browser_and_page(port, &self.config.target_url).await?,
                false,
            ),
            None => {
                let options = LaunchOptions {
                    url: self.config.target_url.clone(),
                    user_data_dir: self.profile_dir(user),
                    executable: self.config.browser_executable.as_ref().map(PathBuf::from),
                    headless: self.config.headless,
                };
                (browser::launch_headless_browser(&options).await?, true)
            }
        };

        let transport = Arc::new(BrowserTransport::new(user, link, owns_browser, &self.config));
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(transport.clone().watch(tx));

        Ok(TransportSession {
            handle: transport,
            events: rx,
        })
    }
}

/// 浏览器传输句柄
pub struct BrowserTransport {
    user: String,
    executor: JsExecutor,
    browser: Mutex<Option<Browser>>,
    owns_browser: bool,
    alive: Arc<AtomicBool>,
    closed: AtomicBool,
    identity: RwLock<Option<String>>,
    // 页面只有一个，发送必须串行
    send_lock: Mutex<()>,
    target_url: String,
    probe_interval: Duration,
    send_timeout: Duration,
}

impl BrowserTransport {
    fn new(user: &str, link: BrowserLink, owns_browser: bool, config: &Config) -> Self {
        Self {
            user: user.to_string(),
            executor: JsExecutor::new(link.page),
            browser: Mutex::new(Some(link.browser)),
            owns_browser,
            alive: link.alive,
            closed: AtomicBool::new(false),
            identity: RwLock::new(None),
            send_lock: Mutex::new(()),
            target_url: config.target_url.trim_end_matches('/').to_string(),
            probe_interval: Duration::from_millis(config.probe_interval_ms),
            send_timeout: Duration::from_millis(config.send_timeout_ms),
        }
    }

    fn set_identity(&self, identity: Option<String>) {
        if let Ok(mut guard) = self.identity.write() {
            *guard = identity;
        }
    }

    /// 后台探测页面状态，直到连接断开或事件接收方离开
    async fn watch(self: Arc<Self>, events: mpsc::Sender<TransportEvent>) {
        let mut last_qr: Option<String> = None;
        let mut was_ready = false;

        loop {
            if events.is_closed() {
                debug!("[用户 {}] 事件接收方已离开，停止探测", self.user);
                break;
            }
            if !self.is_open() {
                let _ = events
                    .send(TransportEvent::Disconnected("浏览器连接已断开".to_string()))
                    .await;
                break;
            }

            match self.executor.eval_as::<PageProbe>(PROBE_SCRIPT).await {
                Ok(probe) if probe.ready => {
                    if !was_ready {
                        let identity = probe.me.unwrap_or_else(|| self.user.clone());
                        info!("[用户 {}] ✓ 客户端已就绪: {}", self.user, identity);
                        self.set_identity(Some(identity.clone()));
                        let info = ReadyInfo {
                            identity,
                            ready_at: chrono::Utc::now(),
                        };
                        if events.send(TransportEvent::Ready(info)).await.is_err() {
                            break;
                        }
                        was_ready = true;
                        last_qr = None;
                    }
                }
                Ok(PageProbe { qr: Some(qr), .. }) => {
                    if was_ready {
                        warn!("[用户 {}] ⚠️ 已就绪的会话重新出现配对码，视为登出", self.user);
                        self.set_identity(None);
                        let _ = events
                            .send(TransportEvent::Disconnected("账号已登出".to_string()))
                            .await;
                        break;
                    }
                    if last_qr.as_deref() != Some(qr.as_str()) {
                        debug!("[用户 {}] 收到新的配对码", self.user);
                        if events.send(TransportEvent::PairingCode(qr.clone())).await.is_err() {
                            break;
                        }
                        last_qr = Some(qr);
                    }
                }
                Ok(_) => {}
                // 页面导航（例如发送时）期间脚本可能失败
                Err(e) => debug!("[用户 {}] 页面探测失败: {}", self.user, e),
            }

            sleep(self.probe_interval).await;
        }
    }

    /// 等待发送按钮出现，或识别出号码无效
    async fn wait_for_send_button(&self, destination: &str) -> Result<(), SendError> {
        let deadline = Instant::now() + self.send_timeout;
        loop {
            if !self.is_open() {
                return Err(SendError::SessionClosed("浏览器连接已断开".to_string()));
            }
            let state: String = self
                .executor
                .eval_as(SEND_STATE_SCRIPT)
                .await
                .unwrap_or_else(|_| "pending".to_string());
            match state.as_str() {
                "send" => return Ok(()),
                "invalid" => {
                    return Err(SendError::Rejected(format!("号码无效: {}", destination)));
                }
                _ => {}
            }
            if Instant::now() >= deadline {
                return Err(SendError::Transient(format!(
                    "等待发送按钮超时 ({} 毫秒)",
                    self.send_timeout.as_millis()
                )));
            }
            sleep(Duration::from_millis(500)).await;
        }
    }
}

#[async_trait]
impl MessagingTransport for BrowserTransport {
    fn is_open(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    fn identity(&self) -> Option<String> {
        self.identity.read().ok().and_then(|guard| guard.clone())
    }

    async fn send_text(&self, destination: &str, payload: &str) -> Result<SendAck, SendError> {
        if !self.is_open() {
            return Err(SendError::SessionClosed("浏览器连接已断开".to_string()));
        }
        let _guard = self.send_lock.lock().await;

        let url = send_url(&self.target_url, destination, payload);
        debug!("[用户 {}] 打开发送页: {}", self.user, destination);

        self.executor.page().goto(url.as_str()).await?;
        self.wait_for_send_button(destination).await?;
        self.executor
            .page()
            .find_element(SEND_BUTTON_SELECTOR)
            .await?
            .click()
            .await?;

        // 等待消息进入发送队列
        sleep(Duration::from_millis(1_500)).await;

        Ok(SendAck {
            destination: destination.to_string(),
        })
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        self.set_identity(None);

        let browser = self.browser.lock().await.take();
        match browser {
            Some(mut browser) if self.owns_browser => {
                browser.close().await?;
                info!("[用户 {}] 🗑️ 浏览器已关闭", self.user);
            }
            // 附加模式下只关闭自己的页面，浏览器属于外部
            Some(_) => {
                self.executor.page().clone().close().await?;
                info!("[用户 {}] 🗑️ 页面已关闭", self.user);
            }
            None => {}
        }
        Ok(())
    }
}
