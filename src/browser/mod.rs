//! 浏览器连接
//!
//! 两种方式拿到页面：为用户启动独立的无头浏览器，或附加到已开调试端口的浏览器

pub mod connection;
pub mod headless;

pub use connection::connect_to_browser_and_page;
pub use headless::{launch_headless_browser, LaunchOptions};

use chromiumoxide::handler::Handler;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// 一个浏览器连接及其页面
pub struct BrowserLink {
    pub browser: Browser,
    pub page: Page,
    /// CDP 事件循环是否仍在运行
    pub alive: Arc<AtomicBool>,
}

/// 在后台处理浏览器事件，事件流结束时把 `alive` 置为 false
pub(crate) fn spawn_handler(mut handler: Handler) -> Arc<AtomicBool> {
    let alive = Arc::new(AtomicBool::new(true));
    let flag = alive.clone();
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if let Err(e) = h {
                debug!("浏览器事件处理出错: {}", e);
            }
        }
        flag.store(false, Ordering::SeqCst);
        debug!("浏览器事件循环已结束");
    });
    alive
}
