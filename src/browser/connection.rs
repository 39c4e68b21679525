use super::{spawn_handler, BrowserLink};
use crate::error::TransportError;
use chromiumoxide::Browser;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// 连接到已开启调试端口的浏览器，并为目标地址新建页面
pub async fn connect_to_browser_and_page(
    port: u16,
    target_url: &str,
) -> Result<BrowserLink, TransportError> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);
    debug!("目标 URL: {}", target_url);

    let (browser, handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        TransportError::ConnectionFailed {
            port,
            reason: e.to_string(),
        }
    })?;
    debug!("浏览器连接成功");

    let alive = spawn_handler(handler);

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建新页面失败: {}", e);
        TransportError::NavigationFailed {
            url: "about:blank".to_string(),
            reason: e.to_string(),
        }
    })?;
    page.goto(target_url).await.map_err(|e| {
        error!("导航到 {} 失败: {}", target_url, e);
        TransportError::NavigationFailed {
            url: target_url.to_string(),
            reason: e.to_string(),
        }
    })?;
    info!("已导航到: {}", target_url);

    Ok(BrowserLink {
        browser,
        page,
        alive,
    })
}
