use std::path::PathBuf;

use super::{spawn_handler, BrowserLink};
use crate::error::TransportError;
use chromiumoxide::{Browser, BrowserConfig};
use tokio::time::sleep;
use tracing::{debug, error, info};

/// 启动参数
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// 目标 URL
    pub url: String,
    /// 用户 profile 目录，保存登录状态
    pub user_data_dir: PathBuf,
    /// 浏览器可执行文件
    pub executable: Option<PathBuf>,
    pub headless: bool,
}

/// 启动浏览器并导航到指定 URL
pub async fn launch_headless_browser(options: &LaunchOptions) -> Result<BrowserLink, TransportError> {
    info!("🚀 启动浏览器 (profile: {})...", options.user_data_dir.display());
    debug!("目标 URL: {}", options.url);

    let mut builder = BrowserConfig::builder()
        .user_data_dir(&options.user_data_dir)
        .args(vec![
            "--disable-gpu",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--no-first-run",
            "--no-default-browser-check",
        ]);
    builder = if options.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(executable) = &options.executable {
        builder = builder.chrome_executable(executable);
    }

    let config = builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        TransportError::LaunchFailed(e)
    })?;

    let (browser, handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        TransportError::LaunchFailed(e.to_string())
    })?;
    debug!("浏览器启动成功");

    let alive = spawn_handler(handler);

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser.new_page(options.url.as_str()).await.map_err(|e| {
        error!("创建页面失败: {}", e);
        TransportError::NavigationFailed {
            url: options.url.clone(),
            reason: e.to_string(),
        }
    })?;

    info!("✅ 浏览器已导航到: {}", options.url);

    Ok(BrowserLink {
        browser,
        page,
        alive,
    })
}
