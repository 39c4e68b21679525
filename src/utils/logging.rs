/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use crate::config::Config;
use crate::models::Summary;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// `RUST_LOG` 优先；否则默认 info，`verbose` 时为 debug
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量发送服务");
    info!("🌐 监听地址: {}", config.bind_addr);
    match config.browser_debug_port {
        Some(port) => info!("🧭 浏览器模式: 附加到调试端口 {}", port),
        None => info!("🧭 浏览器模式: 每个用户独立启动 (headless={})", config.headless),
    }
    info!(
        "📊 每批上限: {}，发送间隔: {}-{} 毫秒",
        config.dispatch.max_batch_size, config.dispatch.pacing_min_ms, config.dispatch.pacing_max_ms
    );
    info!("{}", "=".repeat(60));
}

/// 记录任务开始信息
pub fn log_run_start(run_id: &str, total: usize, batch_size: usize, total_batches: usize) {
    info!("[运行 {}] ✓ 共 {} 个待发送号码", run_id, total);
    info!(
        "[运行 {}] 📋 将以每批 {} 个的方式处理，共 {} 批",
        run_id, batch_size, total_batches
    );
}

/// 记录批次开始信息
pub fn log_batch_start(
    run_id: &str,
    batch_num: usize,
    total_batches: usize,
    start: usize,
    end: usize,
    total: usize,
) {
    info!("\n{}", "=".repeat(60));
    info!("[运行 {}] 📦 开始处理第 {}/{} 批", run_id, batch_num, total_batches);
    info!("[运行 {}] 📄 本批号码: {}-{} / 共 {} 个", run_id, start, end, total);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
pub fn log_batch_complete(run_id: &str, batch_num: usize, success: usize, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!(
        "[运行 {}] ✓ 第 {} 批完成: 成功 {}/{}",
        run_id, batch_num, success, total
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(run_id: &str, status: &str, summary: &Summary) {
    info!("\n{}", "=".repeat(60));
    info!("[运行 {}] 📊 任务结束 ({})", run_id, status);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", summary.sent, summary.total);
    info!("❌ 失败: {}", summary.failed);
    info!("📈 成功率: {:.2}%", summary.success_rate);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
