//! # Bulk Sender
//!
//! 为每个登录用户驱动一个网页消息客户端会话，把同一条消息按节奏逐个发送给上传的号码列表
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 启动或附加浏览器，拿到页面
//! - `infrastructure/` - `JsExecutor`，唯一的 page owner，提供 eval() 能力
//! - `transport/` - `MessagingTransport` 抽象及其浏览器实现
//!
//! ### ② 业务能力层（Services）
//! - `HealthMonitor` - 句柄是否可用
//! - `send_with_retry` - 带健康检查和指数退避的单次发送
//! - `build_send_list` - 号码列表解析与排除
//! - `Pacer` - 可取消的节奏等待
//!
//! ### ③ 流程层（Workflow）
//! - `RecipientCtx` - 上下文封装（run_id + 号码序号 + 批次）
//! - `RecipientFlow` - 单个号码的处理流程（地址 → 发送 → 结果归类）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/dispatch_runner` - 分批、节奏、健康中止、进度
//! - `orchestrator/dispatcher` - 校验、登记、后台执行
//! - `session/` - 每个用户的会话状态机与注册表
//!
//! ### ⑤ 接口层（API）
//! - `api/` - axum 路由，NDJSON 流式进度
//!
//! ## 模块结构

pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod session;
pub mod transport;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use api::{router, AppState};
pub use config::Config;
pub use error::AppError;
pub use models::{DispatchEvent, Recipient, RunProgress, SendRecord, Summary};
pub use orchestrator::{DispatchRequest, Dispatcher};
pub use session::{InitOutcome, SessionRegistry};
pub use transport::{BrowserConnector, MessagingTransport, TransportConnector};
