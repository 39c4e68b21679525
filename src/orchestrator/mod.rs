//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `dispatch_runner` - 批量发送编排器
//! - 分批、逐个发送、节奏控制
//! - 批次之间健康检查，会话丢失时中止
//! - 维护计数，推送进度事件，生成最终汇总
//!
//! ### `run_registry` - 运行表
//! - 登记进行中的任务（每个用户最多一个）
//! - 进度轮询、取消
//!
//! ### `dispatcher` - 任务调度
//! - 校验请求，登记任务，在后台执行，结束后移除
//!
//! ## 层次关系
//!
//! ```text
//! dispatcher (处理一次请求)
//!     ↓
//! dispatch_runner (处理 Vec<Recipient>)
//!     ↓
//! workflow::RecipientFlow (处理单个号码)
//!     ↓
//! services (能力层：health / retry / pacing)
//!     ↓
//! transport (MessagingTransport)
//! ```

pub mod dispatch_runner;
pub mod dispatcher;
pub mod run_registry;

pub use dispatch_runner::{DispatchRunner, ProgressSink, RunPlan, RunReport};
pub use dispatcher::{DispatchRequest, Dispatcher, StartedRun};
pub use run_registry::RunRegistry;
