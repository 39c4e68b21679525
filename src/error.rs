use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器/传输层错误
    #[error("传输错误: {0}")]
    Transport(#[from] TransportError),
    /// 单次发送错误
    #[error("发送错误: {0}")]
    Send(#[from] SendError),
    /// 会话错误
    #[error("会话错误: {0}")]
    Session(#[from] SessionError),
    /// 发送任务错误
    #[error("任务错误: {0}")]
    Dispatch(#[from] DispatchError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum TransportError {
    /// 启动浏览器失败
    #[error("启动浏览器失败: {0}")]
    LaunchFailed(String),
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {reason}")]
    ConnectionFailed { port: u16, reason: String },
    /// 创建页面或导航失败
    #[error("打开页面 {url} 失败: {reason}")]
    NavigationFailed { url: String, reason: String },
    /// 执行脚本失败
    #[error("执行脚本失败: {0}")]
    ScriptFailed(String),
    /// 句柄已关闭
    #[error("传输句柄已关闭")]
    Closed,
}

impl From<chromiumoxide::error::CdpError> for TransportError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        TransportError::ScriptFailed(err.to_string())
    }
}

/// 单次发送错误
///
/// 只有 `Transient` 会被重试；`Rejected` 只影响当前号码；其余几种会终止整个发送任务
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    /// 发送前的健康检查未通过，号码没有被尝试
    #[error("client not healthy")]
    NotHealthy,
    /// 至少尝试过一次之后，重试前的健康检查未通过；携带上一次失败原因
    #[error("client not healthy after failed attempt: {0}")]
    HealthLost(String),
    /// 会话已关闭
    #[error("session closed: {0}")]
    SessionClosed(String),
    /// 协议错误
    #[error("protocol error: {0}")]
    Protocol(String),
    /// 网络抖动、超时等临时错误
    #[error("{0}")]
    Transient(String),
    /// 对端拒绝（号码无效等），重试也不会成功
    #[error("rejected: {0}")]
    Rejected(String),
}

impl SendError {
    /// 是否会话级致命错误
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            SendError::NotHealthy
                | SendError::HealthLost(_)
                | SendError::SessionClosed(_)
                | SendError::Protocol(_)
        )
    }

    /// 是否值得重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, SendError::Transient(_))
    }

    /// 按错误信息给底层失败归类
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        if lower.contains("session closed") || lower.contains("target closed") {
            SendError::SessionClosed(message)
        } else if lower.contains("protocol error") {
            SendError::Protocol(message)
        } else {
            SendError::Transient(message)
        }
    }
}

impl From<TransportError> for SendError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Closed => SendError::SessionClosed(err.to_string()),
            other => SendError::classify(other.to_string()),
        }
    }
}

impl From<chromiumoxide::error::CdpError> for SendError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        SendError::classify(err.to_string())
    }
}

/// 会话错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// 用户没有会话
    #[error("用户 {0} 没有会话")]
    NotFound(String),
    /// 会话未就绪
    #[error("用户 {user} 的会话未就绪 (当前状态: {state})")]
    NotReady { user: String, state: String },
    /// 非法状态迁移
    #[error("非法状态迁移: {from} --{input}-->")]
    InvalidTransition { from: String, input: String },
}

/// 发送任务错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// 缺少消息内容
    #[error("消息内容不能为空")]
    MissingMessage,
    /// 缺少号码文件
    #[error("缺少号码列表")]
    MissingRecipients,
    /// 号码列表为空
    #[error("号码列表没有有效行")]
    EmptyRecipients,
    /// 参数格式错误
    #[error("参数 {field} 无效: {value}")]
    InvalidField { field: String, value: String },
    /// 该用户已有进行中的任务
    #[error("用户 {user} 已有进行中的任务 {run_id}")]
    AlreadyRunning { user: String, run_id: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 参数不合法
    #[error("配置不合法: {0}")]
    Invalid(String),
}
