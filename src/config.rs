/// 程序配置文件
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_FILE: &str = "bulk_sender.toml";

/// 节奏倍数下限
pub const MIN_PACING_MULTIPLIER: f64 = 0.1;
/// 节奏倍数上限
pub const MAX_PACING_MULTIPLIER: f64 = 10.0;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP 监听地址
    pub bind_addr: String,
    /// 浏览器调试端口（设置后附加到已有浏览器，而不是为每个用户启动无头浏览器）
    pub browser_debug_port: Option<u16>,
    /// 浏览器可执行文件路径，未设置时由 chromiumoxide 自动查找
    pub browser_executable: Option<String>,
    /// 是否使用无头模式
    pub headless: bool,
    /// 每个用户的浏览器 profile 根目录
    pub profile_root: String,
    /// 消息客户端网页地址
    pub target_url: String,
    /// 号码转地址时追加的域后缀
    pub address_suffix: String,
    /// 页面探测间隔（毫秒）
    pub probe_interval_ms: u64,
    /// 发送按钮等待超时（毫秒）
    pub send_timeout_ms: u64,
    /// 上传文件大小上限（字节）
    pub max_upload_bytes: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 发送调度参数
    pub dispatch: DispatchSettings,
}

/// 发送调度参数
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchSettings {
    /// 每批数量的硬上限
    pub max_batch_size: usize,
    /// 调用方未指定时的每批数量
    pub default_batch_size: usize,
    /// 发送成功后的随机间隔下限（毫秒）
    pub pacing_min_ms: u64,
    /// 发送成功后的随机间隔上限（毫秒）
    pub pacing_max_ms: u64,
    /// 发送失败后的冷却时间（毫秒）
    pub failure_cooldown_ms: u64,
    /// 批次之间的间隔（毫秒）
    pub inter_batch_delay_ms: u64,
    /// 单个号码最多尝试次数
    pub retry_max_attempts: u32,
    /// 重试基础退避（毫秒）
    pub retry_base_delay_ms: u64,
    /// 重试抖动上限（毫秒，不含）
    pub retry_jitter_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            browser_debug_port: None,
            browser_executable: None,
            headless: true,
            profile_root: "profiles".to_string(),
            target_url: "https://web.whatsapp.com".to_string(),
            address_suffix: "@c.us".to_string(),
            probe_interval_ms: 1_000,
            send_timeout_ms: 30_000,
            max_upload_bytes: 2 * 1024 * 1024,
            verbose_logging: false,
            dispatch: DispatchSettings::default(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_batch_size: 15,
            default_batch_size: 10,
            pacing_min_ms: 8_000,
            pacing_max_ms: 15_000,
            failure_cooldown_ms: 3_000,
            inter_batch_delay_ms: 10_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 2_000,
            retry_jitter_ms: 1_000,
        }
    }
}

impl DispatchSettings {
    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_millis(self.failure_cooldown_ms)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    /// 把调用方给的每批数量限制在 [1, max_batch_size]
    pub fn clamp_batch_size(&self, requested: Option<i64>) -> usize {
        let cap = self.max_batch_size.max(1);
        match requested {
            None => self.default_batch_size.clamp(1, cap),
            Some(n) if n <= 0 => 1,
            Some(n) => usize::try_from(n).unwrap_or(cap).min(cap),
        }
    }

    /// 节奏倍数：非有限值或负数按 1.0 处理，范围 [0.1, 10.0]，不允许关闭间隔
    pub fn clamp_pacing_multiplier(requested: Option<f64>) -> f64 {
        match requested {
            Some(m) if m.is_finite() && m >= 0.0 => {
                m.clamp(MIN_PACING_MULTIPLIER, MAX_PACING_MULTIPLIER)
            }
            _ => 1.0,
        }
    }
}

impl Config {
    /// 加载配置：默认值 → TOML 文件 → 环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let path = std::env::var("BULK_SENDER_CONFIG").ok();
        let base = match path.as_deref() {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => Self::default(),
        };

        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::TomlParseFailed { source, .. } => ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: String::new(),
            source,
        })
    }

    /// 用环境变量覆盖已有配置
    pub fn with_env_overrides(self) -> Self {
        let d = self.dispatch;
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(self.bind_addr),
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).or(self.browser_debug_port),
            browser_executable: std::env::var("BROWSER_EXECUTABLE").ok().or(self.browser_executable),
            headless: std::env::var("HEADLESS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.headless),
            profile_root: std::env::var("PROFILE_ROOT").unwrap_or(self.profile_root),
            target_url: std::env::var("TARGET_URL").unwrap_or(self.target_url),
            address_suffix: std::env::var("ADDRESS_SUFFIX").unwrap_or(self.address_suffix),
            probe_interval_ms: std::env::var("PROBE_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.probe_interval_ms),
            send_timeout_ms: std::env::var("SEND_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.send_timeout_ms),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES").ok().and_then(|v| v.parse().ok()).unwrap_or(self.max_upload_bytes),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(self.verbose_logging),
            dispatch: DispatchSettings {
                max_batch_size: std::env::var("MAX_BATCH_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(d.max_batch_size),
                default_batch_size: std::env::var("DEFAULT_BATCH_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(d.default_batch_size),
                pacing_min_ms: std::env::var("PACING_MIN_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.pacing_min_ms),
                pacing_max_ms: std::env::var("PACING_MAX_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.pacing_max_ms),
                failure_cooldown_ms: std::env::var("FAILURE_COOLDOWN_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.failure_cooldown_ms),
                inter_batch_delay_ms: std::env::var("INTER_BATCH_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.inter_batch_delay_ms),
                retry_max_attempts: std::env::var("RETRY_MAX_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.retry_max_attempts),
                retry_base_delay_ms: std::env::var("RETRY_BASE_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.retry_base_delay_ms),
                retry_jitter_ms: std::env::var("RETRY_JITTER_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.retry_jitter_ms),
            },
        }
    }

    /// 校验互相矛盾的参数
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.dispatch;
        if d.max_batch_size == 0 {
            return Err(ConfigError::Invalid("max_batch_size 不能为 0".to_string()));
        }
        if d.pacing_min_ms > d.pacing_max_ms {
            return Err(ConfigError::Invalid(format!(
                "pacing_min_ms ({}) 大于 pacing_max_ms ({})",
                d.pacing_min_ms, d.pacing_max_ms
            )));
        }
        if d.retry_max_attempts == 0 {
            return Err(ConfigError::Invalid("retry_max_attempts 至少为 1".to_string()));
        }
        if self.address_suffix.is_empty() {
            return Err(ConfigError::Invalid("address_suffix 不能为空".to_string()));
        }
        Ok(())
    }
}
