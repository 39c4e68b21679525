//! 号码模型
//!
//! 上传文本中的一行对应一个 `Recipient`，保留原始文本，
//! 排除匹配和地址构造都基于纯数字的规范形式。

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// 地址分隔符：原始文本里已经带有它时视为完整地址
pub const ADDRESS_SEPARATOR: char = '@';

fn non_digit() -> &'static Regex {
    static NON_DIGIT: OnceLock<Regex> = OnceLock::new();
    NON_DIGIT.get_or_init(|| Regex::new(r"[^0-9]+").expect("静态正则"))
}

/// 把原始号码规范为只含 ASCII 数字的形式
pub fn normalize(raw: &str) -> String {
    non_digit().replace_all(raw, "").into_owned()
}

/// 单个接收方
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Recipient {
    raw: String,
}

impl Recipient {
    /// 用去掉首尾空白的原始文本创建
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into().trim().to_string(),
        }
    }

    /// 原始文本（回报给调用方的就是它）
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// 纯数字规范形式
    pub fn normalized(&self) -> String {
        normalize(&self.raw)
    }

    /// 构造传输层地址
    ///
    /// 原始文本含 `@` 时原样使用，否则为 数字 + 域后缀
    pub fn address(&self, suffix: &str) -> String {
        if self.raw.contains(ADDRESS_SEPARATOR) {
            self.raw.clone()
        } else {
            format!("{}{}", self.normalized(), suffix)
        }
    }
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
