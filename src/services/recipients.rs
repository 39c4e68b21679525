//! 号码列表处理 - 业务能力层
//!
//! 把上传的原始文本变成有序的发送列表，并按排除列表（已回复的号码）过滤

use crate::models::recipient::{normalize, Recipient};
use std::collections::HashSet;
use tracing::debug;

/// 按行拆分、去首尾空白、丢弃空行，保持原有顺序
pub fn parse_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// 排除集合：每行的纯数字形式
pub fn exclusion_set(raw: &str) -> HashSet<String> {
    parse_lines(raw)
        .iter()
        .map(|line| normalize(line))
        .collect()
}

/// 按排除集合过滤，保持顺序和原始文本
pub fn filter_excluded(recipients: Vec<Recipient>, excluded: &HashSet<String>) -> Vec<Recipient> {
    recipients
        .into_iter()
        .filter(|r| !excluded.contains(&r.normalized()))
        .collect()
}

/// 构建发送列表
pub fn build_send_list(raw_recipients: &str, raw_exclusions: Option<&str>) -> Vec<Recipient> {
    let recipients: Vec<Recipient> = parse_lines(raw_recipients)
        .into_iter()
        .map(Recipient::new)
        .collect();

    let Some(raw_exclusions) = raw_exclusions else {
        return recipients;
    };

    let excluded = exclusion_set(raw_exclusions);
    let before = recipients.len();
    let filtered = filter_excluded(recipients, &excluded);
    debug!(
        "排除列表 {} 条，过滤掉 {} 个号码，剩余 {} 个",
        excluded.len(),
        before - filtered.len(),
        filtered.len()
    );
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(list: &[Recipient]) -> Vec<&str> {
        list.iter().map(Recipient::raw).collect()
    }

    #[test]
    fn test_exclusion_example() {
        let list = build_send_list("11999999999\n11888888888\n", Some("11999999999"));
        assert_eq!(raw(&list), vec!["11888888888"]);
    }

    #[test]
    fn test_blank_lines_and_whitespace_dropped() {
        let list = build_send_list("\n  11 1111-1111  \r\n\n\t\n22222222222\n", None);
        assert_eq!(raw(&list), vec!["11 1111-1111", "22222222222"]);
    }

    #[test]
    fn test_exclusion_ignores_formatting() {
        let list = build_send_list(
            "(11) 99999-9999\n11888888888\n11 7777 7777\n",
            Some("  11999999999 \n\n+11-7777-7777"),
        );
        assert_eq!(raw(&list), vec!["11888888888"]);
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let excluded = exclusion_set("11999999999\n11777777777");
        let once = filter_excluded(
            build_send_list("11999999999\n11888888888\n11777777777\n11666666666", None),
            &excluded,
        );
        let twice = filter_excluded(once.clone(), &excluded);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_duplicates_are_kept_in_order() {
        let list = build_send_list("111\n222\n111", Some(""));
        assert_eq!(raw(&list), vec!["111", "222", "111"]);
    }

    #[test]
    fn test_everything_excluded() {
        let list = build_send_list("111\n222", Some("222\n111"));
        assert!(list.is_empty());
    }
}
