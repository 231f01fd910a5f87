//! 工具模块

pub mod response;

/// 去除首尾空白；空串视为未提供。
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
