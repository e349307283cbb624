//! CLI 输出格式化

use serde::Serialize;

/// 带 --json 时输出格式化 JSON，否则输出可读文本
pub fn format_output<T: Serialize + std::fmt::Display>(data: &T, json: bool) -> String {
    if json {
        serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
    } else {
        data.to_string()
    }
}
