//! 通知记录 - store 交给反馈引擎的通知快照
//!
//! 应用传来的字段类型不可信，所有读取都做宽松转换，转换失败时回落到默认值，
//! 不会因为某个字段类型不对而丢掉整条通知。

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// 反馈效果名列表（逗号分隔）
pub const HINT_FEEDBACK: &str = "x-nemo-feedback";
/// 没有 summary 和 body 时关闭 LED（默认 true）
pub const HINT_LED_DISABLED_WITHOUT_BODY_AND_SUMMARY: &str =
    "x-nemo-led-disabled-without-body-and-summary";
/// 关闭声音
pub const HINT_SUPPRESS_SOUND: &str = "suppress-sound";
/// 来源应用包名（Android 应用）
pub const HINT_ORIGIN_PACKAGE: &str = "x-nemo-origin-package";
/// 声音文件路径，可带 `file://` 前缀
pub const HINT_SOUND_FILE: &str = "sound-file";
/// 明确的振动请求，不受最低优先级限制
pub const HINT_VIBRA: &str = "x-nemo-vibrate";
/// 要求点亮屏幕，视为紧急通知
pub const HINT_DISPLAY_ON: &str = "x-nemo-display-on";

/// urgency 达到该值即为紧急通知
pub const CRITICAL_URGENCY: u8 = 2;

/// 通知 ID（由 store 分配）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub u32);

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NotificationId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// 把任意 JSON 值转换为 bool
///
/// 数字非 0 为 true；字符串只有 `""`、`"0"`、`"false"`（不区分大小写，不去空白）
/// 为 false；缺失、null、数组和对象返回 `default`。
pub fn value_to_bool(value: Option<&serde_json::Value>, default: bool) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(default),
        Some(serde_json::Value::String(s)) => {
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        _ => default,
    }
}

/// 把任意 JSON 值转换为整数，无法转换时返回 `None`
///
/// 浮点数截断，字符串去掉首尾空白后解析，bool 为 0/1。
pub fn value_to_i64(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// 通知 hints：字符串 key 到任意类型的值
///
/// 应用传什么类型都有可能，所以每个读取方法都做转换并回落到默认值。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hints(HashMap<String, serde_json::Value>);

impl Hints {
    /// 创建空 hints
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式插入
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// 插入或覆盖一个 hint
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// 是否没有任何 hint
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 按 bool 读取 hint，规则见 [`value_to_bool`]
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        value_to_bool(self.0.get(key), default)
    }

    /// 按文本读取 hint；数字和 bool 转成文本，其它类型为空串
    pub fn string(&self, key: &str) -> String {
        match self.0.get(key) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }
}

fn lenient_u8<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_i64(&value)
        .and_then(|v| u8::try_from(v).ok())
        .unwrap_or_default())
}

fn lenient_i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_i64(&value)
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or_default())
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_bool(Some(&value), false))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// store 中的一条通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// 通知 ID，更新时不变
    pub id: NotificationId,
    /// 通知 hints
    #[serde(default)]
    pub hints: Hints,
    /// 标题
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: String,
    /// 正文
    #[serde(default, deserialize_with = "lenient_string")]
    pub body: String,
    /// 紧急程度，>= 2 为紧急（超出范围或类型不对时为 0）
    #[serde(default, deserialize_with = "lenient_u8")]
    pub urgency: u8,
    /// 优先级，与全局最低优先级比较（类型不对时为 0）
    #[serde(default, deserialize_with = "lenient_i32")]
    pub priority: i32,
    /// 带进度的更新，不触发反馈
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_progress: bool,
    /// 隐藏通知，不触发反馈
    #[serde(default, deserialize_with = "lenient_bool")]
    pub hidden: bool,
    /// 重启后恢复的通知，不触发反馈
    #[serde(default, deserialize_with = "lenient_bool")]
    pub restored: bool,
}

impl NotificationRecord {
    /// 创建只有 ID 的通知，其余字段为默认值
    pub fn new(id: impl Into<NotificationId>) -> Self {
        Self {
            id: id.into(),
            hints: Hints::new(),
            summary: String::new(),
            body: String::new(),
            urgency: 0,
            priority: 0,
            has_progress: false,
            hidden: false,
            restored: false,
        }
    }

    /// 设置单个 hint
    pub fn with_hint(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.hints.insert(key, value);
        self
    }

    /// 设置标题和正文
    pub fn with_text(mut self, summary: impl Into<String>, body: impl Into<String>) -> Self {
        self.summary = summary.into();
        self.body = body.into();
        self
    }

    /// 设置 urgency
    pub fn with_urgency(mut self, urgency: u8) -> Self {
        self.urgency = urgency;
        self
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 标记为进度更新
    pub fn with_progress(mut self, has_progress: bool) -> Self {
        self.has_progress = has_progress;
        self
    }

    /// 标记为隐藏
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// 标记为恢复的通知
    pub fn with_restored(mut self, restored: bool) -> Self {
        self.restored = restored;
        self
    }

    /// 紧急通知不受最低优先级限制
    pub fn is_critical(&self) -> bool {
        self.urgency >= CRITICAL_URGENCY || self.hints.bool_or(HINT_DISPLAY_ON, false)
    }

    /// feedback hint 中的效果名，丢弃空项
    pub fn feedback_items(&self) -> Vec<String> {
        self.hints
            .string(HINT_FEEDBACK)
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }
}
