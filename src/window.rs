//! 窗口抑制来源 - 最上层窗口对通知反馈的要求

use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

use crate::feedback::policy::SuppressionMode;

/// 携带抑制模式（无符号整数）的窗口属性
pub const PROP_NOTIFICATION_PREVIEWS_DISABLED: &str = "NOTIFICATION_PREVIEWS_DISABLED";

/// 策略需要窗口层提供的能力
pub trait WindowSuppressionSource: Send + Sync {
    /// 最上层窗口的抑制模式；没有窗口或没有该属性时为 `None`
    fn current_suppression_mode(&self) -> Option<SuppressionMode>;
}

/// 总是返回同一个模式的来源（测试和 `check` 命令用）
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSuppressionMode(pub Option<SuppressionMode>);

impl WindowSuppressionSource for FixedSuppressionMode {
    fn current_suppression_mode(&self) -> Option<SuppressionMode> {
        self.0
    }
}

/// 窗口属性表
pub type WindowProperties = HashMap<String, serde_json::Value>;

#[derive(Debug, Default)]
struct Surfaces {
    properties: HashMap<u32, WindowProperties>,
    topmost: Option<u32>,
}

/// 合成器窗口栈的内存视图：各窗口属性以及哪个在最上层
#[derive(Debug, Default)]
pub struct WindowStack {
    inner: RwLock<Surfaces>,
}

impl WindowStack {
    /// 创建空窗口栈
    pub fn new() -> Self {
        Self::default()
    }

    /// 把 `id` 置为最上层窗口，并替换它的属性
    pub fn raise(&self, id: u32, properties: WindowProperties) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.properties.insert(id, properties);
        inner.topmost = Some(id);
        debug!(window = id, "Window raised");
    }

    /// 设置已知窗口的单个属性，未知窗口忽略
    pub fn set_property(&self, id: u32, key: impl Into<String>, value: serde_json::Value) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        match inner.properties.get_mut(&id) {
            Some(properties) => {
                properties.insert(key.into(), value);
            }
            None => debug!(window = id, "Property change for unknown window ignored"),
        }
    }

    /// 关闭窗口；关闭的是最上层窗口时不再有最上层窗口
    pub fn close(&self, id: u32) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.properties.remove(&id);
        if inner.topmost == Some(id) {
            inner.topmost = None;
        }
    }

    /// 当前最上层窗口
    pub fn topmost(&self) -> Option<u32> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).topmost
    }
}

impl WindowSuppressionSource for WindowStack {
    fn current_suppression_mode(&self) -> Option<SuppressionMode> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let properties = inner.properties.get(&inner.topmost?)?;
        let value = properties.get(PROP_NOTIFICATION_PREVIEWS_DISABLED)?;
        Some(SuppressionMode::from_raw(property_to_u32(value)))
    }
}

/// 按无符号整数读取窗口属性
///
/// 数字字符串去掉首尾空白后解析，浮点数截断，bool 为 0/1，负数按 32 位补码
/// 重新解释（-1 即 `u32::MAX`）。无法转换的值为 0。
pub fn property_to_u32(value: &serde_json::Value) -> u32 {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                v as u32
            } else if let Some(v) = n.as_i64() {
                v as u32
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64 as u32)
                    .unwrap_or(0)
            }
        }
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<u32>()
                .ok()
                .or_else(|| s.parse::<i64>().ok().map(|v| v as u32))
                .unwrap_or(0)
        }
        serde_json::Value::Bool(b) => u32::from(*b),
        _ => 0,
    }
}
