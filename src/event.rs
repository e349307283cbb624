//! 输入事件 - 每行一个 JSON 对象，用 `event` 字段区分类型
//!
//! ```text
//! {"event":"notify","notification":{"id":1,"priority":5,"hints":{"x-nemo-feedback":"chat"}}}
//! {"event":"close","id":1}
//! {"event":"set_minimum_priority","value":50}
//! {"event":"window_raised","id":7,"properties":{"NOTIFICATION_PREVIEWS_DISABLED":1}}
//! {"event":"window_property","id":7,"key":"NOTIFICATION_PREVIEWS_DISABLED","value":0}
//! {"event":"window_closed","id":7}
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::notification::record::{NotificationId, NotificationRecord};
use crate::window::WindowProperties;

/// 引擎输入事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// 新增或更新通知
    Notify { notification: NotificationRecord },
    /// 应用或用户关闭通知
    Close { id: NotificationId },
    /// 修改全局最低优先级
    SetMinimumPriority { value: i32 },
    /// 窗口成为最上层
    WindowRaised {
        id: u32,
        #[serde(default)]
        properties: WindowProperties,
    },
    /// 窗口属性变化
    WindowProperty {
        id: u32,
        key: String,
        value: serde_json::Value,
    },
    /// 窗口关闭
    WindowClosed { id: u32 },
}

impl EngineEvent {
    /// 事件类型名（用于日志）
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::Notify { .. } => "notify",
            EngineEvent::Close { .. } => "close",
            EngineEvent::SetMinimumPriority { .. } => "set_minimum_priority",
            EngineEvent::WindowRaised { .. } => "window_raised",
            EngineEvent::WindowProperty { .. } => "window_property",
            EngineEvent::WindowClosed { .. } => "window_closed",
        }
    }
}

/// 解析一行输入，空行返回 `None`
pub fn parse_line(line: &str) -> Result<Option<EngineEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let event = serde_json::from_str(line)
        .with_context(|| format!("invalid intake event: {}", truncate(line, 80)))?;
    Ok(Some(event))
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
