//! 抑制策略 - 判断一条通知能否产生反馈
//!
//! 综合三个输入：
//! - 全局最低优先级
//! - 最上层窗口报告的抑制模式
//! - 通知自身的标记（hidden/restored、urgency、display-on hint）

use serde::Serialize;

use crate::notification::record::{NotificationRecord, CRITICAL_URGENCY};

/// 窗口在最上层时可以要求的抑制模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionMode {
    /// 全部允许
    #[default]
    AllEnabled,
    /// 只有紧急通知有反馈
    ApplicationDisabled,
    /// 只有非紧急（urgency < 2）通知有反馈
    SystemDisabled,
    /// 全部禁止
    AllDisabled,
    /// 已知范围之外的原始值，不满足任何允许规则
    Unknown(u32),
}

impl SuppressionMode {
    /// 从窗口属性的原始值解码
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => SuppressionMode::AllEnabled,
            1 => SuppressionMode::ApplicationDisabled,
            2 => SuppressionMode::SystemDisabled,
            3 => SuppressionMode::AllDisabled,
            other => SuppressionMode::Unknown(other),
        }
    }

    /// 原始值
    pub fn as_raw(&self) -> u32 {
        match self {
            SuppressionMode::AllEnabled => 0,
            SuppressionMode::ApplicationDisabled => 1,
            SuppressionMode::SystemDisabled => 2,
            SuppressionMode::AllDisabled => 3,
            SuppressionMode::Unknown(raw) => *raw,
        }
    }

    /// 小写名称
    pub fn as_str(&self) -> &'static str {
        match self {
            SuppressionMode::AllEnabled => "all_enabled",
            SuppressionMode::ApplicationDisabled => "application_disabled",
            SuppressionMode::SystemDisabled => "system_disabled",
            SuppressionMode::AllDisabled => "all_disabled",
            SuppressionMode::Unknown(_) => "unknown",
        }
    }
}

impl std::fmt::Display for SuppressionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuppressionMode::Unknown(raw) => write!(f, "unknown({})", raw),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// 策略判断的中间结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolicyDecision {
    /// hidden 或 restored 通知，其余各项未判断
    pub vetoed: bool,
    /// urgency >= 2 或带 display-on hint
    pub is_critical: bool,
    /// 优先级达到阈值，或是紧急通知
    pub priority_ok: bool,
    /// 窗口模式允许
    pub mode_ok: bool,
    /// 参与判断的窗口模式
    pub mode: SuppressionMode,
    /// 参与判断的最低优先级
    pub minimum_priority: i32,
}

impl PolicyDecision {
    /// 最终结论：能否产生反馈
    pub fn enabled(&self) -> bool {
        !self.vetoed && self.priority_ok && self.mode_ok
    }
}

/// 执行策略判断并保留中间结果
///
/// 没有最上层窗口或它没有设置属性时 `mode` 为 `None`，
/// 等同于 [`SuppressionMode::AllEnabled`]。
pub fn evaluate(
    record: &NotificationRecord,
    minimum_priority: i32,
    mode: Option<SuppressionMode>,
) -> PolicyDecision {
    let mode = mode.unwrap_or_default();

    if record.hidden || record.restored {
        return PolicyDecision {
            vetoed: true,
            is_critical: false,
            priority_ok: false,
            mode_ok: false,
            mode,
            minimum_priority,
        };
    }

    let is_critical = record.is_critical();
    let priority_ok = record.priority >= minimum_priority || is_critical;
    let mode_ok = match mode {
        SuppressionMode::AllEnabled => true,
        SuppressionMode::ApplicationDisabled => is_critical,
        SuppressionMode::SystemDisabled => record.urgency < CRITICAL_URGENCY,
        SuppressionMode::AllDisabled | SuppressionMode::Unknown(_) => false,
    };

    PolicyDecision {
        vetoed: false,
        is_critical,
        priority_ok,
        mode_ok,
        mode,
        minimum_priority,
    }
}

/// 在给定阈值和窗口模式下 `record` 能否产生反馈
pub fn is_enabled(
    record: &NotificationRecord,
    minimum_priority: i32,
    mode: Option<SuppressionMode>,
) -> bool {
    evaluate(record, minimum_priority, mode).enabled()
}
