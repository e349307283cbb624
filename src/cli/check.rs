// src/cli/check.rs
//! Check 命令 - 不接后端，预览一条通知会触发哪些反馈

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use super::output::format_output;
use crate::feedback::backend::Properties;
use crate::feedback::dispatcher::{plan_feedback, VIBRA_EFFECT};
use crate::feedback::policy::{self, PolicyDecision, SuppressionMode};
use crate::notification::record::NotificationRecord;

/// Check 命令参数
#[derive(Args)]
pub struct CheckArgs {
    /// 通知记录 JSON，例如 '{"id":1,"priority":5,"hints":{"x-nemo-feedback":"chat"}}'
    #[arg(long, short)]
    pub record: String,

    /// 最低优先级（默认取配置值）
    #[arg(long)]
    pub minimum_priority: Option<i32>,

    /// 窗口抑制模式原始值：0 全部允许，1 应用禁用，2 系统禁用，3 全部禁用
    /// （默认没有最上层窗口）
    #[arg(long)]
    pub mode: Option<u32>,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// add 这条通知会发生什么
#[derive(Debug, Serialize)]
pub struct CheckReport {
    /// 策略判断的中间结果
    pub decision: PolicyDecision,
    /// 进度更新，不会有反馈
    pub progress: bool,
    /// 会播放的效果，振动也列在其中
    pub effects: Vec<String>,
    /// 是否振动
    pub vibra: bool,
    /// 传给 feedback 效果的属性
    pub properties: Properties,
}

impl std::fmt::Display for CheckReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let d = &self.decision;
        writeln!(f, "mode:             {}", d.mode)?;
        writeln!(f, "minimum priority: {}", d.minimum_priority)?;
        if d.vetoed {
            writeln!(f, "vetoed:           hidden or restored")?;
        } else {
            writeln!(f, "critical:         {}", d.is_critical)?;
            writeln!(f, "priority ok:      {}", d.priority_ok)?;
            writeln!(f, "mode ok:          {}", d.mode_ok)?;
        }
        if self.progress {
            return write!(f, "progress update, no feedback");
        }
        if self.effects.is_empty() {
            writeln!(f, "effects:          (none)")?;
        } else {
            writeln!(f, "effects:          {}", self.effects.join(", "))?;
        }
        for (key, value) in &self.properties {
            writeln!(f, "  {} = {}", key, value)?;
        }
        write!(f, "vibra:            {}", self.vibra)
    }
}

/// 按分发器的规则评估一条通知，不播放任何东西
pub fn preview(
    record: &NotificationRecord,
    minimum_priority: i32,
    mode: Option<SuppressionMode>,
) -> CheckReport {
    let plan = plan_feedback(record, minimum_priority, mode);
    let mut effects = plan.effects;
    if plan.vibra {
        effects.push(VIBRA_EFFECT.to_string());
    }
    CheckReport {
        decision: policy::evaluate(record, minimum_priority, mode),
        progress: record.has_progress,
        effects,
        vibra: plan.vibra,
        properties: plan.properties,
    }
}

/// 处理 check 命令
pub fn handle_check(args: CheckArgs, configured_minimum_priority: i32) -> Result<()> {
    let record: NotificationRecord =
        serde_json::from_str(&args.record).context("invalid --record JSON")?;
    let minimum_priority = args.minimum_priority.unwrap_or(configured_minimum_priority);
    let mode = args.mode.map(SuppressionMode::from_raw);

    let report = preview(&record, minimum_priority, mode);
    println!("{}", format_output(&report, args.json));
    Ok(())
}
