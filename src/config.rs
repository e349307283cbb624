//! 配置 - config.json 与命令行覆盖

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 环境变量和配置都没有设置时的默认日志过滤
pub const DEFAULT_LOG_FILTER: &str = "notification_feedback=info,nfbd=info";

/// play/stop 命令的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// stdout 上的 JSON 行
    #[default]
    Jsonl,
    /// 只写日志（dry-run）
    Null,
}

/// 反馈引擎配置，文件里缺的字段取默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// 优先级低于该值的非紧急通知没有反馈
    pub minimum_priority: i32,
    /// 后端类型
    pub backend: BackendKind,
    /// `RUST_LOG` 风格的日志过滤，`RUST_LOG` 优先
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            minimum_priority: 0,
            backend: BackendKind::Jsonl,
            log_filter: None,
        }
    }
}

impl FeedbackConfig {
    /// `~/.config/notification-feedback/config.json`（平台配置目录）
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notification-feedback")
            .join("config.json")
    }

    /// 加载指定的文件，未指定时加载存在的默认文件
    ///
    /// 默认文件不存在时用默认值；指定的文件不存在或无效时返回错误。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    debug!(path = %path.display(), "No config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// 读取并解析一个配置文件
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: FeedbackConfig = serde_json::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// 命令行覆盖最低优先级
    pub fn with_minimum_priority(mut self, minimum_priority: Option<i32>) -> Self {
        if let Some(value) = minimum_priority {
            self.minimum_priority = value;
        }
        self
    }

    /// 命令行覆盖后端
    pub fn with_backend(mut self, backend: Option<BackendKind>) -> Self {
        if let Some(backend) = backend {
            self.backend = backend;
        }
        self
    }

    /// 生效的日志过滤
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}
