// src/cli/run.rs
//! Run 命令 - 启动反馈引擎，从 stdin 或文件读取事件

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;

use crate::config::{BackendKind, FeedbackConfig};
use crate::engine::FeedbackEngine;
use crate::feedback::backend::{FeedbackBackend, JsonlBackend, NullBackend};

/// Run 命令参数
#[derive(Args)]
pub struct RunArgs {
    /// 从文件而不是 stdin 读取事件
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// 覆盖配置的最低优先级
    #[arg(long)]
    pub minimum_priority: Option<i32>,

    /// 覆盖配置的后端
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,
}

/// 按配置构造后端
pub fn build_backend(kind: BackendKind) -> Arc<dyn FeedbackBackend> {
    match kind {
        BackendKind::Jsonl => Arc::new(JsonlBackend::new(std::io::stdout())),
        BackendKind::Null => Arc::new(NullBackend::new()),
    }
}

/// 处理 run 命令
pub async fn handle_run(args: RunArgs, config: FeedbackConfig) -> Result<()> {
    let config = config
        .with_minimum_priority(args.minimum_priority)
        .with_backend(args.backend);

    let backend = build_backend(config.backend);
    info!(
        backend = backend.name(),
        minimum_priority = config.minimum_priority,
        "Starting feedback engine"
    );
    let handle = FeedbackEngine::new(backend, config.minimum_priority).start();

    let accepted = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open input {}", path.display()))?;
            handle.pump(BufReader::new(file)).await?
        }
        None => handle.pump(BufReader::new(tokio::io::stdin())).await?,
    };

    let engine = handle.shutdown().await?;
    info!(
        accepted,
        processed = engine.processed(),
        notifications = engine.store().len(),
        "Intake closed"
    );
    Ok(())
}
