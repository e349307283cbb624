//! Notification Feedback daemon CLI
//!
//! 读取通知生命周期事件，决定并播放声音/振动/LED 反馈

use anyhow::Result;
use clap::{Parser, Subcommand};
use notification_feedback::{
    cli::{format_output, handle_check, handle_run, CheckArgs, RunArgs},
    FeedbackConfig,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "nfbd")]
#[command(about = "Notification feedback daemon - 通知反馈决策与播放")]
#[command(version)]
struct Cli {
    /// 配置文件路径 (默认: <config dir>/notification-feedback/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动反馈引擎，从 stdin 读取 JSONL 事件
    Run(RunArgs),
    /// 预览一条通知在当前策略下会触发的反馈
    Check(CheckArgs),
    /// 打印生效的配置
    Config {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
}

#[derive(serde::Serialize)]
struct ConfigView<'a> {
    path: String,
    #[serde(flatten)]
    config: &'a FeedbackConfig,
}

impl std::fmt::Display for ConfigView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "config file:      {}", self.path)?;
        writeln!(f, "minimum priority: {}", self.config.minimum_priority)?;
        writeln!(f, "backend:          {:?}", self.config.backend)?;
        write!(f, "log filter:       {}", self.config.log_filter())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = FeedbackConfig::load(cli.config.as_deref())?;

    // 初始化 tracing 日志系统
    // RUST_LOG 优先，其次是配置文件里的 log_filter
    // stdout 留给 jsonl 后端输出，日志写 stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Run(args) => {
            handle_run(args, config).await?;
        }
        Commands::Check(args) => {
            handle_check(args, config.minimum_priority)?;
        }
        Commands::Config { json } => {
            let path = cli
                .config
                .unwrap_or_else(FeedbackConfig::default_path)
                .display()
                .to_string();
            let view = ConfigView {
                path,
                config: &config,
            };
            println!("{}", format_output(&view, json));
        }
    }

    Ok(())
}
