//! 反馈后端 - 真正播放效果的服务
//!
//! 引擎对每个调用都是发出即不管：不返回错误，`connect()` 完成之前的调用
//! 由后端自己处理。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// 随 play 请求一起传的属性（`media.leds`、`sound.filename` 等）
pub type Properties = BTreeMap<String, serde_json::Value>;

/// 关闭 LED
pub const PROP_MEDIA_LEDS: &str = "media.leds";
/// 关闭声音
pub const PROP_MEDIA_AUDIO: &str = "media.audio";
/// 关闭振动
pub const PROP_MEDIA_VIBRA: &str = "media.vibra";
/// 自定义声音文件（本地路径）
pub const PROP_SOUND_FILENAME: &str = "sound.filename";
/// 与 `sound.filename` 一起设置
pub const PROP_SOUND_ENABLED: &str = "sound.enabled";

/// 后端分配的播放句柄，对引擎不透明
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EffectHandle(pub u32);

impl std::fmt::Display for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// stop 请求的目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopTarget {
    /// 某一个播放实例
    Handle(EffectHandle),
    /// 该效果名的所有实例
    Effect(String),
}

impl StopTarget {
    /// 按效果名停止
    pub fn effect(name: impl Into<String>) -> Self {
        StopTarget::Effect(name.into())
    }
}

impl std::fmt::Display for StopTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopTarget::Handle(handle) => write!(f, "{}", handle),
            StopTarget::Effect(name) => write!(f, "{}", name),
        }
    }
}

/// 效果播放服务
#[async_trait]
pub trait FeedbackBackend: Send + Sync {
    /// 后端名称（用于日志）
    fn name(&self) -> &str;

    /// 一次性连接，由引擎所有者在构造后调度
    async fn connect(&self) -> anyhow::Result<()>;

    /// 开始播放 `effect`，返回之后 stop 用的句柄
    fn play(&self, effect: &str, properties: &Properties) -> EffectHandle;

    /// 停止一个句柄或一个效果名的所有实例
    fn stop(&self, target: StopTarget);
}

/// 后端输出的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BackendCommand {
    /// 开始播放
    Play {
        ts: DateTime<Utc>,
        handle: EffectHandle,
        effect: String,
        properties: Properties,
    },
    /// 停止，`handle` 和 `effect` 只有一个
    Stop {
        ts: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        handle: Option<EffectHandle>,
        #[serde(skip_serializing_if = "Option::is_none")]
        effect: Option<String>,
    },
}

impl BackendCommand {
    fn play(handle: EffectHandle, effect: &str, properties: &Properties) -> Self {
        BackendCommand::Play {
            ts: Utc::now(),
            handle,
            effect: effect.to_string(),
            properties: properties.clone(),
        }
    }

    fn stop(target: StopTarget) -> Self {
        let (handle, effect) = match target {
            StopTarget::Handle(handle) => (Some(handle), None),
            StopTarget::Effect(name) => (None, Some(name)),
        };
        BackendCommand::Stop {
            ts: Utc::now(),
            handle,
            effect,
        }
    }
}

struct JsonlState<W> {
    writer: W,
    connected: bool,
    pending: Vec<BackendCommand>,
}

/// 把 play/stop 命令写成 JSON 行，交给进程外的播放器
///
/// `connect()` 之前的命令先排队，连接后按顺序刷出。
pub struct JsonlBackend<W: Write + Send> {
    state: Mutex<JsonlState<W>>,
    next_handle: AtomicU32,
}

impl<W: Write + Send> JsonlBackend<W> {
    /// 包装一个 writer，句柄从 1 开始
    pub fn new(writer: W) -> Self {
        Self {
            state: Mutex::new(JsonlState {
                writer,
                connected: false,
                pending: Vec::new(),
            }),
            next_handle: AtomicU32::new(1),
        }
    }

    /// `connect()` 是否已完成
    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).connected
    }

    /// 还在等 `connect()` 的命令数
    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).pending.len()
    }

    /// 消费后端，取回 writer
    pub fn into_writer(self) -> W {
        self.state.into_inner().unwrap_or_else(|e| e.into_inner()).writer
    }

    fn submit(&self, command: BackendCommand) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.connected {
            write_command(&mut state.writer, &command);
        } else {
            debug!(pending = state.pending.len() + 1, "Backend not connected, queueing command");
            state.pending.push(command);
        }
    }
}

fn write_command<W: Write>(writer: &mut W, command: &BackendCommand) {
    let line = match serde_json::to_string(command) {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, "Failed to serialize backend command");
            return;
        }
    };
    if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
        warn!(error = %e, "Failed to write backend command");
    }
}

#[async_trait]
impl<W: Write + Send> FeedbackBackend for JsonlBackend<W> {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn connect(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.connected {
            debug!("Backend already connected");
            return Ok(());
        }
        state.connected = true;

        let pending = std::mem::take(&mut state.pending);
        info!(flushed = pending.len(), "Feedback backend connected");
        for command in &pending {
            write_command(&mut state.writer, command);
        }
        Ok(())
    }

    fn play(&self, effect: &str, properties: &Properties) -> EffectHandle {
        let handle = EffectHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.submit(BackendCommand::play(handle, effect, properties));
        handle
    }

    fn stop(&self, target: StopTarget) {
        self.submit(BackendCommand::stop(target));
    }
}

/// 只写日志的后端（dry-run）
#[derive(Debug)]
pub struct NullBackend {
    connected: AtomicBool,
    next_handle: AtomicU32,
}

impl NullBackend {
    /// 句柄从 1 开始，与 [`JsonlBackend`] 一致
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            next_handle: AtomicU32::new(1),
        }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedbackBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    async fn connect(&self) -> anyhow::Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        info!("[DRY-RUN] Feedback backend connected");
        Ok(())
    }

    fn play(&self, effect: &str, properties: &Properties) -> EffectHandle {
        let handle = EffectHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        debug!(effect = %effect, handle = %handle, ?properties, "[DRY-RUN] play");
        handle
    }

    fn stop(&self, target: StopTarget) {
        debug!(target = %target, "[DRY-RUN] stop");
    }
}
