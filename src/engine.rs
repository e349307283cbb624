//! 反馈引擎 - 包住分发器的单任务事件循环
//!
//! 所有输入事件经过同一个 mpsc 通道，由一个任务处理：
//! 同一条通知的事件按到达顺序处理，互不交错。

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::event::{parse_line, EngineEvent};
use crate::feedback::backend::FeedbackBackend;
use crate::feedback::dispatcher::FeedbackDispatcher;
use crate::notification::record::NotificationId;
use crate::notification::store::MemoryStore;
use crate::window::WindowStack;

const EVENT_QUEUE_SIZE: usize = 256;

/// 分发器，加上为它提供数据的进程内 store 和窗口栈
pub struct FeedbackEngine {
    dispatcher: FeedbackDispatcher,
    store: Arc<MemoryStore>,
    windows: Arc<WindowStack>,
    processed: usize,
}

impl FeedbackEngine {
    /// 用给定后端和初始最低优先级创建引擎
    pub fn new(backend: Arc<dyn FeedbackBackend>, minimum_priority: i32) -> Self {
        let store = Arc::new(MemoryStore::new());
        let windows = Arc::new(WindowStack::new());
        let dispatcher = FeedbackDispatcher::new(store.clone(), windows.clone(), backend)
            .with_minimum_priority(minimum_priority);
        Self {
            dispatcher,
            store,
            windows,
            processed: 0,
        }
    }

    /// 分发器
    pub fn dispatcher(&self) -> &FeedbackDispatcher {
        &self.dispatcher
    }

    /// 通知 store
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// 窗口栈
    pub fn windows(&self) -> &WindowStack {
        &self.windows
    }

    /// 已处理的事件数
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// 同步处理一个事件
    pub fn handle(&mut self, event: EngineEvent) {
        debug!(event = event.kind(), "Handling intake event");
        self.processed += 1;

        match event {
            EngineEvent::Notify { notification } => {
                let id = notification.id;
                if self.store.upsert(notification) {
                    self.dispatcher.on_added(id);
                } else {
                    self.dispatcher.on_updated(id);
                }
            }
            EngineEvent::Close { id } => self.close(id),
            EngineEvent::SetMinimumPriority { value } => {
                self.dispatcher.set_minimum_priority(value);
            }
            EngineEvent::WindowRaised { id, properties } => self.windows.raise(id, properties),
            EngineEvent::WindowProperty { id, key, value } => {
                self.windows.set_property(id, key, value);
            }
            EngineEvent::WindowClosed { id } => self.windows.close(id),
        }
    }

    fn close(&mut self, id: NotificationId) {
        // 先停反馈再删记录，绑定不会比通知活得更久
        self.dispatcher.on_removed(id);
        if self.store.remove(id).is_none() {
            debug!(id = %id, "Closed notification was not in store");
        }
    }

    /// 调度后端连接并启动事件循环
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn start(self) -> EngineHandle {
        let backend = self.dispatcher.backend().clone();
        tokio::spawn(async move {
            if let Err(e) = backend.connect().await {
                warn!(backend = backend.name(), error = %e, "Feedback backend connect failed");
            }
        });

        let (tx, mut rx) = mpsc::channel::<EngineEvent>(EVENT_QUEUE_SIZE);
        let task = tokio::spawn(async move {
            let mut engine = self;
            while let Some(event) = rx.recv().await {
                engine.handle(event);
            }
            info!(
                processed = engine.processed,
                active = engine.dispatcher.binding_count(),
                "Feedback engine stopped"
            );
            engine
        });

        EngineHandle { tx, task }
    }
}

/// 运行中引擎的输入端
pub struct EngineHandle {
    tx: mpsc::Sender<EngineEvent>,
    task: JoinHandle<FeedbackEngine>,
}

impl EngineHandle {
    /// 投递一个事件；引擎已停止时返回错误
    pub async fn send(&self, event: EngineEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("feedback engine is no longer running"))
    }

    /// 读取换行分隔的 JSON 事件直到 EOF，返回接受的事件数
    ///
    /// 格式错误的行记日志后跳过。
    pub async fn pump<R: AsyncBufRead + Unpin>(&self, mut reader: R) -> Result<usize> {
        let mut line = String::new();
        let mut accepted = 0;

        loop {
            line.clear();
            let bytes_read = reader
                .read_line(&mut line)
                .await
                .context("failed to read intake line")?;
            if bytes_read == 0 {
                break; // EOF
            }

            match parse_line(&line) {
                Ok(Some(event)) => {
                    self.send(event).await?;
                    accepted += 1;
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Skipping malformed intake line"),
            }
        }

        Ok(accepted)
    }

    /// 关闭输入，等排队的事件处理完后返回引擎
    pub async fn shutdown(self) -> Result<FeedbackEngine> {
        drop(self.tx);
        self.task.await.context("feedback engine task failed")
    }
}
