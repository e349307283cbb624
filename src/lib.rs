//! Notification Feedback - 把通知生命周期事件映射为声音/振动/LED 反馈

pub mod cli;
pub mod config;
pub mod engine;
pub mod event;
pub mod feedback;
pub mod notification;
pub mod window;

pub use config::{BackendKind, FeedbackConfig};
pub use engine::{EngineHandle, FeedbackEngine};
pub use event::EngineEvent;
pub use feedback::{
    DispatchOutcome, EffectHandle, FeedbackBackend, FeedbackDispatcher, PolicyDecision,
    Properties, StopTarget, SuppressionMode,
};
pub use notification::{Hints, MemoryStore, NotificationId, NotificationRecord, NotificationStore};
pub use window::{FixedSuppressionMode, WindowStack, WindowSuppressionSource};
