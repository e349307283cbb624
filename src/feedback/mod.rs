//! 反馈层 - 策略判断、反馈后端与分发器
//!
//! # 使用示例
//! ```ignore
//! use notification_feedback::feedback::{FeedbackDispatcher, JsonlBackend};
//!
//! let mut dispatcher = FeedbackDispatcher::new(store, window, Arc::new(JsonlBackend::new(std::io::stdout())));
//! dispatcher.set_minimum_priority(50);
//! dispatcher.on_added(NotificationId(1));
//! ```

pub mod backend;
pub mod dispatcher;
pub mod policy;

pub use backend::{
    BackendCommand, EffectHandle, FeedbackBackend, JsonlBackend, NullBackend, Properties,
    StopTarget,
};
pub use dispatcher::{
    feedback_properties, plan_feedback, DispatchOutcome, FeedbackDispatcher, FeedbackPlan,
    VIBRA_EFFECT,
};
pub use policy::{evaluate, is_enabled, PolicyDecision, SuppressionMode};
