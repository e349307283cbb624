//! 通知模型层 - 通知记录与存储
//!
//! 记录归 store 所有，反馈引擎只按 id 读取快照。

pub mod record;
pub mod store;

pub use record::{Hints, NotificationId, NotificationRecord, CRITICAL_URGENCY};
pub use store::{MemoryStore, NotificationStore};
