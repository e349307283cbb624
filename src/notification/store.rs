//! 通知存储 - 通知记录的权威来源
//!
//! 反馈引擎只读 store，写入由输入端负责。

use std::collections::HashMap;
use std::sync::RwLock;

use super::record::{NotificationId, NotificationRecord};

/// 反馈引擎使用的查询接口
pub trait NotificationStore: Send + Sync {
    /// `id` 的当前记录，store 已不认识时为 `None`
    fn notification(&self, id: NotificationId) -> Option<NotificationRecord>;
}

/// 守护进程使用的内存 store，重启后不保留
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<NotificationId, NotificationRecord>>,
}

impl MemoryStore {
    /// 创建空 store
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或替换记录，id 是新的时返回 `true`
    pub fn upsert(&self, record: NotificationRecord) -> bool {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(record.id, record).is_none()
    }

    /// 删除记录并返回它
    pub fn remove(&self, id: NotificationId) -> Option<NotificationRecord> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.remove(&id)
    }

    /// 记录数
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationStore for MemoryStore {
    fn notification(&self, id: NotificationId) -> Option<NotificationRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }
}
