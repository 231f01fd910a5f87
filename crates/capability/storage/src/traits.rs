//! 存储接口 Trait 定义
//!
//! - HistoryStore：历史数据主存储（点位值、报警记录）
//! - BufferQueue：本地有序缓存队列
//! - RuleStateStore：规则运行状态（崩溃恢复）

use crate::error::StorageError;
use crate::models::{AlarmStartRecord, BufferedEntry, BufferedOperation};
use async_trait::async_trait;
use domain::RuleRuntimeState;
use std::collections::HashMap;

/// 历史数据主存储。任何失败都由调用方转入缓存队列。
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn save_point(&self, tag: &str, value: f64, ts_ms: i64) -> Result<(), StorageError>;

    /// 写入报警开始记录，返回报警 ID。重复写入同一 ID 不产生新记录。
    async fn save_alarm_start(&self, record: &AlarmStartRecord) -> Result<String, StorageError>;

    async fn update_alarm_end(
        &self,
        alarm_id: &str,
        end_ms: i64,
        end_value: f64,
    ) -> Result<(), StorageError>;
}

/// 有序持久队列。
#[async_trait]
pub trait BufferQueue: Send + Sync {
    async fn enqueue(&self, operation: &BufferedOperation) -> Result<i64, StorageError>;

    /// 按入队顺序读取队头最多 `limit` 条，不删除。
    async fn peek_batch(&self, limit: usize) -> Result<Vec<BufferedEntry>, StorageError>;

    async fn remove(&self, id: i64) -> Result<(), StorageError>;

    async fn len(&self) -> Result<usize, StorageError>;
}

/// 规则运行状态存储。
#[async_trait]
pub trait RuleStateStore: Send + Sync {
    async fn save_state(&self, rule_id: &str, state: &RuleRuntimeState)
    -> Result<(), StorageError>;

    async fn load_states(&self) -> Result<HashMap<String, RuleRuntimeState>, StorageError>;
}
