//! 历史存储内存实现

use crate::error::StorageError;
use crate::models::AlarmStartRecord;
use crate::traits::HistoryStore;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    pub tag: String,
    pub value: f64,
    pub ts_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredAlarm {
    pub record: AlarmStartRecord,
    pub end_ms: Option<i64>,
    pub end_value: Option<f64>,
}

/// 历史存储内存实现。可切换为不可用状态以模拟数据库中断。
pub struct InMemoryHistoryStore {
    points: RwLock<Vec<StoredPoint>>,
    alarms: RwLock<Vec<StoredAlarm>>,
    available: AtomicBool,
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            points: RwLock::new(Vec::new()),
            alarms: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::new("history store unavailable"))
        }
    }

    pub fn points(&self) -> Vec<StoredPoint> {
        self.points.read().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn alarms(&self) -> Vec<StoredAlarm> {
        self.alarms.read().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn save_point(&self, tag: &str, value: f64, ts_ms: i64) -> Result<(), StorageError> {
        self.ensure_available()?;
        let mut points = self
            .points
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        points.push(StoredPoint {
            tag: tag.to_string(),
            value,
            ts_ms,
        });
        Ok(())
    }

    async fn save_alarm_start(&self, record: &AlarmStartRecord) -> Result<String, StorageError> {
        self.ensure_available()?;
        let mut alarms = self
            .alarms
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if !alarms.iter().any(|a| a.record.alarm_id == record.alarm_id) {
            alarms.push(StoredAlarm {
                record: record.clone(),
                end_ms: None,
                end_value: None,
            });
        }
        Ok(record.alarm_id.clone())
    }

    async fn update_alarm_end(
        &self,
        alarm_id: &str,
        end_ms: i64,
        end_value: f64,
    ) -> Result<(), StorageError> {
        self.ensure_available()?;
        let mut alarms = self
            .alarms
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let alarm = alarms
            .iter_mut()
            .find(|a| a.record.alarm_id == alarm_id)
            .ok_or_else(|| StorageError::new(format!("alarm not found: {}", alarm_id)))?;
        alarm.end_ms = Some(end_ms);
        alarm.end_value = Some(end_value);
        Ok(())
    }
}
