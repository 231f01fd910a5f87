//! 持久化相关的数据结构。

use domain::Severity;
use serde::{Deserialize, Serialize};

/// 报警开始记录。`alarm_id` 由核心生成，补写时保持不变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmStartRecord {
    pub alarm_id: String,
    pub rule_id: String,
    pub tag: String,
    pub severity: Severity,
    pub message: String,
    pub start_ms: i64,
    pub start_value: f64,
}

/// 一次持久化意图（断网时进入本地队列）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BufferedOperation {
    SavePoint {
        tag: String,
        value: f64,
        ts_ms: i64,
    },
    SaveAlarmStart(AlarmStartRecord),
    UpdateAlarmEnd {
        alarm_id: String,
        end_ms: i64,
        end_value: f64,
    },
}

impl BufferedOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SavePoint { .. } => "save_point",
            Self::SaveAlarmStart(_) => "save_alarm_start",
            Self::UpdateAlarmEnd { .. } => "update_alarm_end",
        }
    }
}

/// 队列中的条目（id 单调递增，决定回放顺序）。
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedEntry {
    pub id: i64,
    pub operation: BufferedOperation,
}
