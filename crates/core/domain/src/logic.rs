//! 自动化联动规则模型。

use crate::schedule::ScheduleWindow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 比较运算符。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = ">", alias = "gt")]
    Gt,
    #[serde(rename = "<", alias = "lt")]
    Lt,
    #[serde(rename = "=", alias = "==", alias = "eq")]
    Eq,
}

/// 浮点相等判断的容差。
pub const EQ_EPSILON: f64 = 1e-9;

impl CompareOp {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Eq => (value - threshold).abs() <= EQ_EPSILON,
        }
    }
}

/// 比较值来源。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ThresholdSource {
    Literal {
        value: f64,
    },
    Global {
        key: String,
    },
    Tag {
        tag: String,
        #[serde(default)]
        offset: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicCondition {
    pub tag: String,
    pub operator: CompareOp,
    pub threshold: ThresholdSource,
}

/// 规则级时段阈值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledThreshold {
    #[serde(flatten)]
    pub window: ScheduleWindow,
    pub threshold: f64,
}

/// 停止条件。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StopCondition {
    /// 启动条件不再成立即停止。
    #[default]
    Standard,
    /// 越过当前阈值 band 之后才停止。
    Hysteresis { band: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAction {
    pub device_id: String,
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default)]
    pub parameter: Option<String>,
    /// 启动时下发的值，缺省为 1.0。
    #[serde(default)]
    pub value: Option<f64>,
}

fn default_command() -> String {
    "set_value".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicRule {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub condition: LogicCondition,
    #[serde(default)]
    pub schedules: Vec<ScheduledThreshold>,
    #[serde(default)]
    pub stop: StopCondition,
    #[serde(default, alias = "minRunTimeSecs")]
    pub min_run_time_secs: u64,
    #[serde(default)]
    pub actions: Vec<DeviceAction>,
}

fn default_enabled() -> bool {
    true
}

/// 全局时段：时段内覆盖同名全局值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSchedule {
    #[serde(flatten)]
    pub window: ScheduleWindow,
    #[serde(default)]
    pub values: HashMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default)]
    pub values: HashMap<String, f64>,
    #[serde(default)]
    pub schedules: Vec<GlobalSchedule>,
}

/// 规则集合（整体替换）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicRuleSet {
    #[serde(default)]
    pub globals: GlobalSettings,
    #[serde(default)]
    pub rules: Vec<LogicRule>,
}

/// 规则运行状态。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRuntimeState {
    pub active: bool,
    pub last_eval_ms: i64,
    pub start_ms: Option<i64>,
}
