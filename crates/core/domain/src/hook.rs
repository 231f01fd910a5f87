//! 外部自动化钩子的动作模型。
//!
//! 钩子只能产出封闭集合内的动作，由固定的解释器执行。

use crate::alarm::Severity;
use crate::logic::CompareOp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HookAction {
    SetDeviceValue {
        device_id: String,
        #[serde(default = "default_command")]
        command: String,
        #[serde(default)]
        parameter: Option<String>,
        value: f64,
    },
    Notify {
        message: String,
        #[serde(default)]
        severity: Severity,
    },
    NoOp,
}

fn default_command() -> String {
    "set_value".to_string()
}

/// 声明式钩子：条件由不成立变为成立时产出一次动作。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookRule {
    pub name: String,
    pub tag: String,
    pub operator: CompareOp,
    pub threshold: f64,
    pub action: HookAction,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}
