//! 报警规则与报警实例状态。

use serde::{Deserialize, Serialize};

/// 报警比较类型。高类比较 `>`，低类比较 `<`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmKind {
    #[serde(alias = "HiHi", alias = "high_high", alias = "hihi")]
    HighHigh,
    #[serde(alias = "Hi", alias = "high")]
    High,
    #[serde(alias = "Lo", alias = "low")]
    Low,
    #[serde(alias = "LoLo", alias = "low_low", alias = "lolo")]
    LowLow,
}

impl AlarmKind {
    pub fn is_high(self) -> bool {
        matches!(self, Self::HighHigh | Self::High)
    }

    /// 触发条件是否成立。
    pub fn is_triggered(self, value: f64, setpoint: f64) -> bool {
        if self.is_high() {
            value > setpoint
        } else {
            value < setpoint
        }
    }

    /// 回差恢复条件：回退幅度严格大于回差；回差为 0 时等于设定值仍不恢复。
    pub fn is_recovered(self, value: f64, setpoint: f64, hysteresis: f64) -> bool {
        if self.is_triggered(value, setpoint) {
            return false;
        }
        let margin = if self.is_high() {
            setpoint - value
        } else {
            value - setpoint
        };
        margin > hysteresis.max(0.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    #[serde(alias = "CRITICAL", alias = "critical")]
    Critical,
    #[default]
    #[serde(alias = "WARNING", alias = "warning")]
    Warning,
    #[serde(alias = "INFO", alias = "info")]
    Info,
}

/// 报警规则（静态配置，引擎只读）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRule {
    pub id: String,
    #[serde(alias = "tag_name", alias = "tagName")]
    pub tag: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: AlarmKind,
    #[serde(alias = "threshold")]
    pub setpoint: f64,
    #[serde(default)]
    pub hysteresis: f64,
    #[serde(default, alias = "onDelaySeconds", alias = "on_delay_seconds")]
    pub on_delay_secs: u64,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmStatus {
    #[serde(rename = "Active_Unacked")]
    ActiveUnacked,
    #[serde(rename = "Active_Acked")]
    ActiveAcked,
    #[serde(rename = "Cleared_Unacked")]
    ClearedUnacked,
    #[serde(rename = "Cleared_Acked")]
    ClearedAcked,
}

impl AlarmStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::ActiveUnacked | Self::ActiveAcked)
    }

    pub fn is_acked(self) -> bool {
        matches!(self, Self::ActiveAcked | Self::ClearedAcked)
    }
}

/// 报警实例状态。每条规则同一时刻最多一个未清除实例。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAlarmState {
    pub alarm_id: String,
    pub rule_id: String,
    pub tag: String,
    pub kind: AlarmKind,
    pub severity: Severity,
    pub message: String,
    pub trigger_time_ms: i64,
    pub value_at_trigger: f64,
    pub ack_time_ms: Option<i64>,
    pub ack_user: Option<String>,
    pub clear_time_ms: Option<i64>,
    pub clear_value: Option<f64>,
    pub status: AlarmStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_recovery_requires_hysteresis_margin() {
        assert!(!AlarmKind::High.is_recovered(7.5, 8.0, 1.0));
        assert!(AlarmKind::High.is_recovered(6.9, 8.0, 1.0));
        assert!(!AlarmKind::High.is_recovered(8.5, 8.0, 1.0));
    }

    #[test]
    fn recovery_boundary_is_exclusive() {
        assert!(!AlarmKind::High.is_recovered(7.0, 8.0, 1.0));
        assert!(!AlarmKind::High.is_recovered(8.0, 8.0, 0.0));
        assert!(AlarmKind::High.is_recovered(7.99, 8.0, 0.0));
        assert!(!AlarmKind::Low.is_recovered(5.0, 5.0, 0.0));
        assert!(!AlarmKind::LowLow.is_recovered(5.5, 5.0, 0.5));
    }

    #[test]
    fn low_recovery_mirrors_high() {
        assert!(AlarmKind::Low.is_triggered(4.0, 5.0));
        assert!(!AlarmKind::Low.is_recovered(5.2, 5.0, 0.5));
        assert!(AlarmKind::LowLow.is_recovered(5.6, 5.0, 0.5));
    }

    #[test]
    fn rule_parses_legacy_field_names() {
        let json = r#"{"id":"a1","tag_name":"mixer_ph","type":"high","threshold":8.0,"message":"pH high"}"#;
        let rule: AlarmRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.kind, AlarmKind::High);
        assert_eq!(rule.setpoint, 8.0);
        assert_eq!(rule.on_delay_secs, 0);
        assert!(rule.enabled);
    }
}
