use domain::{ActiveAlarmState, RuntimeValue, Severity};
use serde::Serialize;
use std::collections::BTreeMap;

/// 当前完整状态（`update` 事件载荷）。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderedState {
    pub tags: BTreeMap<String, RuntimeValue>,
    pub alarms: Vec<ActiveAlarmState>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    Data {
        tag: String,
        value: f64,
        time: i64,
    },
    AlarmStart {
        alarm_id: String,
        rule_id: String,
        tag: String,
        severity: Severity,
        msg: String,
        value: f64,
        time: i64,
    },
    AlarmEnd {
        alarm_id: String,
        rule_id: String,
        tag: String,
        msg: String,
        value: f64,
        time: i64,
    },
    Update {
        state: RenderedState,
    },
}

impl RealtimeEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Data { .. } => "data",
            Self::AlarmStart { .. } => "alarm_start",
            Self::AlarmEnd { .. } => "alarm_end",
            Self::Update { .. } => "update",
        }
    }

    pub fn alarm_start(state: &ActiveAlarmState) -> Self {
        Self::AlarmStart {
            alarm_id: state.alarm_id.clone(),
            rule_id: state.rule_id.clone(),
            tag: state.tag.clone(),
            severity: state.severity,
            msg: state.message.clone(),
            value: state.value_at_trigger,
            time: state.trigger_time_ms,
        }
    }

    /// 未清除的实例返回 `None`。
    pub fn alarm_end(state: &ActiveAlarmState) -> Option<Self> {
        Some(Self::AlarmEnd {
            alarm_id: state.alarm_id.clone(),
            rule_id: state.rule_id.clone(),
            tag: state.tag.clone(),
            msg: state.message.clone(),
            value: state.clear_value?,
            time: state.clear_time_ms?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{AlarmKind, AlarmStatus, Quality};

    #[test]
    fn data_event_is_tagged() {
        let event = RealtimeEvent::Data {
            tag: "mixer_ph".to_string(),
            value: 7.25,
            time: 1_000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "data", "tag": "mixer_ph", "value": 7.25, "time": 1000})
        );
    }

    #[test]
    fn update_event_renders_tags_and_alarms() {
        let mut state = RenderedState::default();
        state.tags.insert(
            "mixer_ph".to_string(),
            RuntimeValue {
                value: 9.0,
                ts_ms: 5,
                quality: Quality::Good,
            },
        );
        let json = serde_json::to_value(RealtimeEvent::Update { state }).unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["state"]["tags"]["mixer_ph"]["value"], 9.0);
        assert!(json["state"]["alarms"].as_array().unwrap().is_empty());
    }

    #[test]
    fn alarm_end_requires_clear_data() {
        let mut state = ActiveAlarmState {
            alarm_id: "a-1".to_string(),
            rule_id: "ph_high".to_string(),
            tag: "mixer_ph".to_string(),
            kind: AlarmKind::High,
            severity: Severity::Critical,
            message: "pH high".to_string(),
            trigger_time_ms: 10,
            value_at_trigger: 9.0,
            ack_time_ms: None,
            ack_user: None,
            clear_time_ms: None,
            clear_value: None,
            status: AlarmStatus::ActiveUnacked,
        };
        assert_eq!(RealtimeEvent::alarm_start(&state).kind(), "alarm_start");
        assert!(RealtimeEvent::alarm_end(&state).is_none());

        state.clear_time_ms = Some(20);
        state.clear_value = Some(6.5);
        let json = serde_json::to_value(RealtimeEvent::alarm_end(&state).unwrap()).unwrap();
        assert_eq!(json["type"], "alarm_end");
        assert_eq!(json["msg"], "pH high");
        assert_eq!(json["value"], 6.5);
    }
}
