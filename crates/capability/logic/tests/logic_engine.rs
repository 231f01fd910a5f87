use async_trait::async_trait;
use chrono::NaiveTime;
use domain::{
    CompareOp, DeviceAction, GlobalSchedule, GlobalSettings, LogicCondition, LogicRule,
    LogicRuleSet, ManualClock, RuleRuntimeState, ScheduleWindow, ScheduledThreshold,
    StopCondition, TagReader, ThresholdSource,
};
use scada_control::{ControlAck, ControlError, ControlRoute, DeviceControl};
use scada_logic::{LogicEdge, LogicEngine, LogicError};
use scada_storage::{InMemoryRuleStateStore, RuleStateStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingControl {
    sent: Mutex<Vec<(String, f64)>>,
    fail: bool,
}

impl RecordingControl {
    fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn sent(&self) -> Vec<(String, f64)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceControl for RecordingControl {
    async fn send_control_command(
        &self,
        device_id: &str,
        _command: &str,
        _parameter: &str,
        value: f64,
    ) -> Result<ControlAck, ControlError> {
        self.sent
            .lock()
            .unwrap()
            .push((device_id.to_string(), value));
        if self.fail {
            return Err(ControlError::UnknownDevice(device_id.to_string()));
        }
        Ok(ControlAck {
            device_id: device_id.to_string(),
            route: ControlRoute::Modbus,
            value,
            response: None,
        })
    }
}

#[derive(Default)]
struct Tags(HashMap<String, f64>);

impl Tags {
    fn with(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }
}

impl TagReader for Tags {
    fn value_of(&self, tag: &str) -> Option<f64> {
        self.0.get(tag).copied()
    }
}

fn hhmm(raw: &str) -> NaiveTime {
    NaiveTime::parse_from_str(raw, "%H:%M").unwrap()
}

fn window(start: &str, end: &str) -> ScheduleWindow {
    ScheduleWindow {
        start: start.to_string(),
        end: end.to_string(),
    }
}

fn action(device_id: &str, value: Option<f64>) -> DeviceAction {
    DeviceAction {
        device_id: device_id.to_string(),
        command: "set_value".to_string(),
        parameter: None,
        value,
    }
}

fn rule(id: &str, threshold: ThresholdSource) -> LogicRule {
    LogicRule {
        id: id.to_string(),
        enabled: true,
        condition: LogicCondition {
            tag: "tank_level".to_string(),
            operator: CompareOp::Gt,
            threshold,
        },
        schedules: Vec::new(),
        stop: StopCondition::Standard,
        min_run_time_secs: 0,
        actions: vec![action("pump_a", None)],
    }
}

fn literal(value: f64) -> ThresholdSource {
    ThresholdSource::Literal { value }
}

fn rule_set(rules: Vec<LogicRule>) -> LogicRuleSet {
    LogicRuleSet {
        globals: GlobalSettings::default(),
        rules,
    }
}

#[tokio::test]
async fn minimum_run_time_defers_stop() {
    let clock = Arc::new(ManualClock::new(0));
    let control = Arc::new(RecordingControl::default());
    let mut pump = rule("pump", literal(10.0));
    pump.min_run_time_secs = 300;
    let engine = LogicEngine::build(rule_set(vec![pump]), control.clone(), None, clock.clone()).unwrap();
    let tags = Tags::default();

    let started = engine.evaluate("tank_level", 12.0, &tags).await;
    assert_eq!(started[0].edge, LogicEdge::Started);

    clock.advance_secs(60);
    assert!(engine.evaluate("tank_level", 8.0, &tags).await.is_empty());
    clock.advance_secs(239);
    assert!(engine.evaluate("tank_level", 8.0, &tags).await.is_empty());
    assert!(engine.state("pump").unwrap().active);

    clock.advance_secs(1);
    let stopped = engine.evaluate("tank_level", 8.0, &tags).await;
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0].edge, LogicEdge::Stopped);
    assert_eq!(stopped[0].at_ms, 300_000);
    assert!(!engine.state("pump").unwrap().active);
    assert_eq!(
        control.sent(),
        vec![("pump_a".to_string(), 1.0), ("pump_a".to_string(), 0.0)]
    );
}

#[tokio::test]
async fn start_uses_action_value_and_stop_forces_off() {
    let clock = Arc::new(ManualClock::new(0));
    let control = Arc::new(RecordingControl::default());
    let mut pump = rule("pump", literal(10.0));
    pump.actions = vec![action("pump_a", None), action("valve_b", Some(42.0))];
    let engine = LogicEngine::build(rule_set(vec![pump]), control.clone(), None, clock).unwrap();
    let tags = Tags::default();

    engine.evaluate("tank_level", 11.0, &tags).await;
    // 已激活时重复满足条件不会再次下发
    engine.evaluate("tank_level", 12.0, &tags).await;
    engine.evaluate("tank_level", 9.0, &tags).await;

    assert_eq!(
        control.sent(),
        vec![
            ("pump_a".to_string(), 1.0),
            ("valve_b".to_string(), 42.0),
            ("pump_a".to_string(), 0.0),
            ("valve_b".to_string(), 0.0),
        ]
    );
}

#[tokio::test]
async fn hysteresis_band_delays_stop() {
    let clock = Arc::new(ManualClock::new(0));
    let control = Arc::new(RecordingControl::default());
    let mut pump = rule("pump", literal(10.0));
    pump.stop = StopCondition::Hysteresis { band: 1.0 };
    let engine = LogicEngine::build(rule_set(vec![pump]), control, None, clock).unwrap();
    let tags = Tags::default();

    engine.evaluate("tank_level", 10.5, &tags).await;
    assert!(engine.evaluate("tank_level", 9.5, &tags).await.is_empty());
    assert!(engine.state("pump").unwrap().active);
    let stopped = engine.evaluate("tank_level", 8.9, &tags).await;
    assert_eq!(stopped[0].edge, LogicEdge::Stopped);
}

#[tokio::test]
async fn overnight_rule_schedule_overrides_threshold() {
    let mut pump = rule("pump", literal(10.0));
    pump.schedules = vec![ScheduledThreshold {
        window: window("22:00", "06:00"),
        threshold: 5.0,
    }];

    for (time, expect_start) in [
        ("23:30", true),
        ("02:00", true),
        ("06:00", true),
        ("06:01", false),
        ("12:00", false),
    ] {
        let clock = Arc::new(ManualClock::with_local_time(0, hhmm(time)));
        let engine = LogicEngine::build(
            rule_set(vec![pump.clone()]),
            Arc::new(RecordingControl::default()),
            None,
            clock,
        )
        .unwrap();
        let transitions = engine.evaluate("tank_level", 7.0, &Tags::default()).await;
        assert_eq!(!transitions.is_empty(), expect_start, "at {time}");
        if expect_start {
            assert_eq!(transitions[0].threshold, 5.0);
        }
    }
}

#[tokio::test]
async fn global_setting_follows_global_schedule() {
    let globals = GlobalSettings {
        values: HashMap::from([("level_max".to_string(), 10.0)]),
        schedules: vec![GlobalSchedule {
            window: window("22:00", "06:00"),
            values: HashMap::from([("level_max".to_string(), 3.0)]),
        }],
    };
    let set = LogicRuleSet {
        globals,
        rules: vec![rule(
            "pump",
            ThresholdSource::Global {
                key: "level_max".to_string(),
            },
        )],
    };

    let day = LogicEngine::build(
        set.clone(),
        Arc::new(RecordingControl::default()),
        None,
        Arc::new(ManualClock::with_local_time(0, hhmm("12:00"))),
    )
    .unwrap();
    assert!(day.evaluate("tank_level", 5.0, &Tags::default()).await.is_empty());

    let night = LogicEngine::build(
        set,
        Arc::new(RecordingControl::default()),
        None,
        Arc::new(ManualClock::with_local_time(0, hhmm("23:00"))),
    )
    .unwrap();
    let transitions = night.evaluate("tank_level", 5.0, &Tags::default()).await;
    assert_eq!(transitions[0].threshold, 3.0);
}

#[tokio::test]
async fn tag_reference_needs_cached_value() {
    let clock = Arc::new(ManualClock::new(0));
    let engine = LogicEngine::build(
        rule_set(vec![rule(
            "pump",
            ThresholdSource::Tag {
                tag: "level_setpoint".to_string(),
                offset: 2.0,
            },
        )]),
        Arc::new(RecordingControl::default()),
        None,
        clock,
    )
    .unwrap();

    assert!(engine.evaluate("tank_level", 100.0, &Tags::default()).await.is_empty());
    assert!(engine.state("pump").is_none());

    let tags = Tags::default().with("level_setpoint", 5.0);
    assert!(engine.evaluate("tank_level", 6.5, &tags).await.is_empty());
    let transitions = engine.evaluate("tank_level", 7.5, &tags).await;
    assert_eq!(transitions[0].threshold, 7.0);
}

#[tokio::test]
async fn control_failure_does_not_block_transition() {
    let control = Arc::new(RecordingControl::failing());
    let engine = LogicEngine::build(
        rule_set(vec![rule("pump", literal(10.0))]),
        control.clone(),
        None,
        Arc::new(ManualClock::new(0)),
    )
    .unwrap();

    let transitions = engine.evaluate("tank_level", 11.0, &Tags::default()).await;
    assert_eq!(transitions.len(), 1);
    assert!(engine.state("pump").unwrap().active);
    assert_eq!(control.sent().len(), 1);
}

#[tokio::test]
async fn state_is_persisted_and_restored() {
    let store = Arc::new(InMemoryRuleStateStore::new());
    let clock = Arc::new(ManualClock::new(5_000));
    let set = rule_set(vec![rule("pump", literal(10.0))]);

    let engine = LogicEngine::build(
        set.clone(),
        Arc::new(RecordingControl::default()),
        Some(store.clone()),
        clock.clone(),
    )
    .unwrap();
    engine.evaluate("tank_level", 11.0, &Tags::default()).await;
    let saved = store.load_states().await.unwrap();
    assert_eq!(
        saved.get("pump"),
        Some(&RuleRuntimeState {
            active: true,
            last_eval_ms: 5_000,
            start_ms: Some(5_000),
        })
    );

    let control = Arc::new(RecordingControl::default());
    let restarted = LogicEngine::build(set, control.clone(), Some(store.clone()), clock).unwrap();
    assert_eq!(restarted.restore().await.unwrap(), 1);
    // 恢复后为激活态：再次满足条件不重复启动，低于阈值直接停止
    assert!(restarted.evaluate("tank_level", 12.0, &Tags::default()).await.is_empty());
    let stopped = restarted.evaluate("tank_level", 9.0, &Tags::default()).await;
    assert_eq!(stopped[0].edge, LogicEdge::Stopped);
    assert_eq!(control.sent(), vec![("pump_a".to_string(), 0.0)]);
    assert!(!store.load_states().await.unwrap()["pump"].active);
}

#[tokio::test]
async fn rule_set_is_replaced_as_a_whole() {
    let engine = LogicEngine::build(
        rule_set(vec![rule("pump", literal(10.0))]),
        Arc::new(RecordingControl::default()),
        None,
        Arc::new(ManualClock::new(0)),
    )
    .unwrap();
    engine.evaluate("tank_level", 11.0, &Tags::default()).await;

    let mut broken = rule("fan", literal(1.0));
    broken.schedules = vec![ScheduledThreshold {
        window: window("25:00", "06:00"),
        threshold: 1.0,
    }];
    assert!(matches!(
        engine.replace_rules(rule_set(vec![broken])),
        Err(LogicError::InvalidRule { .. })
    ));
    assert_eq!(engine.rules().unwrap().rules[0].id, "pump");

    let duplicate = rule_set(vec![rule("fan", literal(1.0)), rule("fan", literal(2.0))]);
    assert!(engine.replace_rules(duplicate).is_err());

    engine
        .replace_rules(rule_set(vec![rule("fan", literal(1.0))]))
        .unwrap();
    assert_eq!(engine.rules().unwrap().rules[0].id, "fan");
    assert!(engine.state("pump").is_none());
}

#[test]
fn rule_set_parses_from_json() {
    let json = r#"{
        "globals": {
            "values": {"level_max": 10.0},
            "schedules": [{"start": "22:00", "end": "06:00", "values": {"level_max": 3.0}}]
        },
        "rules": [{
            "id": "pump",
            "condition": {"tag": "tank_level", "operator": ">", "threshold": {"source": "literal", "value": 10.0}},
            "schedules": [{"start": "08:00", "end": "18:00", "threshold": 12.0}],
            "actions": [{"device_id": "pump_a"}]
        }]
    }"#;
    let set: LogicRuleSet = serde_json::from_str(json).unwrap();
    assert_eq!(set.globals.schedules[0].window.start, "22:00");
    assert_eq!(set.rules[0].schedules[0].threshold, 12.0);
    assert_eq!(set.rules[0].stop, StopCondition::Standard);
}
