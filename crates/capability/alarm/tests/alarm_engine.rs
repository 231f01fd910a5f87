use domain::{AlarmKind, AlarmRule, AlarmStatus, ManualClock, Severity};
use scada_alarm::{AlarmEngine, AlarmError, AlarmTransition};
use scada_storage::{ForwardConfig, InMemoryBufferQueue, InMemoryHistoryStore, StoreAndForward};
use std::sync::Arc;

fn rule(id: &str, kind: AlarmKind, setpoint: f64, hysteresis: f64, on_delay_secs: u64) -> AlarmRule {
    AlarmRule {
        id: id.to_string(),
        tag: "mixer_ph".to_string(),
        kind,
        setpoint,
        hysteresis,
        on_delay_secs,
        severity: Severity::Warning,
        message: format!("{id} tripped"),
        enabled: true,
    }
}

fn engine(rules: Vec<AlarmRule>) -> AlarmEngine {
    AlarmEngine::build(rules, None, Arc::new(ManualClock::new(0)))
}

#[tokio::test]
async fn on_delay_requires_continuous_condition() {
    let engine = engine(vec![rule("ph_high", AlarmKind::High, 8.0, 0.0, 3)]);

    for ts in [0, 1_000, 2_000, 2_999] {
        assert!(engine.evaluate("mixer_ph", 9.0, ts).await.is_empty());
        assert!(!engine.is_active("ph_high"));
    }
    let transitions = engine.evaluate("mixer_ph", 9.0, 3_000).await;
    assert_eq!(transitions.len(), 1);
    assert!(matches!(&transitions[0], AlarmTransition::Raised(s) if s.trigger_time_ms == 3_000));
    assert!(engine.is_active("ph_high"));
}

#[tokio::test]
async fn short_excursion_never_activates() {
    let engine = engine(vec![rule("ph_high", AlarmKind::High, 8.0, 0.0, 3)]);

    engine.evaluate("mixer_ph", 9.0, 0).await;
    engine.evaluate("mixer_ph", 9.0, 1_000).await;
    engine.evaluate("mixer_ph", 5.0, 1_500).await;
    // 定时器已被丢弃，重新计时
    assert!(engine.evaluate("mixer_ph", 9.0, 3_500).await.is_empty());
    assert!(engine.evaluate("mixer_ph", 9.0, 6_000).await.is_empty());
    assert!(!engine.is_active("ph_high"));
    assert_eq!(engine.evaluate("mixer_ph", 9.0, 6_500).await.len(), 1);
}

#[tokio::test]
async fn hysteresis_gates_clearing() {
    let engine = engine(vec![rule("ph_high", AlarmKind::High, 8.0, 1.0, 0)]);

    engine.evaluate("mixer_ph", 9.0, 0).await;
    assert!(engine.is_active("ph_high"));

    assert!(engine.evaluate("mixer_ph", 7.5, 1_000).await.is_empty());
    assert!(engine.is_active("ph_high"));

    let transitions = engine.evaluate("mixer_ph", 6.9, 2_000).await;
    match transitions.as_slice() {
        [AlarmTransition::Cleared(state)] => {
            assert_eq!(state.clear_time_ms, Some(2_000));
            assert_eq!(state.clear_value, Some(6.9));
            assert_eq!(state.status, AlarmStatus::ClearedUnacked);
        }
        other => panic!("unexpected transitions: {other:?}"),
    }
    assert!(!engine.is_active("ph_high"));
}

#[tokio::test]
async fn value_exactly_at_hysteresis_band_stays_active() {
    let engine = engine(vec![
        rule("ph_high", AlarmKind::High, 8.0, 1.0, 0),
        rule("ph_limit", AlarmKind::HighHigh, 9.0, 0.0, 0),
    ]);

    assert_eq!(engine.evaluate("mixer_ph", 9.5, 0).await.len(), 2);
    // 9.0 恰好等于无回差规则的设定值，7.0 恰好在回差边界上
    assert_eq!(engine.evaluate("mixer_ph", 9.0, 1_000).await.len(), 0);
    assert!(engine.is_active("ph_limit"));

    let transitions = engine.evaluate("mixer_ph", 7.0, 2_000).await;
    assert_eq!(transitions.len(), 1);
    assert!(matches!(&transitions[0], AlarmTransition::Cleared(s) if s.rule_id == "ph_limit"));
    assert!(engine.is_active("ph_high"));

    assert_eq!(engine.evaluate("mixer_ph", 6.9, 3_000).await.len(), 1);
    assert!(!engine.is_active("ph_high"));
}

#[tokio::test]
async fn low_alarm_mirrors_high() {
    let engine = engine(vec![rule("ph_low", AlarmKind::Low, 5.0, 0.5, 0)]);

    assert_eq!(engine.evaluate("mixer_ph", 4.0, 0).await.len(), 1);
    assert!(engine.evaluate("mixer_ph", 5.3, 1_000).await.is_empty());
    assert_eq!(engine.evaluate("mixer_ph", 5.6, 2_000).await.len(), 1);
}

#[tokio::test]
async fn at_most_one_open_instance_per_rule() {
    let engine = engine(vec![rule("ph_high", AlarmKind::High, 8.0, 0.0, 0)]);

    let raised = engine.evaluate("mixer_ph", 9.0, 0).await;
    assert_eq!(raised.len(), 1);
    for ts in 1..10 {
        assert!(engine.evaluate("mixer_ph", 9.5, ts * 1_000).await.is_empty());
    }
    let open: Vec<_> = engine
        .active_alarms()
        .into_iter()
        .filter(|a| a.status.is_active())
        .collect();
    assert_eq!(open.len(), 1);
}

#[tokio::test]
async fn acknowledgement_is_orthogonal_to_clearing() {
    let clock = Arc::new(ManualClock::new(50_000));
    let engine = AlarmEngine::build(
        vec![rule("ph_high", AlarmKind::High, 8.0, 1.0, 0)],
        None,
        clock.clone(),
    );

    assert_eq!(
        engine.acknowledge("ph_high", "op"),
        Err(AlarmError::NotActive("ph_high".to_string()))
    );
    assert_eq!(
        engine.acknowledge("missing", "op"),
        Err(AlarmError::UnknownRule("missing".to_string()))
    );

    engine.evaluate("mixer_ph", 9.0, 0).await;
    let acked = engine.acknowledge("ph_high", "operator-1").unwrap();
    assert_eq!(acked.status, AlarmStatus::ActiveAcked);
    assert_eq!(acked.ack_user.as_deref(), Some("operator-1"));
    assert_eq!(acked.ack_time_ms, Some(50_000));
    assert!(matches!(
        engine.acknowledge("ph_high", "operator-1"),
        Err(AlarmError::AlreadyAcknowledged(_))
    ));

    // 已确认的报警仍需满足回差才清除
    assert!(engine.evaluate("mixer_ph", 7.5, 1_000).await.is_empty());
    let cleared = engine.evaluate("mixer_ph", 6.0, 2_000).await;
    assert!(matches!(&cleared[0], AlarmTransition::Cleared(s) if s.status == AlarmStatus::ClearedAcked));
    assert!(engine.active_alarms().is_empty());
}

#[tokio::test]
async fn cleared_unacked_alarm_can_be_acknowledged() {
    let engine = engine(vec![rule("ph_high", AlarmKind::High, 8.0, 0.0, 0)]);
    engine.evaluate("mixer_ph", 9.0, 0).await;
    engine.evaluate("mixer_ph", 7.0, 1_000).await;

    let listed = engine.active_alarms();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, AlarmStatus::ClearedUnacked);

    let acked = engine.acknowledge("ph_high", "op").unwrap();
    assert_eq!(acked.status, AlarmStatus::ClearedAcked);
    assert!(engine.active_alarms().is_empty());
}

#[tokio::test]
async fn out_of_order_samples_are_ignored() {
    let engine = engine(vec![rule("ph_high", AlarmKind::High, 8.0, 0.0, 2)]);
    engine.evaluate("mixer_ph", 9.0, 5_000).await;
    // 较早的样本不会打断延时
    assert!(engine.evaluate("mixer_ph", 1.0, 4_000).await.is_empty());
    assert_eq!(engine.evaluate("mixer_ph", 9.0, 7_000).await.len(), 1);
}

#[tokio::test]
async fn disabled_rules_and_other_tags_are_skipped() {
    let mut disabled = rule("ph_high", AlarmKind::High, 8.0, 0.0, 0);
    disabled.enabled = false;
    let engine = engine(vec![disabled]);
    assert!(engine.evaluate("mixer_ph", 20.0, 0).await.is_empty());
    assert!(engine.evaluate("other", 20.0, 0).await.is_empty());
}

#[tokio::test]
async fn transitions_are_persisted_with_consistent_alarm_id() {
    let store = Arc::new(InMemoryHistoryStore::new());
    let writer = StoreAndForward::new(
        store.clone(),
        Arc::new(InMemoryBufferQueue::new()),
        ForwardConfig::default(),
    );
    let engine = AlarmEngine::build(
        vec![rule("ph_high", AlarmKind::High, 8.0, 0.5, 0)],
        Some(writer.clone()),
        Arc::new(ManualClock::new(0)),
    );

    store.set_available(false);
    let raised = engine.evaluate("mixer_ph", 9.0, 1_000).await;
    let AlarmTransition::Raised(state) = &raised[0] else {
        panic!("expected raise");
    };
    writer.flush().await.unwrap();
    store.set_available(true);
    engine.evaluate("mixer_ph", 7.0, 2_000).await;
    writer.flush().await.unwrap();
    assert_eq!(writer.pending().await.unwrap(), 2);

    writer.drain_once().await.unwrap();
    let alarms = store.alarms();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].record.alarm_id, state.alarm_id);
    assert_eq!(alarms[0].record.start_value, 9.0);
    assert_eq!(alarms[0].end_value, Some(7.0));
}
