//! 报警状态机
//!
//! 每条规则：Normal → PendingOnDelay → Active(Unacked/Acked) → Cleared。
//! 延时按样本时间戳计算，条件在延时内任意一次不成立即回到 Normal。
//! 清除需越过设定值且回退不小于回差；确认与清除互不影响。

use domain::{ActiveAlarmState, AlarmRule, AlarmStatus, Clock, SystemClock};
use scada_storage::{AlarmStartRecord, StoreAndForward};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// 报警引擎错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlarmError {
    #[error("unknown alarm rule: {0}")]
    UnknownRule(String),
    #[error("no alarm instance for rule: {0}")]
    NotActive(String),
    #[error("alarm already acknowledged: {0}")]
    AlreadyAcknowledged(String),
    #[error("alarm state lock poisoned")]
    Lock,
}

/// 状态迁移（用于推送与持久化）。
#[derive(Debug, Clone, PartialEq)]
pub enum AlarmTransition {
    Raised(ActiveAlarmState),
    Cleared(ActiveAlarmState),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Normal,
    Pending { since_ms: i64 },
    Active,
}

#[derive(Debug)]
struct RuleSlot {
    phase: Phase,
    last_sample_ms: Option<i64>,
    /// 未清除的实例，或最近一次已清除未确认的实例。
    instance: Option<ActiveAlarmState>,
}

impl Default for RuleSlot {
    fn default() -> Self {
        Self {
            phase: Phase::Normal,
            last_sample_ms: None,
            instance: None,
        }
    }
}

/// 报警引擎。规则只读；状态表一把锁，只在迁移期间持有。
#[derive(Clone)]
pub struct AlarmEngine {
    inner: Arc<AlarmInner>,
}

struct AlarmInner {
    rules: HashMap<String, AlarmRule>,
    by_tag: HashMap<String, Vec<String>>,
    slots: Mutex<HashMap<String, RuleSlot>>,
    persistence: Option<StoreAndForward>,
    clock: Arc<dyn Clock>,
}

impl AlarmEngine {
    pub fn new(rules: Vec<AlarmRule>) -> Self {
        Self::build(rules, None, Arc::new(SystemClock))
    }

    pub fn build(
        rules: Vec<AlarmRule>,
        persistence: Option<StoreAndForward>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut by_tag: HashMap<String, Vec<String>> = HashMap::new();
        let mut by_id = HashMap::with_capacity(rules.len());
        for rule in rules {
            by_tag
                .entry(rule.tag.clone())
                .or_default()
                .push(rule.id.clone());
            by_id.insert(rule.id.clone(), rule);
        }
        Self {
            inner: Arc::new(AlarmInner {
                rules: by_id,
                by_tag,
                slots: Mutex::new(HashMap::new()),
                persistence,
                clock,
            }),
        }
    }

    pub fn rule(&self, rule_id: &str) -> Option<&AlarmRule> {
        self.inner.rules.get(rule_id)
    }

    /// 评估一个样本，返回发生的迁移；持久化在释放锁之后进行。
    pub async fn evaluate(&self, tag: &str, value: f64, ts_ms: i64) -> Vec<AlarmTransition> {
        let transitions = match self.step(tag, value, ts_ms) {
            Ok(transitions) => transitions,
            Err(err) => {
                warn!(target: "scada.alarm", tag, error = %err, "alarm_evaluate_failed");
                return Vec::new();
            }
        };
        for transition in &transitions {
            self.record(transition).await;
        }
        transitions
    }

    fn step(&self, tag: &str, value: f64, ts_ms: i64) -> Result<Vec<AlarmTransition>, AlarmError> {
        let Some(rule_ids) = self.inner.by_tag.get(tag) else {
            return Ok(Vec::new());
        };
        let mut transitions = Vec::new();
        let mut slots = self.inner.slots.lock().map_err(|_| AlarmError::Lock)?;

        for rule_id in rule_ids {
            let Some(rule) = self.inner.rules.get(rule_id) else {
                continue;
            };
            if !rule.enabled {
                continue;
            }
            let slot = slots.entry(rule_id.clone()).or_default();
            if let Some(last) = slot.last_sample_ms {
                if ts_ms < last {
                    debug!(
                        target: "scada.alarm",
                        rule_id = %rule.id,
                        ts_ms,
                        last_ms = last,
                        "out_of_order_sample_ignored"
                    );
                    continue;
                }
            }
            slot.last_sample_ms = Some(ts_ms);

            let triggered = rule.kind.is_triggered(value, rule.setpoint);
            let on_delay_ms = (rule.on_delay_secs as i64).saturating_mul(1000);

            match slot.phase {
                Phase::Normal if triggered => {
                    if on_delay_ms == 0 {
                        transitions.push(activate(slot, rule, value, ts_ms));
                    } else {
                        slot.phase = Phase::Pending { since_ms: ts_ms };
                        debug!(target: "scada.alarm", rule_id = %rule.id, value, "alarm_pending");
                    }
                }
                Phase::Normal => {}
                Phase::Pending { since_ms } => {
                    if !triggered {
                        slot.phase = Phase::Normal;
                        debug!(target: "scada.alarm", rule_id = %rule.id, value, "alarm_pending_reset");
                    } else if ts_ms - since_ms >= on_delay_ms {
                        transitions.push(activate(slot, rule, value, ts_ms));
                    }
                }
                Phase::Active => {
                    if rule.kind.is_recovered(value, rule.setpoint, rule.hysteresis) {
                        if let Some(cleared) = clear(slot, value, ts_ms) {
                            transitions.push(cleared);
                        }
                    }
                }
            }
        }
        Ok(transitions)
    }

    async fn record(&self, transition: &AlarmTransition) {
        match transition {
            AlarmTransition::Raised(state) => {
                scada_telemetry::record_alarm_raised();
                warn!(
                    target: "scada.alarm",
                    alarm_id = %state.alarm_id,
                    rule_id = %state.rule_id,
                    tag = %state.tag,
                    value = state.value_at_trigger,
                    message = %state.message,
                    "alarm_raised"
                );
                if let Some(persistence) = &self.inner.persistence {
                    let record = AlarmStartRecord {
                        alarm_id: state.alarm_id.clone(),
                        rule_id: state.rule_id.clone(),
                        tag: state.tag.clone(),
                        severity: state.severity,
                        message: state.message.clone(),
                        start_ms: state.trigger_time_ms,
                        start_value: state.value_at_trigger,
                    };
                    if let Err(err) = persistence.save_alarm_start(record).await {
                        warn!(target: "scada.alarm", alarm_id = %state.alarm_id, error = %err, "alarm_start_persist_failed");
                    }
                }
            }
            AlarmTransition::Cleared(state) => {
                scada_telemetry::record_alarm_cleared();
                info!(
                    target: "scada.alarm",
                    alarm_id = %state.alarm_id,
                    rule_id = %state.rule_id,
                    tag = %state.tag,
                    value = ?state.clear_value,
                    "alarm_cleared"
                );
                if let (Some(persistence), Some(end_ms), Some(end_value)) = (
                    &self.inner.persistence,
                    state.clear_time_ms,
                    state.clear_value,
                ) {
                    if let Err(err) = persistence
                        .update_alarm_end(&state.alarm_id, end_ms, end_value)
                        .await
                    {
                        warn!(target: "scada.alarm", alarm_id = %state.alarm_id, error = %err, "alarm_end_persist_failed");
                    }
                }
            }
        }
    }

    /// 确认报警：活动未确认 → 活动已确认；已清除未确认 → 已清除已确认（并移出列表）。
    pub fn acknowledge(&self, rule_id: &str, user: &str) -> Result<ActiveAlarmState, AlarmError> {
        if !self.inner.rules.contains_key(rule_id) {
            return Err(AlarmError::UnknownRule(rule_id.to_string()));
        }
        let now_ms = self.inner.clock.now_ms();
        let mut slots = self.inner.slots.lock().map_err(|_| AlarmError::Lock)?;
        let slot = slots
            .get_mut(rule_id)
            .ok_or_else(|| AlarmError::NotActive(rule_id.to_string()))?;
        let instance = slot
            .instance
            .as_mut()
            .ok_or_else(|| AlarmError::NotActive(rule_id.to_string()))?;

        let next = match instance.status {
            AlarmStatus::ActiveUnacked => AlarmStatus::ActiveAcked,
            AlarmStatus::ClearedUnacked => AlarmStatus::ClearedAcked,
            AlarmStatus::ActiveAcked | AlarmStatus::ClearedAcked => {
                return Err(AlarmError::AlreadyAcknowledged(rule_id.to_string()));
            }
        };
        instance.status = next;
        instance.ack_time_ms = Some(now_ms);
        instance.ack_user = Some(user.to_string());
        let acked = instance.clone();
        if next == AlarmStatus::ClearedAcked {
            slot.instance = None;
        }
        info!(
            target: "scada.alarm",
            alarm_id = %acked.alarm_id,
            rule_id,
            user,
            "alarm_acknowledged"
        );
        Ok(acked)
    }

    /// 活动报警及已清除未确认的报警，按触发时间排序。
    pub fn active_alarms(&self) -> Vec<ActiveAlarmState> {
        let Ok(slots) = self.inner.slots.lock() else {
            return Vec::new();
        };
        let mut alarms: Vec<ActiveAlarmState> = slots
            .values()
            .filter_map(|slot| slot.instance.clone())
            .collect();
        alarms.sort_by(|a, b| {
            a.trigger_time_ms
                .cmp(&b.trigger_time_ms)
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });
        alarms
    }

    pub fn is_active(&self, rule_id: &str) -> bool {
        self.inner
            .slots
            .lock()
            .map(|slots| {
                slots
                    .get(rule_id)
                    .is_some_and(|slot| slot.phase == Phase::Active)
            })
            .unwrap_or(false)
    }
}

fn activate(slot: &mut RuleSlot, rule: &AlarmRule, value: f64, ts_ms: i64) -> AlarmTransition {
    let state = ActiveAlarmState {
        alarm_id: uuid::Uuid::new_v4().to_string(),
        rule_id: rule.id.clone(),
        tag: rule.tag.clone(),
        kind: rule.kind,
        severity: rule.severity,
        message: rule.message.clone(),
        trigger_time_ms: ts_ms,
        value_at_trigger: value,
        ack_time_ms: None,
        ack_user: None,
        clear_time_ms: None,
        clear_value: None,
        status: AlarmStatus::ActiveUnacked,
    };
    slot.phase = Phase::Active;
    slot.instance = Some(state.clone());
    AlarmTransition::Raised(state)
}

fn clear(slot: &mut RuleSlot, value: f64, ts_ms: i64) -> Option<AlarmTransition> {
    slot.phase = Phase::Normal;
    let mut state = slot.instance.take()?;
    state.clear_time_ms = Some(ts_ms);
    state.clear_value = Some(value);
    state.status = if state.status.is_acked() {
        AlarmStatus::ClearedAcked
    } else {
        AlarmStatus::ClearedUnacked
    };
    if state.status == AlarmStatus::ClearedUnacked {
        slot.instance = Some(state.clone());
    }
    Some(AlarmTransition::Cleared(state))
}
