//! 自动化联动规则引擎
//!
//! - 阈值来源：字面值 / 全局设定（全局时段覆盖）/ 其他点位 + 偏移；规则时段优先
//! - 停止条件：standard（启动条件不成立）或 hysteresis（越过阈值 band）
//! - 最小运行时间内的停止请求被推迟
//! - 启动下发动作值（缺省 1.0），停止一律下发 0.0
//!
//! 规则集是不可变快照，`replace_rules` 整体替换；运行状态表一把锁，
//! 只在判定期间持有，下发与持久化在锁外进行。

use chrono::NaiveTime;
use domain::{
    Clock, CompareOp, LogicRule, LogicRuleSet, RuleRuntimeState, StopCondition, SystemClock,
    TagReader, ThresholdSource,
};
use scada_control::DeviceControl;
use scada_storage::RuleStateStore;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// 启动时缺省下发值。
pub const DEFAULT_ON_VALUE: f64 = 1.0;
/// 停止时下发值。
pub const OFF_VALUE: f64 = 0.0;
const DEFAULT_PARAMETER: &str = "value";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogicError {
    #[error("invalid logic rule {rule_id}: {reason}")]
    InvalidRule { rule_id: String, reason: String },
    #[error("logic state lock poisoned")]
    Lock,
}

/// 状态迁移方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicEdge {
    Started,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicTransition {
    pub rule_id: String,
    pub edge: LogicEdge,
    pub value: f64,
    pub threshold: f64,
    pub at_ms: i64,
}

/// 待下发的一条规则迁移（锁外执行）。
struct PendingDispatch {
    rule: LogicRule,
    transition: LogicTransition,
    state: RuleRuntimeState,
}

#[derive(Clone)]
pub struct LogicEngine {
    inner: Arc<LogicInner>,
}

struct LogicInner {
    rules: RwLock<Arc<LogicRuleSet>>,
    states: Mutex<HashMap<String, RuleRuntimeState>>,
    control: Arc<dyn DeviceControl>,
    state_store: Option<Arc<dyn RuleStateStore>>,
    clock: Arc<dyn Clock>,
}

impl LogicEngine {
    pub fn new(rules: LogicRuleSet, control: Arc<dyn DeviceControl>) -> Result<Self, LogicError> {
        Self::build(rules, control, None, Arc::new(SystemClock))
    }

    pub fn build(
        rules: LogicRuleSet,
        control: Arc<dyn DeviceControl>,
        state_store: Option<Arc<dyn RuleStateStore>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LogicError> {
        validate_rule_set(&rules)?;
        Ok(Self {
            inner: Arc::new(LogicInner {
                rules: RwLock::new(Arc::new(rules)),
                states: Mutex::new(HashMap::new()),
                control,
                state_store,
                clock,
            }),
        })
    }

    /// 当前规则集快照。
    pub fn rules(&self) -> Result<Arc<LogicRuleSet>, LogicError> {
        self.inner
            .rules
            .read()
            .map(|guard| Arc::clone(&*guard))
            .map_err(|_| LogicError::Lock)
    }

    /// 整体替换规则集。已删除规则的运行状态一并丢弃。
    pub fn replace_rules(&self, rules: LogicRuleSet) -> Result<(), LogicError> {
        validate_rule_set(&rules)?;
        let kept: HashSet<String> = rules.rules.iter().map(|r| r.id.clone()).collect();
        let count = rules.rules.len();
        {
            let mut guard = self.inner.rules.write().map_err(|_| LogicError::Lock)?;
            *guard = Arc::new(rules);
        }
        let mut states = self.inner.states.lock().map_err(|_| LogicError::Lock)?;
        states.retain(|rule_id, state| {
            let keep = kept.contains(rule_id);
            if !keep && state.active {
                warn!(target: "scada.logic", rule_id = %rule_id, "active_rule_removed");
            }
            keep
        });
        info!(target: "scada.logic", rules = count, "logic_rules_replaced");
        Ok(())
    }

    /// 从状态存储恢复运行状态，只恢复当前规则集中存在的规则。
    pub async fn restore(&self) -> Result<usize, LogicError> {
        let Some(store) = &self.inner.state_store else {
            return Ok(0);
        };
        let loaded = match store.load_states().await {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(target: "scada.logic", error = %err, "rule_state_restore_failed");
                return Ok(0);
            }
        };
        let rules = self.rules()?;
        let known: HashSet<&str> = rules.rules.iter().map(|r| r.id.as_str()).collect();
        let mut states = self.inner.states.lock().map_err(|_| LogicError::Lock)?;
        let mut restored = 0;
        for (rule_id, state) in loaded {
            if known.contains(rule_id.as_str()) {
                states.insert(rule_id, state);
                restored += 1;
            }
        }
        info!(target: "scada.logic", restored, "rule_states_restored");
        Ok(restored)
    }

    pub fn state(&self, rule_id: &str) -> Option<RuleRuntimeState> {
        self.inner
            .states
            .lock()
            .ok()
            .and_then(|states| states.get(rule_id).copied())
    }

    pub fn states(&self) -> HashMap<String, RuleRuntimeState> {
        self.inner
            .states
            .lock()
            .map(|states| states.clone())
            .unwrap_or_default()
    }

    /// 评估条件点位为 `tag` 的全部启用规则，返回发生的迁移。
    pub async fn evaluate(&self, tag: &str, value: f64, tags: &dyn TagReader) -> Vec<LogicTransition> {
        let pending = match self.step(tag, value, tags) {
            Ok(pending) => pending,
            Err(err) => {
                warn!(target: "scada.logic", tag, error = %err, "logic_evaluate_failed");
                return Vec::new();
            }
        };

        let mut transitions = Vec::with_capacity(pending.len());
        for item in pending {
            self.dispatch(&item).await;
            self.persist(&item.transition.rule_id, &item.state).await;
            transitions.push(item.transition);
        }
        transitions
    }

    fn step(
        &self,
        tag: &str,
        value: f64,
        tags: &dyn TagReader,
    ) -> Result<Vec<PendingDispatch>, LogicError> {
        let rules = self.rules()?;
        let now_ms = self.inner.clock.now_ms();
        let local = self.inner.clock.local_time();
        let mut pending = Vec::new();
        let mut states = self.inner.states.lock().map_err(|_| LogicError::Lock)?;

        for rule in rules
            .rules
            .iter()
            .filter(|r| r.enabled && r.condition.tag == tag)
        {
            let Some(threshold) = resolve_threshold(rule, &rules, tags, local) else {
                debug!(target: "scada.logic", rule_id = %rule.id, "threshold_unresolved");
                continue;
            };
            let operator = rule.condition.operator;
            let should_start = operator.holds(value, threshold);
            let state = states.entry(rule.id.clone()).or_default();

            if !state.active {
                if should_start {
                    *state = RuleRuntimeState {
                        active: true,
                        last_eval_ms: now_ms,
                        start_ms: Some(now_ms),
                    };
                    scada_telemetry::record_logic_start();
                    info!(target: "scada.logic", rule_id = %rule.id, value, threshold, "logic_rule_started");
                    pending.push(PendingDispatch {
                        rule: rule.clone(),
                        transition: LogicTransition {
                            rule_id: rule.id.clone(),
                            edge: LogicEdge::Started,
                            value,
                            threshold,
                            at_ms: now_ms,
                        },
                        state: *state,
                    });
                }
                continue;
            }

            if !should_stop(rule.stop, operator, value, threshold, should_start) {
                continue;
            }

            let min_run_ms = (rule.min_run_time_secs as i64).saturating_mul(1000);
            let elapsed_ms = state.start_ms.map(|start| now_ms - start).unwrap_or(i64::MAX);
            if elapsed_ms < min_run_ms {
                scada_telemetry::record_logic_deferral();
                info!(
                    target: "scada.logic",
                    rule_id = %rule.id,
                    elapsed_ms,
                    min_run_ms,
                    "logic_stop_deferred"
                );
                continue;
            }

            *state = RuleRuntimeState {
                active: false,
                last_eval_ms: now_ms,
                start_ms: None,
            };
            scada_telemetry::record_logic_stop();
            info!(target: "scada.logic", rule_id = %rule.id, value, threshold, elapsed_ms, "logic_rule_stopped");
            pending.push(PendingDispatch {
                rule: rule.clone(),
                transition: LogicTransition {
                    rule_id: rule.id.clone(),
                    edge: LogicEdge::Stopped,
                    value,
                    threshold,
                    at_ms: now_ms,
                },
                state: *state,
            });
        }
        Ok(pending)
    }

    async fn dispatch(&self, item: &PendingDispatch) {
        for action in &item.rule.actions {
            let value = match item.transition.edge {
                LogicEdge::Started => action.value.unwrap_or(DEFAULT_ON_VALUE),
                LogicEdge::Stopped => OFF_VALUE,
            };
            let parameter = action.parameter.as_deref().unwrap_or(DEFAULT_PARAMETER);
            if let Err(err) = self
                .inner
                .control
                .send_control_command(&action.device_id, &action.command, parameter, value)
                .await
            {
                warn!(
                    target: "scada.logic",
                    rule_id = %item.rule.id,
                    device_id = %action.device_id,
                    value,
                    error = %err,
                    "logic_action_failed"
                );
            }
        }
    }

    async fn persist(&self, rule_id: &str, state: &RuleRuntimeState) {
        if let Some(store) = &self.inner.state_store {
            if let Err(err) = store.save_state(rule_id, state).await {
                warn!(target: "scada.logic", rule_id, error = %err, "rule_state_persist_failed");
            }
        }
    }
}

/// 解析比较阈值。引用点位无缓存值或全局设定缺失时返回 `None`。
pub fn resolve_threshold(
    rule: &LogicRule,
    rules: &LogicRuleSet,
    tags: &dyn TagReader,
    local: NaiveTime,
) -> Option<f64> {
    if let Some(scheduled) = rule.schedules.iter().find(|s| s.window.matches(local)) {
        return Some(scheduled.threshold);
    }
    match &rule.condition.threshold {
        ThresholdSource::Literal { value } => Some(*value),
        ThresholdSource::Global { key } => rules
            .globals
            .schedules
            .iter()
            .filter(|s| s.window.matches(local))
            .find_map(|s| s.values.get(key).copied())
            .or_else(|| rules.globals.values.get(key).copied()),
        ThresholdSource::Tag { tag, offset } => tags.value_of(tag).map(|v| v + offset),
    }
}

/// 活动规则是否应停止（未考虑最小运行时间）。
pub fn should_stop(
    stop: StopCondition,
    operator: CompareOp,
    value: f64,
    threshold: f64,
    should_start: bool,
) -> bool {
    match stop {
        StopCondition::Standard => !should_start,
        StopCondition::Hysteresis { band } => {
            let band = band.abs();
            match operator {
                CompareOp::Gt => value < threshold - band,
                CompareOp::Lt => value > threshold + band,
                CompareOp::Eq => (value - threshold).abs() > band,
            }
        }
    }
}

fn validate_rule_set(rules: &LogicRuleSet) -> Result<(), LogicError> {
    let mut seen = HashSet::new();
    for rule in &rules.rules {
        if !seen.insert(rule.id.as_str()) {
            return Err(invalid(&rule.id, "duplicate rule id"));
        }
        for schedule in &rule.schedules {
            schedule
                .window
                .window()
                .map_err(|e| invalid(&rule.id, &e.to_string()))?;
        }
    }
    for schedule in &rules.globals.schedules {
        schedule
            .window
            .window()
            .map_err(|e| invalid("globals", &e.to_string()))?;
    }
    Ok(())
}

fn invalid(rule_id: &str, reason: &str) -> LogicError {
    LogicError::InvalidRule {
        rule_id: rule_id.to_string(),
        reason: reason.to_string(),
    }
}
