//! 事件分发
//!
//! 每个样本：写缓存 → 变化则提交持久化并推送 `data` → 报警与联动并行评估 →
//! 报警迁移推送 → 快照交给外部钩子。报警与联动看到每个样本，不只看变化。

use crate::cache::{TagCache, TagSnapshot};
use crate::hooks::HookRunner;
use async_trait::async_trait;
use domain::{Clock, SystemClock, TagSample};
use scada_alarm::{AlarmEngine, AlarmTransition};
use scada_logic::LogicEngine;
use scada_protocol::{PollEventHandler, ProtocolError};
use scada_realtime::{BroadcastHub, RealtimeEvent, RenderedState};
use scada_storage::StoreAndForward;
use std::sync::Arc;
use tracing::{debug, warn};

/// 单个样本的处理结果。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutcome {
    pub changed: bool,
    /// 已交给持久化写入任务（不代表已落库）。
    pub persisted: bool,
    pub alarm_transitions: Vec<AlarmTransition>,
    pub logic_transitions: usize,
}

#[derive(Clone)]
pub struct EventProcessor {
    cache: TagCache,
    alarms: AlarmEngine,
    hub: BroadcastHub,
    logic: Option<LogicEngine>,
    persistence: Option<StoreAndForward>,
    hooks: HookRunner,
    clock: Arc<dyn Clock>,
}

impl EventProcessor {
    pub fn new(cache: TagCache, alarms: AlarmEngine, hub: BroadcastHub) -> Self {
        Self {
            cache,
            alarms,
            hub,
            logic: None,
            persistence: None,
            hooks: HookRunner::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_logic(mut self, logic: LogicEngine) -> Self {
        self.logic = Some(logic);
        self
    }

    pub fn with_persistence(mut self, persistence: StoreAndForward) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_hooks(mut self, hooks: HookRunner) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(&self) -> &TagCache {
        &self.cache
    }

    pub fn alarms(&self) -> &AlarmEngine {
        &self.alarms
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn logic(&self) -> Option<&LogicEngine> {
        self.logic.as_ref()
    }

    /// 以当前时间处理一个值（外部推送入口）。
    pub async fn process_value(&self, tag: &str, value: f64) -> ProcessOutcome {
        let ts_ms = self.clock.now_ms();
        self.process_value_at(tag, value, ts_ms).await
    }

    pub async fn process_value_at(&self, tag: &str, value: f64, ts_ms: i64) -> ProcessOutcome {
        let update = self.cache.apply(tag, value, ts_ms);
        let mut outcome = ProcessOutcome {
            changed: update.changed,
            ..ProcessOutcome::default()
        };

        if update.changed {
            scada_telemetry::record_changed_value();
            if let Some(persistence) = &self.persistence {
                match persistence.save_point(tag, value, ts_ms).await {
                    Ok(()) => outcome.persisted = true,
                    Err(err) => {
                        warn!(target: "scada.pipeline", tag, error = %err, "point_persist_failed");
                    }
                }
            }
            self.hub.broadcast(&RealtimeEvent::Data {
                tag: tag.to_string(),
                value,
                time: ts_ms,
            });
        } else {
            debug!(target: "scada.pipeline", tag, value, "value_unchanged");
        }

        let logic = async {
            match &self.logic {
                Some(engine) => engine.evaluate(tag, value, &self.cache).await.len(),
                None => 0,
            }
        };
        let (alarm_transitions, logic_transitions) =
            tokio::join!(self.alarms.evaluate(tag, value, ts_ms), logic);

        for transition in &alarm_transitions {
            let event = match transition {
                AlarmTransition::Raised(state) => Some(RealtimeEvent::alarm_start(state)),
                AlarmTransition::Cleared(state) => RealtimeEvent::alarm_end(state),
            };
            if let Some(event) = event {
                self.hub.broadcast(&event);
            }
        }
        outcome.alarm_transitions = alarm_transitions;
        outcome.logic_transitions = logic_transitions;

        if !self.hooks.is_empty() {
            self.hooks.dispatch(Arc::new(self.cache.snapshot()));
        }
        outcome
    }

    /// 标记本周期未读到的点位为坏质量。
    pub fn mark_unreadable(&self, tag_names: &[String]) -> usize {
        tag_names
            .iter()
            .filter(|name| self.cache.mark_bad(name))
            .count()
    }

    pub fn snapshot(&self) -> TagSnapshot {
        self.cache.snapshot()
    }

    pub fn render_state(&self) -> RenderedState {
        RenderedState {
            tags: self.cache.snapshot(),
            alarms: self.alarms.active_alarms(),
        }
    }

    /// 推送完整状态，返回投递数。
    pub fn broadcast_update(&self) -> usize {
        self.hub.broadcast(&RealtimeEvent::Update {
            state: self.render_state(),
        })
    }
}

#[async_trait]
impl PollEventHandler for EventProcessor {
    async fn handle_sample(&self, sample: TagSample) {
        self.process_value_at(&sample.tag_name, sample.value, sample.ts_ms)
            .await;
    }

    async fn handle_unreadable(&self, connection: &str, tag_names: &[String], error: &ProtocolError) {
        let marked = self.mark_unreadable(tag_names);
        debug!(
            target: "scada.pipeline",
            connection,
            tags = tag_names.len(),
            marked,
            error = %error,
            "tags_marked_bad"
        );
    }

    async fn cycle_complete(&self, connection: &str) {
        let delivered = self.broadcast_update();
        debug!(target: "scada.pipeline", connection, delivered, "update_broadcast");
    }
}
