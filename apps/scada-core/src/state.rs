//! 运行时装配
//!
//! 启动时按项目配置显式构造各服务实例并连接起来，不使用全局单例。

use domain::Clock;
use scada_alarm::AlarmEngine;
use scada_config::ProjectConfig;
use scada_control::{ControlError, ControlRouter, DeviceControl, ModbusControl, VendorHttpControl};
use scada_logic::{LogicEngine, LogicError};
use scada_pipeline::{EventProcessor, HookRunner, TagCache};
use scada_protocol::{PollingScheduler, RegisterConnector};
use scada_realtime::BroadcastHub;
use scada_storage::{BufferQueue, ForwardConfig, HistoryStore, RuleStateStore, StoreAndForward};
use std::sync::Arc;
use tracing::info;

/// 启动装配错误（均为致命错误）。
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("logic rules rejected: {0}")]
    Logic(#[from] LogicError),
    #[error("control setup failed: {0}")]
    Control(#[from] ControlError),
}

/// 存储后端。
pub struct Backends {
    pub history: Arc<dyn HistoryStore>,
    pub queue: Arc<dyn BufferQueue>,
    pub rule_states: Option<Arc<dyn RuleStateStore>>,
}

/// HTTP 层共享状态。
#[derive(Clone)]
pub struct AppState {
    pub processor: EventProcessor,
    pub writer: StoreAndForward,
    pub project: Arc<ProjectConfig>,
}

pub struct Runtime {
    pub state: AppState,
    pub scheduler: PollingScheduler,
}

impl Runtime {
    pub async fn assemble(
        project: ProjectConfig,
        backends: Backends,
        connector: Arc<dyn RegisterConnector>,
        forward: ForwardConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StartupError> {
        let modbus = ModbusControl::new(&project.connections, &project.devices, connector.clone());
        let vendor = project
            .vendor_control
            .clone()
            .map(VendorHttpControl::new)
            .transpose()?;
        let control: Arc<dyn DeviceControl> = Arc::new(ControlRouter::new(modbus, vendor));

        let writer = StoreAndForward::new(backends.history, backends.queue, forward);
        let alarms = AlarmEngine::build(project.alarms.clone(), Some(writer.clone()), clock.clone());
        let logic = LogicEngine::build(
            project.logic.clone(),
            control.clone(),
            backends.rule_states,
            clock.clone(),
        )?;
        logic.restore().await?;

        let hooks = HookRunner::new(Some(control)).with_rules(&project.hooks);
        let processor = EventProcessor::new(
            TagCache::new(&project.tags),
            alarms,
            BroadcastHub::new(),
        )
        .with_logic(logic)
        .with_persistence(writer.clone())
        .with_hooks(hooks)
        .with_clock(clock.clone());

        let scheduler = PollingScheduler::new(
            &project.connections,
            &project.tags,
            connector,
            Arc::new(processor.clone()),
        )
        .with_clock(clock);

        info!(
            connections = project.connections.len(),
            tags = project.tags.len(),
            alarms = project.alarms.len(),
            logic_rules = project.logic.rules.len(),
            hooks = project.hooks.len(),
            "runtime_assembled"
        );
        Ok(Self {
            state: AppState {
                processor,
                writer,
                project: Arc::new(project),
            },
            scheduler,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use domain::{AlarmStatus, ManualClock};
    use scada_protocol::{SimulatedConnector, SimulatedController};
    use scada_storage::{InMemoryBufferQueue, InMemoryHistoryStore, InMemoryRuleStateStore};

    const PROJECT: &str = r#"{
        "connections": [{"name": "plc1", "host": "127.0.0.1", "poll_interval_ms": 1000}],
        "tags": [{"name": "mixer_ph", "address": 100, "type": "float32", "unit": "pH", "connection_name": "plc1"}],
        "alarms": [{"id": "ph_high", "tag": "mixer_ph", "type": "high", "setpoint": 8.0, "on_delay_secs": 0, "message": "pH high"}],
        "logic": {"rules": [{
            "id": "acid_dosing",
            "condition": {"tag": "mixer_ph", "operator": ">", "threshold": {"source": "literal", "value": 8.5}},
            "actions": [{"device_id": "acid_pump"}]
        }]},
        "devices": [{"device_id": "acid_pump", "connection": "plc1", "address": 300}]
    }"#;

    pub(crate) async fn runtime(controller: &SimulatedController) -> (Runtime, Arc<InMemoryHistoryStore>) {
        let history = Arc::new(InMemoryHistoryStore::new());
        let backends = Backends {
            history: history.clone(),
            queue: Arc::new(InMemoryBufferQueue::new()),
            rule_states: Some(Arc::new(InMemoryRuleStateStore::new())),
        };
        let connector = SimulatedConnector::new().with_controller("plc1", controller.clone());
        let runtime = Runtime::assemble(
            ProjectConfig::from_json(PROJECT).unwrap(),
            backends,
            Arc::new(connector),
            ForwardConfig::default(),
            Arc::new(ManualClock::new(1_000)),
        )
        .await
        .unwrap();
        (runtime, history)
    }

    #[tokio::test]
    async fn polled_value_raises_alarm_and_drives_control() {
        let controller = SimulatedController::new();
        controller.set_float32(100, 9.0);
        let (runtime, history) = runtime(&controller).await;

        let mut pollers = runtime.scheduler.pollers();
        assert_eq!(pollers.len(), 1);
        let report = pollers[0].poll_once().await;
        assert_eq!(report.samples, 1);

        runtime.state.writer.flush().await.unwrap();
        let alarms = runtime.state.processor.alarms().active_alarms();
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].status, AlarmStatus::ActiveUnacked);
        assert_eq!(history.alarms().len(), 1);
        assert_eq!(history.points()[0].value, 9.0);

        // 联动规则把 1.0 写到 acid_pump 的寄存器
        let writes = controller.write_log();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, 300);
        assert_eq!(scada_protocol::decode_float32(&writes[0].1).unwrap(), 1.0);
    }
}
