//! 外部自动化钩子
//!
//! 每次样本处理后把完整快照交给全部钩子。钩子在独立任务中执行，
//! 失败（含 panic）只记录日志，不影响采集链路。

use crate::cache::TagSnapshot;
use async_trait::async_trait;
use domain::{HookAction, HookRule, Severity};
use scada_control::DeviceControl;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    #[error("hook {hook} failed: {reason}")]
    Failed { hook: String, reason: String },
}

/// 钩子能力：读快照，产出动作。
#[async_trait]
pub trait AutomationHook: Send + Sync {
    fn name(&self) -> &str;

    async fn on_update(&self, snapshot: &TagSnapshot) -> Result<Vec<HookAction>, HookError>;
}

/// 声明式钩子（边沿触发）。
pub struct RuleHook {
    rule: HookRule,
    armed: Mutex<bool>,
}

impl RuleHook {
    pub fn new(rule: HookRule) -> Self {
        Self {
            rule,
            armed: Mutex::new(false),
        }
    }
}

#[async_trait]
impl AutomationHook for RuleHook {
    fn name(&self) -> &str {
        &self.rule.name
    }

    async fn on_update(&self, snapshot: &TagSnapshot) -> Result<Vec<HookAction>, HookError> {
        if !self.rule.enabled {
            return Ok(Vec::new());
        }
        let Some(current) = snapshot.get(&self.rule.tag) else {
            return Ok(Vec::new());
        };
        let holds = self.rule.operator.holds(current.value, self.rule.threshold);
        let mut armed = self.armed.lock().map_err(|_| HookError::Failed {
            hook: self.rule.name.clone(),
            reason: "state lock poisoned".to_string(),
        })?;
        let fired = holds && !*armed;
        *armed = holds;
        if fired {
            Ok(vec![self.rule.action.clone()])
        } else {
            Ok(Vec::new())
        }
    }
}

/// 钩子调度与动作解释。
#[derive(Clone, Default)]
pub struct HookRunner {
    hooks: Vec<Arc<dyn AutomationHook>>,
    control: Option<Arc<dyn DeviceControl>>,
}

impl HookRunner {
    pub fn new(control: Option<Arc<dyn DeviceControl>>) -> Self {
        Self {
            hooks: Vec::new(),
            control,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn AutomationHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_rules(mut self, rules: &[HookRule]) -> Self {
        for rule in rules {
            self.hooks.push(Arc::new(RuleHook::new(rule.clone())));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// 为每个钩子启动一个任务（不等待结果）。
    pub fn dispatch(&self, snapshot: Arc<TagSnapshot>) -> Vec<JoinHandle<()>> {
        self.hooks
            .iter()
            .map(|hook| {
                let hook = Arc::clone(hook);
                let snapshot = Arc::clone(&snapshot);
                let control = self.control.clone();
                tokio::spawn(async move {
                    match hook.on_update(&snapshot).await {
                        Ok(actions) => {
                            for action in actions {
                                apply_action(hook.name(), control.as_deref(), action).await;
                            }
                        }
                        Err(err) => {
                            scada_telemetry::record_hook_failure();
                            warn!(target: "scada.hooks", hook = hook.name(), error = %err, "hook_failed");
                        }
                    }
                })
            })
            .collect()
    }
}

async fn apply_action(hook: &str, control: Option<&dyn DeviceControl>, action: HookAction) {
    match action {
        HookAction::SetDeviceValue {
            device_id,
            command,
            parameter,
            value,
        } => {
            let Some(control) = control else {
                warn!(target: "scada.hooks", hook, device_id = %device_id, "hook_action_unroutable");
                return;
            };
            let parameter = parameter.as_deref().unwrap_or("value");
            match control
                .send_control_command(&device_id, &command, parameter, value)
                .await
            {
                Ok(_) => {
                    info!(target: "scada.hooks", hook, device_id = %device_id, value, "hook_device_value_set");
                }
                Err(err) => {
                    scada_telemetry::record_hook_failure();
                    warn!(target: "scada.hooks", hook, device_id = %device_id, error = %err, "hook_action_failed");
                }
            }
        }
        HookAction::Notify { message, severity } => match severity {
            Severity::Critical | Severity::Warning => {
                warn!(target: "scada.hooks", hook, severity = ?severity, message = %message, "hook_notify");
            }
            Severity::Info => {
                info!(target: "scada.hooks", hook, message = %message, "hook_notify");
            }
        },
        HookAction::NoOp => {}
    }
}
