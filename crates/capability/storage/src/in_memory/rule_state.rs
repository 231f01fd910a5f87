//! 规则状态内存实现

use crate::error::StorageError;
use crate::traits::RuleStateStore;
use domain::RuleRuntimeState;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct InMemoryRuleStateStore {
    states: RwLock<HashMap<String, RuleRuntimeState>>,
}

impl InMemoryRuleStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RuleStateStore for InMemoryRuleStateStore {
    async fn save_state(
        &self,
        rule_id: &str,
        state: &RuleRuntimeState,
    ) -> Result<(), StorageError> {
        let mut states = self
            .states
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        states.insert(rule_id.to_string(), *state);
        Ok(())
    }

    async fn load_states(&self) -> Result<HashMap<String, RuleRuntimeState>, StorageError> {
        let states = self
            .states
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(states.clone())
    }
}
