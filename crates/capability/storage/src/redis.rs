//! Redis 规则状态存储
//!
//! 哈希 `scada:logic:states`，field 为规则 ID，value 为 JSON。

use crate::error::StorageError;
use crate::traits::RuleStateStore;
use domain::RuleRuntimeState;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::warn;

pub const RULE_STATE_KEY: &str = "scada:logic:states";

pub struct RedisRuleStateStore {
    client: redis::Client,
}

impl RedisRuleStateStore {
    pub fn connect(redis_url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl RuleStateStore for RedisRuleStateStore {
    async fn save_state(
        &self,
        rule_id: &str,
        state: &RuleRuntimeState,
    ) -> Result<(), StorageError> {
        let payload = serde_json::to_string(state)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.hset(RULE_STATE_KEY, rule_id, payload).await?;
        Ok(())
    }

    async fn load_states(&self) -> Result<HashMap<String, RuleRuntimeState>, StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: HashMap<String, String> = conn.hgetall(RULE_STATE_KEY).await?;
        let mut states = HashMap::with_capacity(raw.len());
        for (rule_id, payload) in raw {
            match serde_json::from_str::<RuleRuntimeState>(&payload) {
                Ok(state) => {
                    states.insert(rule_id, state);
                }
                Err(err) => {
                    warn!(
                        target: "scada.logic",
                        rule_id = %rule_id,
                        error = %err,
                        "rule_state_decode_failed"
                    );
                }
            }
        }
        Ok(states)
    }
}
