//! 内存模拟控制器
//!
//! 用于联调与测试：按连接名提供寄存器表，可注入读失败与掉线。

use crate::client::{RegisterClient, RegisterConnector};
use crate::codec::encode_float32;
use crate::error::ProtocolError;
use async_trait::async_trait;
use domain::Connection;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct SimulatedState {
    registers: HashMap<u16, u16>,
    failing_spans: HashSet<u16>,
    offline: bool,
    reads: Vec<(u16, u16)>,
    writes: Vec<(u16, Vec<u16>)>,
}

/// 模拟控制器（可克隆，克隆体共享寄存器表）。
#[derive(Debug, Clone, Default)]
pub struct SimulatedController {
    state: Arc<RwLock<SimulatedState>>,
}

impl SimulatedController {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SimulatedState) -> R) -> R {
        let mut guard = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    pub fn set_registers(&self, address: u16, words: &[u16]) {
        self.with_state(|state| {
            for (i, word) in words.iter().enumerate() {
                state
                    .registers
                    .insert(address.wrapping_add(i as u16), *word);
            }
        });
    }

    pub fn set_float32(&self, address: u16, value: f32) {
        self.set_registers(address, &encode_float32(value));
    }

    pub fn registers(&self, address: u16, count: u16) -> Vec<u16> {
        self.with_state(|state| {
            (0..count)
                .map(|i| {
                    state
                        .registers
                        .get(&address.wrapping_add(i))
                        .copied()
                        .unwrap_or(0)
                })
                .collect()
        })
    }

    /// 以 `address` 为起点的读取返回异常码。
    pub fn fail_reads_at(&self, address: u16) {
        self.with_state(|state| {
            state.failing_spans.insert(address);
        });
    }

    pub fn clear_failures(&self) {
        self.with_state(|state| state.failing_spans.clear());
    }

    /// 掉线后建连与读写都返回传输错误。
    pub fn set_offline(&self, offline: bool) {
        self.with_state(|state| state.offline = offline);
    }

    pub fn is_offline(&self) -> bool {
        self.with_state(|state| state.offline)
    }

    /// 已执行的读取 (起始地址, 数量)。
    pub fn read_log(&self) -> Vec<(u16, u16)> {
        self.with_state(|state| state.reads.clone())
    }

    pub fn write_log(&self) -> Vec<(u16, Vec<u16>)> {
        self.with_state(|state| state.writes.clone())
    }
}

#[async_trait]
impl RegisterClient for SimulatedController {
    async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, ProtocolError> {
        let outcome = self.with_state(|state| {
            if state.offline {
                return Err(ProtocolError::Transport("controller offline".to_string()));
            }
            state.reads.push((address, count));
            if state.failing_spans.contains(&address) {
                return Err(ProtocolError::Exception("IllegalDataAddress".to_string()));
            }
            Ok(())
        });
        outcome?;
        Ok(self.registers(address, count))
    }

    async fn write_multiple_registers(
        &mut self,
        address: u16,
        words: &[u16],
    ) -> Result<(), ProtocolError> {
        let outcome = self.with_state(|state| {
            if state.offline {
                return Err(ProtocolError::Transport("controller offline".to_string()));
            }
            state.writes.push((address, words.to_vec()));
            Ok(())
        });
        outcome?;
        self.set_registers(address, words);
        Ok(())
    }
}

/// 按连接名分发到模拟控制器。
#[derive(Debug, Clone, Default)]
pub struct SimulatedConnector {
    controllers: HashMap<String, SimulatedController>,
}

impl SimulatedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_controller(mut self, connection: &str, controller: SimulatedController) -> Self {
        self.controllers.insert(connection.to_string(), controller);
        self
    }
}

#[async_trait]
impl RegisterConnector for SimulatedConnector {
    async fn connect(
        &self,
        connection: &Connection,
    ) -> Result<Box<dyn RegisterClient>, ProtocolError> {
        let controller = self.controllers.get(&connection.name).ok_or_else(|| {
            ProtocolError::Transport(format!("no controller at {}", connection.name))
        })?;
        if controller.is_offline() {
            return Err(ProtocolError::Transport(format!(
                "connection refused: {}",
                connection.name
            )));
        }
        Ok(Box::new(controller.clone()))
    }
}
