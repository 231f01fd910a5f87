//! # 协议通信能力模块
//!
//! - **RegisterCodec**：float32 ⇄ 两个 16 位寄存器字
//! - **寄存器分组**：把点位合并成最少的批量读取段
//! - **PollingScheduler**：每个连接独立周期轮询
//! - **Modbus TCP**：基于 tokio-modbus 的读写通道
//! - **模拟控制器**：内存寄存器表，用于联调与测试
//!
//! ```text
//! Connection + Tag 配置
//!       │
//!       ▼
//! group_registers → ConnectionPlan
//!       │
//!       ▼
//! ConnectionPoller ── RegisterConnector ──► ModbusTcpClient / SimulatedController
//!       │
//!       ▼
//! decode_float32 → PollEventHandler (pipeline)
//! ```

mod client;
mod codec;
mod error;
mod grouping;
mod modbus_tcp;
mod scheduler;
mod simulated;

pub use client::{RegisterClient, RegisterConnector};
pub use codec::{FLOAT32_WORDS, decode_float32, encode_float32};
pub use error::ProtocolError;
pub use grouping::{MAX_GAP, MAX_SPAN_LEN, RegisterSpan, SpanTag, group_registers};
pub use modbus_tcp::{ModbusTcpClient, ModbusTcpConnector, ModbusTcpSettings};
pub use scheduler::{
    ConnectionPlan, ConnectionPoller, CycleReport, PollEventHandler, PollingScheduler,
};
pub use simulated::{SimulatedConnector, SimulatedController};
