//! 内存存储实现
//!
//! 用于本地测试与无数据库运行；数据只在进程生命周期内有效。

mod buffer;
mod history;
mod rule_state;

pub use buffer::InMemoryBufferQueue;
pub use history::{InMemoryHistoryStore, StoredAlarm, StoredPoint};
pub use rule_state::InMemoryRuleStateStore;
