//! # SCADA Storage 模块
//!
//! 持久化抽象与断网缓存。
//!
//! ## 架构设计
//!
//! 1. **接口抽象层** (`traits.rs`)：HistoryStore / BufferQueue / RuleStateStore
//! 2. **数据模型层** (`models.rs`)：报警记录、缓存操作
//! 3. **错误处理层** (`error.rs`)：统一的存储错误类型
//! 4. **连接管理层** (`connection.rs`)：Postgres / SQLite 连接池
//! 5. **断网缓存** (`forward.rs`)：单个写入任务先写主存储，失败进本地队列，后台按序补写
//! 6. **实现层**：
//!    - `in_memory/`：内存实现（测试与无数据库运行）
//!    - `postgres/`：历史数据主存储
//!    - `sqlite.rs`：本地持久队列
//!    - `redis.rs`：规则运行状态
//!
//! ## 顺序保证
//!
//! - 队列按自增 id 回放，补写遇到第一个失败立即停止
//! - 写入经有界通道按提交顺序处理；队列非空时新写入直接入队，不会越过积压
//! - 报警 ID 由调用方生成，开始/结束记录在补写前后保持一致
//!
//! ```rust,ignore
//! use scada_storage::{ForwardConfig, PgHistoryStore, SqliteBufferQueue, StoreAndForward};
//!
//! let store = Arc::new(PgHistoryStore::connect(&database_url)?);
//! let queue = Arc::new(SqliteBufferQueue::open("scada_buffer.db").await?);
//! let writer = StoreAndForward::new(store, queue, ForwardConfig::default());
//! writer.save_point("mixer_ph", 7.2, now_ms).await?;
//! let drain = writer.spawn_drain_loop(cancel.child_token());
//! ```

pub mod connection;
pub mod error;
pub mod forward;
pub mod in_memory;
pub mod models;
pub mod postgres;
pub mod redis;
pub mod sqlite;
pub mod traits;

pub use connection::*;
pub use error::*;
pub use forward::{BufferError, DrainReport, ForwardConfig, StoreAndForward};
pub use models::*;
pub use redis::{RULE_STATE_KEY, RedisRuleStateStore};
pub use sqlite::SqliteBufferQueue;
pub use traits::*;

pub use in_memory::{
    InMemoryBufferQueue, InMemoryHistoryStore, InMemoryRuleStateStore, StoredAlarm, StoredPoint,
};
pub use postgres::PgHistoryStore;
