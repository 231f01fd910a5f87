//! # 点位缓存与事件分发
//!
//! ```text
//! PollingScheduler / 外部推送
//!         │
//!         ▼
//!   EventProcessor ──► TagCache（死区判定、质量）
//!         │  changed ──► StoreAndForward + data 事件
//!         ├──► AlarmEngine ─┐ 并行
//!         ├──► LogicEngine ─┘
//!         └──► HookRunner（独立任务）
//! ```

mod cache;
mod hooks;
mod ingest;
mod processor;

pub use cache::{CacheUpdate, TagCache, TagSnapshot};
pub use hooks::{AutomationHook, HookError, HookRunner, RuleHook};
pub use ingest::{FieldRejection, PipelineError, PushPayload, PushReport, tag_name_for};
pub use processor::{EventProcessor, ProcessOutcome};
