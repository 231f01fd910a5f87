//! # 实时推送
//!
//! 服务端只推送四类 JSON 事件：`data`、`alarm_start`、`alarm_end`、`update`。
//! 订阅者各自持有一个有界队列，投递失败（断开或积压满）的订阅者被移除，
//! 不影响其他订阅者。

mod event;
mod hub;

pub use event::{RealtimeEvent, RenderedState};
pub use hub::{BroadcastHub, DEFAULT_SUBSCRIBER_CAPACITY, Subscription};
