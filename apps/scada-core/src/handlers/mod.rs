//! Handlers 模块

pub mod alarms;
pub mod buffer;
pub mod health;
pub mod hooks;
pub mod logic;
pub mod realtime;
pub mod ws;

pub use alarms::*;
pub use buffer::*;
pub use health::*;
pub use hooks::*;
pub use logic::*;
pub use realtime::*;
pub use ws::*;
