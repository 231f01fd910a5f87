//! PostgreSQL 存储实现

mod history;

pub use history::PgHistoryStore;
