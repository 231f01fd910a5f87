//! 数据库连接管理
//!
//! - connect_pool：Postgres 连接池（惰性建连，启动时数据库不可用也不会失败）
//! - connect_sqlite：本地缓存队列的 SQLite 连接池

use crate::error::StorageError;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{PgPool, SqlitePool};
use std::time::Duration;

/// 建立 Postgres 连接池（最大连接数 8）。
///
/// 首次查询时才真正建连；获取连接超时 3 秒，超时按写入失败处理。
pub fn connect_pool(database_url: &str) -> Result<PgPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .acquire_timeout(Duration::from_secs(3))
        .connect_lazy(database_url)?;
    Ok(pool)
}

/// 打开（必要时创建）SQLite 文件。单连接，保证写入顺序。
pub async fn connect_sqlite(path: &str) -> Result<SqlitePool, StorageError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}
