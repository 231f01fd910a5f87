//! SQLite 断网缓存队列
//!
//! 单表自增主键保证回放顺序；payload 为 JSON 序列化的 BufferedOperation。

use crate::error::StorageError;
use crate::models::{BufferedEntry, BufferedOperation};
use crate::traits::BufferQueue;
use domain::now_epoch_ms;
use sqlx::{Row, SqlitePool};

pub struct SqliteBufferQueue {
    pool: SqlitePool,
}

impl SqliteBufferQueue {
    pub async fn new(pool: SqlitePool) -> Result<Self, StorageError> {
        sqlx::query(
            "create table if not exists buffered_operations (\
             id integer primary key autoincrement, \
             payload text not null, \
             created_ms integer not null)",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_sqlite(path).await?;
        Self::new(pool).await
    }
}

#[async_trait::async_trait]
impl BufferQueue for SqliteBufferQueue {
    async fn enqueue(&self, operation: &BufferedOperation) -> Result<i64, StorageError> {
        let payload = serde_json::to_string(operation)?;
        let result =
            sqlx::query("insert into buffered_operations (payload, created_ms) values (?1, ?2)")
                .bind(payload)
                .bind(now_epoch_ms())
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    async fn peek_batch(&self, limit: usize) -> Result<Vec<BufferedEntry>, StorageError> {
        let rows =
            sqlx::query("select id, payload from buffered_operations order by id asc limit ?1")
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(|row| {
                let id: i64 = row.try_get("id")?;
                let payload: String = row.try_get("payload")?;
                let operation: BufferedOperation = serde_json::from_str(&payload)?;
                Ok::<_, StorageError>(BufferedEntry { id, operation })
            })
            .collect()
    }

    async fn remove(&self, id: i64) -> Result<(), StorageError> {
        sqlx::query("delete from buffered_operations where id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn len(&self) -> Result<usize, StorageError> {
        let count: i64 = sqlx::query_scalar("select count(*) from buffered_operations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }
}
