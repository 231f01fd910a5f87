//! Postgres 历史数据写入实现

use crate::error::StorageError;
use crate::models::AlarmStartRecord;
use crate::traits::HistoryStore;
use domain::Severity;
use sqlx::PgPool;

pub struct PgHistoryStore {
    pub pool: PgPool,
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "critical",
        Severity::Warning => "warning",
        Severity::Info => "info",
    }
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url)?;
        Ok(Self { pool })
    }

    /// 建表（幂等）。
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            "create table if not exists tag_history (\
             id bigserial primary key, \
             tag_name text not null, \
             value double precision not null, \
             ts timestamptz not null)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "create index if not exists tag_history_tag_ts on tag_history (tag_name, ts desc)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "create table if not exists alarm_history (\
             alarm_id text primary key, \
             rule_id text not null, \
             tag_name text not null, \
             severity text not null, \
             message text not null, \
             start_ts timestamptz not null, \
             start_value double precision not null, \
             end_ts timestamptz, \
             end_value double precision)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl HistoryStore for PgHistoryStore {
    async fn save_point(&self, tag: &str, value: f64, ts_ms: i64) -> Result<(), StorageError> {
        sqlx::query(
            "insert into tag_history (tag_name, value, ts) \
             values ($1, $2, to_timestamp($3 / 1000.0))",
        )
        .bind(tag)
        .bind(value)
        .bind(ts_ms as f64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_alarm_start(&self, record: &AlarmStartRecord) -> Result<String, StorageError> {
        sqlx::query(
            "insert into alarm_history \
             (alarm_id, rule_id, tag_name, severity, message, start_ts, start_value) \
             values ($1, $2, $3, $4, $5, to_timestamp($6 / 1000.0), $7) \
             on conflict (alarm_id) do nothing",
        )
        .bind(&record.alarm_id)
        .bind(&record.rule_id)
        .bind(&record.tag)
        .bind(severity_label(record.severity))
        .bind(&record.message)
        .bind(record.start_ms as f64)
        .bind(record.start_value)
        .execute(&self.pool)
        .await?;
        Ok(record.alarm_id.clone())
    }

    async fn update_alarm_end(
        &self,
        alarm_id: &str,
        end_ms: i64,
        end_value: f64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "update alarm_history set end_ts = to_timestamp($2 / 1000.0), end_value = $3 \
             where alarm_id = $1",
        )
        .bind(alarm_id)
        .bind(end_ms as f64)
        .bind(end_value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
