//! 健康检查与计数器快照
//!
//! - GET /health
//! - GET /metrics

use crate::AppState;
use crate::utils::response::ok;
use api_contract::HealthDto;
use axum::{extract::State, response::Response};
use scada_telemetry::metrics;

pub async fn health(State(state): State<AppState>) -> Response {
    // 缓存队列不可读时不影响健康检查本身
    let buffered = state.writer.pending().await.unwrap_or_default();
    ok(HealthDto {
        status: "ok".to_string(),
        connections: state.project.connections.len(),
        tags: state.processor.cache().len(),
        subscribers: state.processor.hub().subscriber_count(),
        buffered,
    })
}

pub async fn get_metrics() -> Response {
    ok(metrics().snapshot())
}
