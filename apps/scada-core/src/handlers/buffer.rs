//! 断网缓存手动补写
//!
//! - POST /api/buffer/retry

use crate::AppState;
use crate::utils::response::{internal_error, ok};
use api_contract::BufferRetryDto;
use axum::{extract::State, response::Response};

pub async fn retry_buffer(State(state): State<AppState>) -> Response {
    match state.writer.retry_now().await {
        Ok(report) => ok(BufferRetryDto {
            replayed: report.replayed,
            remaining: report.remaining,
            halted: report.halted,
        }),
        Err(err) => internal_error(err),
    }
}
