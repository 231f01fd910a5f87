//! 外部推送接入
//!
//! - POST /api/hooks/:source/update
//! - POST /api/hooks/:source/batch

use crate::AppState;
use crate::utils::response::{bad_request_error, ok};
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use scada_pipeline::{PipelineError, PushPayload};
use tracing::info;

pub async fn push_update(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Json(payload): Json<PushPayload>,
) -> Response {
    info!(target: "scada.pipeline", source = %source, device_id = %payload.device_id, "push_received");
    match state.processor.ingest(&payload).await {
        Ok(report) => ok(report),
        Err(PipelineError::InvalidPayload(message)) => bad_request_error(message),
    }
}

pub async fn push_batch(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Json(payloads): Json<Vec<PushPayload>>,
) -> Response {
    info!(target: "scada.pipeline", source = %source, payloads = payloads.len(), "push_batch_received");
    ok(state.processor.ingest_batch(&payloads).await)
}
