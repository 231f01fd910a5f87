//! 报警查询与确认
//!
//! - GET /api/alarms
//! - POST /api/alarms/:rule_id/ack

use crate::AppState;
use crate::utils::response::{
    bad_request_error, conflict_error, internal_error, not_found_error, ok,
};
use api_contract::AckAlarmRequest;
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use scada_alarm::AlarmError;

pub async fn list_alarms(State(state): State<AppState>) -> Response {
    ok(state.processor.alarms().active_alarms())
}

pub async fn ack_alarm(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
    Json(req): Json<AckAlarmRequest>,
) -> Response {
    let user = req.user.trim();
    if user.is_empty() {
        return bad_request_error("user is required");
    }
    match state.processor.alarms().acknowledge(&rule_id, user) {
        Ok(alarm) => {
            // 确认改变了报警列表，推送一次完整状态
            state.processor.broadcast_update();
            ok(alarm)
        }
        Err(AlarmError::UnknownRule(id)) => not_found_error(format!("unknown alarm rule {id}")),
        Err(err @ (AlarmError::NotActive(_) | AlarmError::AlreadyAcknowledged(_))) => {
            conflict_error(err.to_string())
        }
        Err(err) => internal_error(err),
    }
}
