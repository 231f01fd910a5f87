//! 联动规则集
//!
//! - GET /api/logic/rules
//! - PUT /api/logic/rules（整体替换）

use crate::AppState;
use crate::utils::response::{bad_request_error, internal_error, not_found_error, ok};
use api_contract::RuleSetUpdatedDto;
use axum::{Json, extract::State, response::Response};
use domain::LogicRuleSet;
use scada_logic::LogicError;

pub async fn get_logic_rules(State(state): State<AppState>) -> Response {
    let Some(logic) = state.processor.logic() else {
        return not_found_error("logic engine not configured");
    };
    match logic.rules() {
        Ok(rules) => ok(&*rules),
        Err(err) => internal_error(err),
    }
}

pub async fn replace_logic_rules(
    State(state): State<AppState>,
    Json(rules): Json<LogicRuleSet>,
) -> Response {
    let Some(logic) = state.processor.logic() else {
        return not_found_error("logic engine not configured");
    };
    let count = rules.rules.len();
    match logic.replace_rules(rules) {
        Ok(()) => ok(RuleSetUpdatedDto { rules: count }),
        Err(err @ LogicError::InvalidRule { .. }) => bad_request_error(err.to_string()),
        Err(err) => internal_error(err),
    }
}
