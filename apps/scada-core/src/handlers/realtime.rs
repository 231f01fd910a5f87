//! 实时值查询
//!
//! - GET /api/realtime?tag=

use crate::AppState;
use crate::utils::normalize_optional;
use crate::utils::response::{not_found_error, ok};
use api_contract::{RealtimeQuery, RealtimeValueDto};
use axum::{
    extract::{Query, State},
    response::Response,
};
use domain::RuntimeValue;

fn to_dto(tag: String, value: RuntimeValue) -> RealtimeValueDto {
    RealtimeValueDto {
        tag,
        value: value.value,
        ts_ms: value.ts_ms,
        quality: value.quality.as_str().to_string(),
    }
}

pub async fn get_realtime(
    State(state): State<AppState>,
    Query(query): Query<RealtimeQuery>,
) -> Response {
    let cache = state.processor.cache();
    match normalize_optional(query.tag) {
        Some(tag) => match cache.get(&tag) {
            Some(value) => ok(vec![to_dto(tag, value)]),
            None => not_found_error(format!("no value for tag {tag}")),
        },
        None => {
            let data: Vec<RealtimeValueDto> = cache
                .snapshot()
                .into_iter()
                .map(|(tag, value)| to_dto(tag, value))
                .collect();
            ok(data)
        }
    }
}
