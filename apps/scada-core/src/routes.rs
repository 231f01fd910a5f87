//! 路由定义
//!
//! - 健康检查：/health, /metrics
//! - 实时订阅：/ws
//! - 实时值与报警：/api/realtime, /api/alarms/*
//! - 外部推送：/api/hooks/:source/*
//! - 运维：/api/buffer/retry, /api/logic/rules

use super::AppState;
use super::handlers::*;
use crate::middleware::request_context;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// 创建 API 路由
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/ws", get(ws_handler))
        .route("/api/realtime", get(get_realtime))
        .route("/api/alarms", get(list_alarms))
        .route("/api/alarms/:rule_id/ack", post(ack_alarm))
        .route("/api/hooks/:source/update", post(push_update))
        .route("/api/hooks/:source/batch", post(push_batch))
        .route("/api/buffer/retry", post(retry_buffer))
        .route(
            "/api/logic/rules",
            get(get_logic_rules).put(replace_logic_rules),
        )
}

/// 挂载状态与中间件
pub fn build_app(state: AppState) -> Router {
    create_api_router().with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            // 注入 request_id/trace_id
            .layer(middleware::from_fn(request_context)),
    )
}
