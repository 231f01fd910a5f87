//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 健康检查返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub status: String,
    pub connections: usize,
    pub tags: usize,
    pub subscribers: usize,
    pub buffered: usize,
}

/// 点位实时值。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeValueDto {
    pub tag: String,
    pub value: f64,
    pub ts_ms: i64,
    pub quality: String,
}

/// 实时值查询参数。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeQuery {
    #[serde(alias = "tag_name")]
    pub tag: Option<String>,
}

/// 报警确认请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckAlarmRequest {
    #[serde(alias = "ack_user", alias = "ackUser")]
    pub user: String,
}

/// 手动补写结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferRetryDto {
    pub replayed: usize,
    pub remaining: usize,
    pub halted: bool,
}

/// 规则集替换结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetUpdatedDto {
    pub rules: usize,
}
