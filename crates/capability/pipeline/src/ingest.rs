//! 外部推送接入
//!
//! `{deviceId, data: {key: value}, timestamp?}`，每个 key 写入点位 `{deviceId}_{key}`。
//! 非数值字段逐个拒绝，不影响同一载荷的其他字段。

use crate::processor::EventProcessor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid push payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    #[serde(alias = "device_id")]
    pub device_id: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    /// epoch 毫秒；缺省取接收时间。
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRejection {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub device_id: String,
    pub processed: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<FieldRejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn tag_name_for(device_id: &str, key: &str) -> String {
    format!("{device_id}_{key}")
}

/// 数值或数值字符串；其余拒绝。
fn numeric_value(value: &Value) -> Result<f64, &'static str> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        Some(_) => Err("non-finite value"),
        None => Err("not a numeric value"),
    }
}

impl EventProcessor {
    pub async fn ingest(&self, payload: &PushPayload) -> Result<PushReport, PipelineError> {
        let device_id = payload.device_id.trim();
        if device_id.is_empty() {
            return Err(PipelineError::InvalidPayload("deviceId is required".to_string()));
        }

        let mut report = PushReport {
            device_id: device_id.to_string(),
            processed: 0,
            total: payload.data.len(),
            rejected: Vec::new(),
            error: None,
        };
        for (key, raw) in &payload.data {
            match numeric_value(raw) {
                Ok(value) => {
                    let tag = tag_name_for(device_id, key);
                    match payload.timestamp {
                        Some(ts_ms) => self.process_value_at(&tag, value, ts_ms).await,
                        None => self.process_value(&tag, value).await,
                    };
                    report.processed += 1;
                }
                Err(reason) => {
                    debug!(target: "scada.pipeline", device_id, key = %key, reason, "push_field_rejected");
                    report.rejected.push(FieldRejection {
                        key: key.clone(),
                        reason: reason.to_string(),
                    });
                }
            }
        }
        info!(
            target: "scada.pipeline",
            device_id,
            processed = report.processed,
            total = report.total,
            "push_ingested"
        );
        Ok(report)
    }

    /// 批量推送：每个载荷独立处理并各自报告。
    pub async fn ingest_batch(&self, payloads: &[PushPayload]) -> Vec<PushReport> {
        let mut reports = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let report = match self.ingest(payload).await {
                Ok(report) => report,
                Err(err) => PushReport {
                    device_id: payload.device_id.clone(),
                    processed: 0,
                    total: payload.data.len(),
                    rejected: Vec::new(),
                    error: Some(err.to_string()),
                },
            };
            reports.push(report);
        }
        reports
    }
}
