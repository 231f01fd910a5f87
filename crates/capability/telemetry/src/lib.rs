//! 追踪初始化、请求 ID 生成与进程级计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub poll_cycles: u64,
    pub connection_failures: u64,
    pub span_read_failures: u64,
    pub decode_failures: u64,
    pub changed_values: u64,
    pub buffered_operations: u64,
    pub replayed_operations: u64,
    pub alarms_raised: u64,
    pub alarms_cleared: u64,
    pub logic_starts: u64,
    pub logic_stops: u64,
    pub logic_deferrals: u64,
    pub hook_failures: u64,
    pub control_failures: u64,
}

/// 进程级计数器。
#[derive(Default)]
pub struct TelemetryMetrics {
    poll_cycles: AtomicU64,
    connection_failures: AtomicU64,
    span_read_failures: AtomicU64,
    decode_failures: AtomicU64,
    changed_values: AtomicU64,
    buffered_operations: AtomicU64,
    replayed_operations: AtomicU64,
    alarms_raised: AtomicU64,
    alarms_cleared: AtomicU64,
    logic_starts: AtomicU64,
    logic_stops: AtomicU64,
    logic_deferrals: AtomicU64,
    hook_failures: AtomicU64,
    control_failures: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            poll_cycles: self.poll_cycles.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
            span_read_failures: self.span_read_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            changed_values: self.changed_values.load(Ordering::Relaxed),
            buffered_operations: self.buffered_operations.load(Ordering::Relaxed),
            replayed_operations: self.replayed_operations.load(Ordering::Relaxed),
            alarms_raised: self.alarms_raised.load(Ordering::Relaxed),
            alarms_cleared: self.alarms_cleared.load(Ordering::Relaxed),
            logic_starts: self.logic_starts.load(Ordering::Relaxed),
            logic_stops: self.logic_stops.load(Ordering::Relaxed),
            logic_deferrals: self.logic_deferrals.load(Ordering::Relaxed),
            hook_failures: self.hook_failures.load(Ordering::Relaxed),
            control_failures: self.control_failures.load(Ordering::Relaxed),
        }
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录一次完整的连接轮询周期。
pub fn record_poll_cycle() {
    metrics().poll_cycles.fetch_add(1, Ordering::Relaxed);
}

/// 记录连接建立失败。
pub fn record_connection_failure() {
    metrics().connection_failures.fetch_add(1, Ordering::Relaxed);
}

pub fn record_span_read_failure() {
    metrics().span_read_failures.fetch_add(1, Ordering::Relaxed);
}

pub fn record_decode_failure() {
    metrics().decode_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录通过死区判断的变化值。
pub fn record_changed_value() {
    metrics().changed_values.fetch_add(1, Ordering::Relaxed);
}

/// 记录进入断网缓存的操作数。
pub fn record_buffered_operation() {
    metrics()
        .buffered_operations
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录补写成功的操作数。
pub fn record_replayed_operations(count: u64) {
    metrics()
        .replayed_operations
        .fetch_add(count, Ordering::Relaxed);
}

pub fn record_alarm_raised() {
    metrics().alarms_raised.fetch_add(1, Ordering::Relaxed);
}

pub fn record_alarm_cleared() {
    metrics().alarms_cleared.fetch_add(1, Ordering::Relaxed);
}

pub fn record_logic_start() {
    metrics().logic_starts.fetch_add(1, Ordering::Relaxed);
}

pub fn record_logic_stop() {
    metrics().logic_stops.fetch_add(1, Ordering::Relaxed);
}

/// 记录因最小运行时间而推迟的停止。
pub fn record_logic_deferral() {
    metrics().logic_deferrals.fetch_add(1, Ordering::Relaxed);
}

pub fn record_hook_failure() {
    metrics().hook_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录控制下发失败次数。
pub fn record_control_failure() {
    metrics().control_failures.fetch_add(1, Ordering::Relaxed);
}
