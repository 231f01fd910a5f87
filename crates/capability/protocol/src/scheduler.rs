//! 多连接轮询调度
//!
//! 每个连接一个独立任务：建连 → 分段读取 → 逐点解码 → 交给处理器 → 休眠。
//! 连接之间互不等待；单个周期内的失败只记录日志，不会终止任务。

use crate::client::{RegisterClient, RegisterConnector};
use crate::codec::{FLOAT32_WORDS, decode_float32};
use crate::error::ProtocolError;
use crate::grouping::{RegisterSpan, group_registers};
use async_trait::async_trait;
use domain::{Clock, Connection, SystemClock, Tag, TagSample};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 轮询事件处理器
#[async_trait]
pub trait PollEventHandler: Send + Sync {
    /// 解码成功的点位样本。
    async fn handle_sample(&self, sample: TagSample);

    /// 本周期未能读到的点位（读段失败、解码失败或连接失败）。
    async fn handle_unreadable(&self, connection: &str, tag_names: &[String], error: &ProtocolError);

    /// 一个连接的周期结束。
    async fn cycle_complete(&self, connection: &str);
}

/// 单个周期的执行结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub connected: bool,
    pub spans_read: usize,
    pub spans_failed: usize,
    pub samples: usize,
    pub decode_failures: usize,
}

/// 单连接的采集计划。
#[derive(Debug, Clone)]
pub struct ConnectionPlan {
    pub connection: Connection,
    pub spans: Vec<RegisterSpan>,
}

impl ConnectionPlan {
    /// 过滤出属于该连接且启用的点位并分组。
    pub fn build(connection: Connection, tags: &[Tag]) -> Self {
        let spans = group_registers(
            tags.iter()
                .filter(|tag| tag.enabled && tag.connection_name == connection.name),
        );
        Self { connection, spans }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.connection.poll_interval_ms.max(1))
    }
}

/// 单连接轮询器，持有可复用的寄存器通道。
pub struct ConnectionPoller {
    plan: ConnectionPlan,
    connector: Arc<dyn RegisterConnector>,
    handler: Arc<dyn PollEventHandler>,
    clock: Arc<dyn Clock>,
    client: Option<Box<dyn RegisterClient>>,
}

impl ConnectionPoller {
    pub fn new(
        plan: ConnectionPlan,
        connector: Arc<dyn RegisterConnector>,
        handler: Arc<dyn PollEventHandler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            plan,
            connector,
            handler,
            clock,
            client: None,
        }
    }

    pub fn plan(&self) -> &ConnectionPlan {
        &self.plan
    }

    /// 执行一个完整周期。传输错误会丢弃当前通道，剩余读段记为不可读。
    pub async fn poll_once(&mut self) -> CycleReport {
        let name = self.plan.connection.name.clone();
        let mut report = CycleReport::default();

        if self.plan.spans.is_empty() {
            self.handler.cycle_complete(&name).await;
            return report;
        }

        if self.client.is_none() {
            match self.connector.connect(&self.plan.connection).await {
                Ok(client) => self.client = Some(client),
                Err(err) => {
                    scada_telemetry::record_connection_failure();
                    warn!(
                        target: "scada.poll",
                        connection = %name,
                        host = %self.plan.connection.host,
                        port = self.plan.connection.port,
                        error = %err,
                        "connection_failed"
                    );
                    let all: Vec<String> =
                        self.plan.spans.iter().flat_map(|s| s.tag_names()).collect();
                    self.handler.handle_unreadable(&name, &all, &err).await;
                    report.spans_failed = self.plan.spans.len();
                    self.handler.cycle_complete(&name).await;
                    return report;
                }
            }
        }
        report.connected = true;

        let mut transport_error: Option<ProtocolError> = None;
        for span in &self.plan.spans {
            if let Some(err) = &transport_error {
                report.spans_failed += 1;
                self.handler
                    .handle_unreadable(&name, &span.tag_names(), err)
                    .await;
                continue;
            }
            let Some(client) = self.client.as_mut() else {
                break;
            };

            let words = match client.read_holding_registers(span.start, span.count).await {
                Ok(words) => words,
                Err(err) => {
                    report.spans_failed += 1;
                    scada_telemetry::record_span_read_failure();
                    warn!(
                        target: "scada.poll",
                        connection = %name,
                        start = span.start,
                        count = span.count,
                        error = %err,
                        "span_read_failed"
                    );
                    self.handler
                        .handle_unreadable(&name, &span.tag_names(), &err)
                        .await;
                    if err.is_transport() {
                        self.client = None;
                        transport_error = Some(err);
                    }
                    continue;
                }
            };
            report.spans_read += 1;
            let ts_ms = self.clock.now_ms();

            for tag in &span.tags {
                let offset = span.offset_of(tag);
                let end = (offset + FLOAT32_WORDS).min(words.len());
                let window = words.get(offset..end).unwrap_or(&[]);
                match decode_float32(window) {
                    Ok(value) => {
                        report.samples += 1;
                        self.handler
                            .handle_sample(TagSample {
                                tag_name: tag.name.clone(),
                                value: f64::from(value),
                                ts_ms,
                            })
                            .await;
                    }
                    Err(err) => {
                        report.decode_failures += 1;
                        scada_telemetry::record_decode_failure();
                        warn!(
                            target: "scada.poll",
                            connection = %name,
                            tag = %tag.name,
                            address = tag.address,
                            error = %err,
                            "tag_decode_failed"
                        );
                        self.handler
                            .handle_unreadable(&name, std::slice::from_ref(&tag.name), &err)
                            .await;
                    }
                }
            }
        }

        scada_telemetry::record_poll_cycle();
        debug!(
            target: "scada.poll",
            connection = %name,
            spans_read = report.spans_read,
            spans_failed = report.spans_failed,
            samples = report.samples,
            "poll_cycle_complete"
        );
        self.handler.cycle_complete(&name).await;
        report
    }

    /// 周期运行直到取消；取消只在周期之间生效。
    pub async fn run(mut self, cancel: CancellationToken) {
        let interval = self.plan.poll_interval();
        info!(
            target: "scada.poll",
            connection = %self.plan.connection.name,
            spans = self.plan.spans.len(),
            interval_ms = interval.as_millis() as u64,
            "poller_started"
        );
        loop {
            if cancel.is_cancelled() {
                break;
            }
            self.poll_once().await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!(
            target: "scada.poll",
            connection = %self.plan.connection.name,
            "poller_stopped"
        );
    }
}

/// 轮询调度器：为每个连接启动一个独立任务。
pub struct PollingScheduler {
    plans: Vec<ConnectionPlan>,
    connector: Arc<dyn RegisterConnector>,
    handler: Arc<dyn PollEventHandler>,
    clock: Arc<dyn Clock>,
}

impl PollingScheduler {
    pub fn new(
        connections: &[Connection],
        tags: &[Tag],
        connector: Arc<dyn RegisterConnector>,
        handler: Arc<dyn PollEventHandler>,
    ) -> Self {
        let plans = connections
            .iter()
            .cloned()
            .map(|connection| ConnectionPlan::build(connection, tags))
            .collect();
        Self {
            plans,
            connector,
            handler,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn plans(&self) -> &[ConnectionPlan] {
        &self.plans
    }

    pub fn pollers(&self) -> Vec<ConnectionPoller> {
        self.plans
            .iter()
            .cloned()
            .map(|plan| {
                ConnectionPoller::new(
                    plan,
                    self.connector.clone(),
                    self.handler.clone(),
                    self.clock.clone(),
                )
            })
            .collect()
    }

    pub fn spawn(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        self.pollers()
            .into_iter()
            .map(|poller| tokio::spawn(poller.run(cancel.child_token())))
            .collect()
    }
}
