//! 断网缓存（store-and-forward）
//!
//! 持久化意图经有界通道交给单个写入任务，调用方不等待存储 I/O。
//! 写入任务在队列为空时直写主存储，失败或队列非空时按序追加到本地队列；
//! 后台周期从队头批量补写，遇到第一个失败立即停止本批次，
//! 失败项及其后续保持原顺序留待下次。补写进行中写入任务照常追加。

use crate::error::StorageError;
use crate::models::{AlarmStartRecord, BufferedEntry, BufferedOperation};
use crate::traits::{BufferQueue, HistoryStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 缓存层错误。
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    /// 本地队列不可用（操作无法落盘）。
    #[error("buffer queue error: {0}")]
    Queue(StorageError),
    /// 补写失败，本批次在该条目处停止。
    #[error("replay halted at entry {id} ({kind}): {source}")]
    Replay {
        id: i64,
        kind: &'static str,
        source: StorageError,
    },
    /// 写入任务已退出。
    #[error("persistence writer closed")]
    Closed,
}

/// 单次补写结果。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DrainReport {
    pub replayed: usize,
    pub remaining: usize,
    pub halted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ForwardConfig {
    pub drain_interval: Duration,
    pub batch_size: usize,
    /// 写入通道容量，满时提交方等待。
    pub channel_capacity: usize,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            drain_interval: Duration::from_millis(5000),
            batch_size: 100,
            channel_capacity: 1024,
        }
    }
}

enum WriterCommand {
    Write(BufferedOperation),
    Flush(oneshot::Sender<()>),
}

struct ForwardInner {
    store: Arc<dyn HistoryStore>,
    queue: Arc<dyn BufferQueue>,
    config: ForwardConfig,
    commands: mpsc::Sender<WriterCommand>,
    /// 只串行化补写批次，写入任务不取此锁。
    drain: Mutex<()>,
}

/// 持久化入口：先写主存储，失败进队列。
#[derive(Clone)]
pub struct StoreAndForward {
    inner: Arc<ForwardInner>,
}

impl StoreAndForward {
    /// 创建并启动写入任务；须在 tokio 运行时内调用。
    /// 所有克隆释放后写入任务处理完剩余命令即退出。
    pub fn new(
        store: Arc<dyn HistoryStore>,
        queue: Arc<dyn BufferQueue>,
        config: ForwardConfig,
    ) -> Self {
        let config = ForwardConfig {
            batch_size: config.batch_size.max(1),
            channel_capacity: config.channel_capacity.max(1),
            ..config
        };
        let (commands, rx) = mpsc::channel(config.channel_capacity);
        tokio::spawn(run_writer(store.clone(), queue.clone(), rx));
        Self {
            inner: Arc::new(ForwardInner {
                store,
                queue,
                config,
                commands,
                drain: Mutex::new(()),
            }),
        }
    }

    pub async fn save_point(&self, tag: &str, value: f64, ts_ms: i64) -> Result<(), BufferError> {
        self.submit(BufferedOperation::SavePoint {
            tag: tag.to_string(),
            value,
            ts_ms,
        })
        .await
    }

    pub async fn save_alarm_start(&self, record: AlarmStartRecord) -> Result<(), BufferError> {
        self.submit(BufferedOperation::SaveAlarmStart(record)).await
    }

    pub async fn update_alarm_end(
        &self,
        alarm_id: &str,
        end_ms: i64,
        end_value: f64,
    ) -> Result<(), BufferError> {
        self.submit(BufferedOperation::UpdateAlarmEnd {
            alarm_id: alarm_id.to_string(),
            end_ms,
            end_value,
        })
        .await
    }

    /// 提交一次持久化意图，按提交顺序由写入任务处理。
    /// 只在通道满时等待，不等待存储 I/O。
    pub async fn submit(&self, operation: BufferedOperation) -> Result<(), BufferError> {
        self.inner
            .commands
            .send(WriterCommand::Write(operation))
            .await
            .map_err(|_| BufferError::Closed)
    }

    /// 等待此前提交的操作全部落到主存储或本地队列。
    pub async fn flush(&self) -> Result<(), BufferError> {
        let (done, wait) = oneshot::channel();
        self.inner
            .commands
            .send(WriterCommand::Flush(done))
            .await
            .map_err(|_| BufferError::Closed)?;
        wait.await.map_err(|_| BufferError::Closed)
    }

    pub async fn pending(&self) -> Result<usize, BufferError> {
        self.inner.queue.len().await.map_err(BufferError::Queue)
    }

    /// 从队头补写一批，遇到第一个失败即停止。
    /// 条目补写成功后才移出队列，写入任务可同时追加到队尾。
    pub async fn drain_once(&self) -> Result<DrainReport, BufferError> {
        let _drain = self.inner.drain.lock().await;

        let batch = self
            .inner
            .queue
            .peek_batch(self.inner.config.batch_size)
            .await
            .map_err(BufferError::Queue)?;
        let mut report = DrainReport::default();

        for entry in batch {
            if let Err(err) = self.replay(&entry).await {
                warn!(target: "scada.buffer", error = %err, "buffer_replay_halted");
                report.halted = true;
                break;
            }
            self.inner
                .queue
                .remove(entry.id)
                .await
                .map_err(BufferError::Queue)?;
            report.replayed += 1;
        }

        report.remaining = self.inner.queue.len().await.map_err(BufferError::Queue)?;
        if report.replayed > 0 {
            scada_telemetry::record_replayed_operations(report.replayed as u64);
            info!(
                target: "scada.buffer",
                replayed = report.replayed,
                remaining = report.remaining,
                "buffer_drained"
            );
        }
        Ok(report)
    }

    /// 手动触发补写，返回成功补写的条目数。
    pub async fn retry_now(&self) -> Result<DrainReport, BufferError> {
        self.drain_once().await
    }

    async fn replay(&self, entry: &BufferedEntry) -> Result<(), BufferError> {
        apply(self.inner.store.as_ref(), &entry.operation)
            .await
            .map_err(|source| BufferError::Replay {
                id: entry.id,
                kind: entry.operation.kind(),
                source,
            })
    }

    /// 启动后台补写循环，直到取消。
    pub fn spawn_drain_loop(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let this = self.clone();
        let interval = this.inner.config.drain_interval;
        tokio::spawn(async move {
            info!(
                target: "scada.buffer",
                interval_ms = interval.as_millis() as u64,
                batch_size = this.inner.config.batch_size,
                "drain_loop_started"
            );
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                if let Err(err) = this.drain_once().await {
                    warn!(target: "scada.buffer", error = %err, "drain_cycle_failed");
                }
            }
            info!(target: "scada.buffer", "drain_loop_stopped");
        })
    }
}

async fn run_writer(
    store: Arc<dyn HistoryStore>,
    queue: Arc<dyn BufferQueue>,
    mut commands: mpsc::Receiver<WriterCommand>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            WriterCommand::Write(operation) => {
                if let Err(err) = write_through(store.as_ref(), queue.as_ref(), &operation).await {
                    error!(
                        target: "scada.buffer",
                        op = operation.kind(),
                        error = %err,
                        "operation_lost"
                    );
                }
            }
            WriterCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!(target: "scada.buffer", "persistence_writer_stopped");
}

/// 队列为空时直写主存储；否则排到积压之后，不越过旧操作。
async fn write_through(
    store: &dyn HistoryStore,
    queue: &dyn BufferQueue,
    operation: &BufferedOperation,
) -> Result<(), BufferError> {
    let backlog = queue.len().await.map_err(BufferError::Queue)?;
    if backlog == 0 {
        match apply(store, operation).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                warn!(
                    target: "scada.buffer",
                    op = operation.kind(),
                    error = %err,
                    "primary_write_failed"
                );
            }
        }
    }

    queue.enqueue(operation).await.map_err(BufferError::Queue)?;
    scada_telemetry::record_buffered_operation();
    debug!(
        target: "scada.buffer",
        op = operation.kind(),
        backlog = backlog + 1,
        "operation_buffered"
    );
    Ok(())
}

async fn apply(store: &dyn HistoryStore, operation: &BufferedOperation) -> Result<(), StorageError> {
    match operation {
        BufferedOperation::SavePoint { tag, value, ts_ms } => {
            store.save_point(tag, *value, *ts_ms).await
        }
        BufferedOperation::SaveAlarmStart(record) => store.save_alarm_start(record).await.map(|_| ()),
        BufferedOperation::UpdateAlarmEnd {
            alarm_id,
            end_ms,
            end_value,
        } => store.update_alarm_end(alarm_id, *end_ms, *end_value).await,
    }
}
