//! SCADA 采集与控制核心：轮询、报警、联动、断网缓存与实时推送。

mod handlers;
mod middleware;
mod routes;
mod state;
mod utils;

use domain::SystemClock;
use scada_config::{AppConfig, ProjectConfig};
use scada_protocol::{ModbusTcpConnector, ModbusTcpSettings};
use scada_storage::{
    BufferQueue, ForwardConfig, HistoryStore, InMemoryHistoryStore, InMemoryRuleStateStore,
    PgHistoryStore, RedisRuleStateStore, RuleStateStore, SqliteBufferQueue,
};
use scada_telemetry::init_tracing;
use state::{AppState, Backends, Runtime};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let project = ProjectConfig::load(&config.project_config_path)?;
    info!(path = %config.project_config_path, "project_config_loaded");

    let backends = Backends {
        history: history_store(&config).await?,
        queue: Arc::new(SqliteBufferQueue::open(&config.buffer_path).await?) as Arc<dyn BufferQueue>,
        rule_states: Some(rule_state_store(&config)),
    };
    let connector = Arc::new(ModbusTcpConnector::new(ModbusTcpSettings {
        unit_id: config.modbus_unit_id,
        connect_timeout: config.connect_timeout(),
        io_timeout: config.io_timeout(),
    }));
    let forward = ForwardConfig {
        drain_interval: config.buffer_drain_interval(),
        batch_size: config.buffer_batch_size,
        ..ForwardConfig::default()
    };
    let runtime =
        Runtime::assemble(project, backends, connector, forward, Arc::new(SystemClock)).await?;

    // 所有后台任务共享同一个取消令牌
    let cancel = CancellationToken::new();
    let mut tasks = runtime.scheduler.spawn(cancel.clone());
    tasks.push(runtime.state.writer.spawn_drain_loop(cancel.clone()));

    let app = routes::build_app(runtime.state.clone());
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(addr = %config.http_addr, "http_listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    for task in tasks {
        if let Err(err) = task.await {
            warn!(error = %err, "background_task_join_failed");
        }
    }
    // 未处理的持久化意图落到主存储或本地队列后再退出
    if let Err(err) = runtime.state.writer.flush().await {
        warn!(error = %err, "persistence_flush_failed");
    }
    info!("shutdown_complete");
    Ok(())
}

/// 配置了数据库时使用 Postgres；连接失败的写入由断网缓存接管。
async fn history_store(
    config: &AppConfig,
) -> Result<Arc<dyn HistoryStore>, Box<dyn std::error::Error>> {
    let Some(url) = &config.database_url else {
        warn!("database_url_absent_using_in_memory_history");
        return Ok(Arc::new(InMemoryHistoryStore::new()));
    };
    let store = PgHistoryStore::connect(url)?;
    if let Err(err) = store.ensure_schema().await {
        warn!(error = %err, "history_schema_check_failed");
    }
    Ok(Arc::new(store))
}

fn rule_state_store(config: &AppConfig) -> Arc<dyn RuleStateStore> {
    match config.redis_url.as_deref().map(RedisRuleStateStore::connect) {
        Some(Ok(store)) => Arc::new(store),
        Some(Err(err)) => {
            warn!(error = %err, "redis_unavailable_using_in_memory_rule_states");
            Arc::new(InMemoryRuleStateStore::new())
        }
        None => Arc::new(InMemoryRuleStateStore::new()),
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "ctrl_c_listener_failed");
            }
            info!("shutdown_requested");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }
}
