use crate::ConfigError;
use std::env;
use std::time::Duration;

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub project_config_path: String,
    /// 缺省时使用内存历史存储。
    pub database_url: Option<String>,
    pub buffer_path: String,
    /// 缺省时规则状态只保存在内存。
    pub redis_url: Option<String>,
    pub buffer_drain_interval_ms: u64,
    pub buffer_batch_size: usize,
    pub modbus_unit_id: u8,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let project_config_path = env::var("SCADA_PROJECT_CONFIG")
            .map_err(|_| ConfigError::Missing("SCADA_PROJECT_CONFIG".to_string()))?;
        let http_addr =
            env::var("SCADA_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let database_url = read_optional("SCADA_DATABASE_URL");
        let buffer_path =
            env::var("SCADA_BUFFER_PATH").unwrap_or_else(|_| "scada_buffer.db".to_string());
        let redis_url = read_optional("SCADA_REDIS_URL");
        let buffer_drain_interval_ms =
            read_u64_with_default("SCADA_BUFFER_DRAIN_INTERVAL_MS", 5000)?;
        let buffer_batch_size = read_u64_with_default("SCADA_BUFFER_BATCH_SIZE", 100)? as usize;
        if buffer_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "SCADA_BUFFER_BATCH_SIZE".to_string(),
                "0".to_string(),
            ));
        }
        let modbus_unit_id = read_u8_with_default("SCADA_MODBUS_UNIT_ID", 1)?;
        let connect_timeout_ms = read_u64_with_default("SCADA_CONNECT_TIMEOUT_MS", 3000)?;
        let io_timeout_ms = read_u64_with_default("SCADA_IO_TIMEOUT_MS", 3000)?;

        Ok(Self {
            http_addr,
            project_config_path,
            database_url,
            buffer_path,
            redis_url,
            buffer_drain_interval_ms,
            buffer_batch_size,
            modbus_unit_id,
            connect_timeout_ms,
            io_timeout_ms,
        })
    }

    pub fn buffer_drain_interval(&self) -> Duration {
        Duration::from_millis(self.buffer_drain_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}
