//! 配置加载
//!
//! - `AppConfig`：进程运行参数，来自 `SCADA_*` 环境变量
//! - `ProjectConfig`：连接、点位、报警、联动、设备表，来自项目 JSON 文件

mod app;
mod project;

pub use app::AppConfig;
pub use project::ProjectConfig;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("cannot read project config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed project config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid project config: {0}")]
    Project(String),
}
