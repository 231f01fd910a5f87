use serde::{Deserialize, Serialize};

/// 控制器连接配置。
///
/// 名称全局唯一；轮询周期按连接独立生效。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub name: String,
    pub host: String,
    #[serde(default = "default_modbus_port")]
    pub port: u16,
    /// 轮询周期（毫秒）。
    #[serde(default = "default_poll_interval_ms", alias = "pollIntervalMs")]
    pub poll_interval_ms: u64,
}

fn default_modbus_port() -> u16 {
    502
}

fn default_poll_interval_ms() -> u64 {
    1000
}

/// 点位值类型（当前仅支持 32 位浮点）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagValueType {
    #[default]
    #[serde(alias = "float", alias = "FLOAT32")]
    Float32,
}

impl TagValueType {
    /// 占用的寄存器数量。
    pub fn register_count(self) -> u16 {
        match self {
            Self::Float32 => 2,
        }
    }
}

/// 点位定义。地址空间在连接内独立。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub address: u16,
    #[serde(default, rename = "type", alias = "value_type")]
    pub value_type: TagValueType,
    #[serde(default)]
    pub unit: String,
    #[serde(alias = "connectionName")]
    pub connection_name: String,
    /// 变化死区：新旧值差的绝对值超过该值才算变化。
    #[serde(default)]
    pub deadband: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// 数据质量。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    Good,
    Bad,
    Uncertain,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Bad => "bad",
            Self::Uncertain => "uncertain",
        }
    }
}

/// 点位运行时值（每个点位仅保留最新一条）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuntimeValue {
    pub value: f64,
    pub ts_ms: i64,
    pub quality: Quality,
}

/// 采集得到的单个点位样本。
#[derive(Debug, Clone, PartialEq)]
pub struct TagSample {
    pub tag_name: String,
    pub value: f64,
    pub ts_ms: i64,
}

/// 只读点位值访问（供规则引擎读取参考点位）。
pub trait TagReader: Send + Sync {
    fn value_of(&self, tag_name: &str) -> Option<f64>;
}
