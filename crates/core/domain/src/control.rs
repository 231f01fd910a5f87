use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 设备 → 寄存器地址的声明式映射。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBinding {
    pub device_id: String,
    /// 所属连接名。
    pub connection: String,
    /// 写入起始地址（float32 占两个寄存器）。
    pub address: u16,
}

/// 厂商 HTTP 控制通道：设备 ID 以 `device_prefix` 开头时走该通道。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorControl {
    pub device_prefix: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_vendor_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_vendor_timeout_ms() -> u64 {
    5000
}
