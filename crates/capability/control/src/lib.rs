//! 设备控制下发
//!
//! `DeviceControl::send_control_command` 是规则引擎与外部路由层共用的控制入口。
//! `ControlRouter` 先按厂商前缀匹配 HTTP 通道，其余设备查声明式设备表，
//! 把值编码成 float32 写入对应连接的保持寄存器。

use async_trait::async_trait;
use domain::{Connection, DeviceBinding, VendorControl};
use scada_protocol::{ProtocolError, RegisterConnector, encode_float32};
use scada_telemetry::record_control_failure;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 控制链路错误。
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("no control mapping for device: {0}")]
    UnknownDevice(String),
    #[error("device {device} bound to unknown connection: {connection}")]
    UnknownConnection { device: String, connection: String },
    #[error("field bus error: {0}")]
    FieldBus(#[from] ProtocolError),
    #[error("vendor http error: {0}")]
    Vendor(String),
}

/// 下发通道。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlRoute {
    Modbus,
    VendorHttp,
}

/// 下发结果。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlAck {
    pub device_id: String,
    pub route: ControlRoute,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

/// 设备控制能力。
#[async_trait]
pub trait DeviceControl: Send + Sync {
    async fn send_control_command(
        &self,
        device_id: &str,
        command: &str,
        parameter: &str,
        value: f64,
    ) -> Result<ControlAck, ControlError>;
}

/// Modbus 写寄存器通道（每次下发建立独立会话）。
pub struct ModbusControl {
    connections: HashMap<String, Connection>,
    devices: HashMap<String, DeviceBinding>,
    connector: Arc<dyn RegisterConnector>,
}

impl ModbusControl {
    pub fn new(
        connections: &[Connection],
        devices: &[DeviceBinding],
        connector: Arc<dyn RegisterConnector>,
    ) -> Self {
        Self {
            connections: connections
                .iter()
                .map(|c| (c.name.clone(), c.clone()))
                .collect(),
            devices: devices
                .iter()
                .map(|d| (d.device_id.clone(), d.clone()))
                .collect(),
            connector,
        }
    }

    pub async fn write_value(&self, device_id: &str, value: f64) -> Result<ControlAck, ControlError> {
        let binding = self
            .devices
            .get(device_id)
            .ok_or_else(|| ControlError::UnknownDevice(device_id.to_string()))?;
        let connection = self.connections.get(&binding.connection).ok_or_else(|| {
            ControlError::UnknownConnection {
                device: device_id.to_string(),
                connection: binding.connection.clone(),
            }
        })?;

        let words = encode_float32(value as f32);
        let mut client = self.connector.connect(connection).await?;
        client
            .write_multiple_registers(binding.address, &words)
            .await?;

        info!(
            target: "scada.control",
            device_id,
            connection = %connection.name,
            address = binding.address,
            value,
            "modbus_control_written"
        );
        Ok(ControlAck {
            device_id: device_id.to_string(),
            route: ControlRoute::Modbus,
            value,
            response: None,
        })
    }
}

#[derive(Serialize)]
struct VendorPayload<'a> {
    device_id: &'a str,
    command: &'a str,
    parameter: &'a str,
    value: f64,
}

/// 厂商 HTTP 控制通道。
pub struct VendorHttpControl {
    config: VendorControl,
    client: reqwest::Client,
}

impl VendorHttpControl {
    pub fn new(config: VendorControl) -> Result<Self, ControlError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .build()
            .map_err(|e| ControlError::Vendor(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn matches(&self, device_id: &str) -> bool {
        !self.config.device_prefix.is_empty() && device_id.starts_with(&self.config.device_prefix)
    }

    pub async fn post(
        &self,
        device_id: &str,
        command: &str,
        parameter: &str,
        value: f64,
    ) -> Result<ControlAck, ControlError> {
        let mut request = self.client.post(&self.config.url).json(&VendorPayload {
            device_id,
            command,
            parameter,
            value,
        });
        for (name, header_value) in &self.config.headers {
            request = request.header(name.as_str(), header_value.as_str());
        }
        let response = request
            .send()
            .await
            .map_err(|e| ControlError::Vendor(e.to_string()))?
            .error_for_status()
            .map_err(|e| ControlError::Vendor(e.to_string()))?;
        let body = response
            .json::<serde_json::Value>()
            .await
            .unwrap_or(serde_json::Value::Null);

        info!(
            target: "scada.control",
            device_id,
            command,
            parameter,
            value,
            "vendor_control_sent"
        );
        Ok(ControlAck {
            device_id: device_id.to_string(),
            route: ControlRoute::VendorHttp,
            value,
            response: Some(body),
        })
    }
}

/// 控制路由：厂商前缀优先，其余走设备表。
pub struct ControlRouter {
    vendor: Option<VendorHttpControl>,
    modbus: ModbusControl,
}

impl ControlRouter {
    pub fn new(modbus: ModbusControl, vendor: Option<VendorHttpControl>) -> Self {
        Self { vendor, modbus }
    }

    pub fn route_for(&self, device_id: &str) -> ControlRoute {
        match &self.vendor {
            Some(vendor) if vendor.matches(device_id) => ControlRoute::VendorHttp,
            _ => ControlRoute::Modbus,
        }
    }
}

#[async_trait]
impl DeviceControl for ControlRouter {
    async fn send_control_command(
        &self,
        device_id: &str,
        command: &str,
        parameter: &str,
        value: f64,
    ) -> Result<ControlAck, ControlError> {
        let result = match &self.vendor {
            Some(vendor) if vendor.matches(device_id) => {
                vendor.post(device_id, command, parameter, value).await
            }
            _ => self.modbus.write_value(device_id, value).await,
        };
        if let Err(err) = &result {
            record_control_failure();
            warn!(
                target: "scada.control",
                device_id,
                command,
                value,
                error = %err,
                "control_command_failed"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scada_protocol::{SimulatedConnector, SimulatedController, decode_float32};

    fn plc() -> Connection {
        Connection {
            name: "plc".to_string(),
            host: "127.0.0.1".to_string(),
            port: 502,
            poll_interval_ms: 1000,
        }
    }

    fn binding(device_id: &str, connection: &str, address: u16) -> DeviceBinding {
        DeviceBinding {
            device_id: device_id.to_string(),
            connection: connection.to_string(),
            address,
        }
    }

    fn router(controller: &SimulatedController, vendor: Option<VendorHttpControl>) -> ControlRouter {
        let connector = SimulatedConnector::new().with_controller("plc", controller.clone());
        let modbus = ModbusControl::new(
            &[plc()],
            &[
                binding("mixer_valve", "plc", 300),
                binding("mixer_pump", "plc", 301),
                binding("orphan", "missing", 10),
            ],
            Arc::new(connector),
        );
        ControlRouter::new(modbus, vendor)
    }

    #[tokio::test]
    async fn table_device_writes_float_registers() {
        let controller = SimulatedController::new();
        let router = router(&controller, None);

        let ack = router
            .send_control_command("mixer_valve", "set_value", "position", 42.5)
            .await
            .unwrap();

        assert_eq!(ack.route, ControlRoute::Modbus);
        let writes = controller.write_log();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, 300);
        assert_eq!(decode_float32(&writes[0].1).unwrap(), 42.5);
    }

    #[tokio::test]
    async fn unmapped_device_is_rejected() {
        let controller = SimulatedController::new();
        let router = router(&controller, None);

        let err = router
            .send_control_command("fan_9", "set_value", "speed", 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::UnknownDevice(id) if id == "fan_9"));

        let err = router
            .send_control_command("orphan", "set_value", "speed", 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::UnknownConnection { .. }));
        assert!(controller.write_log().is_empty());
    }

    #[tokio::test]
    async fn offline_controller_surfaces_field_bus_error() {
        let controller = SimulatedController::new();
        controller.set_offline(true);
        let router = router(&controller, None);

        let err = router
            .send_control_command("mixer_pump", "set_value", "state", 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::FieldBus(ProtocolError::Transport(_))));
    }

    #[tokio::test]
    async fn vendor_prefix_takes_precedence() {
        let controller = SimulatedController::new();
        let vendor = VendorHttpControl::new(VendorControl {
            device_prefix: "vnd_".to_string(),
            url: "http://127.0.0.1:9/control".to_string(),
            headers: HashMap::new(),
            timeout_ms: 200,
        })
        .unwrap();
        let router = router(&controller, Some(vendor));

        assert_eq!(router.route_for("vnd_fan_1"), ControlRoute::VendorHttp);
        assert_eq!(router.route_for("mixer_valve"), ControlRoute::Modbus);
    }
}
