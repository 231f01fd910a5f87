use crate::ConfigError;
use domain::{
    AlarmRule, Connection, DeviceBinding, HookRule, LogicRuleSet, ScheduleWindow, Tag,
    VendorControl,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Modbus 寄存器地址空间大小。
const REGISTER_SPACE: u32 = 65_536;

/// 项目配置（启动时一次性加载）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub alarms: Vec<AlarmRule>,
    #[serde(default)]
    pub logic: LogicRuleSet,
    #[serde(default)]
    pub devices: Vec<DeviceBinding>,
    #[serde(default)]
    pub vendor_control: Option<VendorControl>,
    #[serde(default)]
    pub hooks: Vec<HookRule>,
}

impl ProjectConfig {
    /// 读取并校验项目配置文件。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let connections = unique(self.connections.iter().map(|c| c.name.as_str()), "connection")?;
        for connection in &self.connections {
            if connection.host.trim().is_empty() {
                return Err(invalid(format!("connection {} has empty host", connection.name)));
            }
        }

        let tags = unique(self.tags.iter().map(|t| t.name.as_str()), "tag")?;
        for tag in &self.tags {
            if !connections.contains(tag.connection_name.as_str()) {
                return Err(invalid(format!(
                    "tag {} references unknown connection {}",
                    tag.name, tag.connection_name
                )));
            }
            let end = u32::from(tag.address) + u32::from(tag.value_type.register_count());
            if end > REGISTER_SPACE {
                return Err(invalid(format!(
                    "tag {} at address {} extends past register 65535",
                    tag.name, tag.address
                )));
            }
        }

        unique(self.alarms.iter().map(|a| a.id.as_str()), "alarm")?;
        for alarm in &self.alarms {
            if !tags.contains(alarm.tag.as_str()) {
                return Err(invalid(format!(
                    "alarm {} references unknown tag {}",
                    alarm.id, alarm.tag
                )));
            }
            if alarm.hysteresis < 0.0 {
                return Err(invalid(format!("alarm {} has negative hysteresis", alarm.id)));
            }
        }

        unique(self.logic.rules.iter().map(|r| r.id.as_str()), "logic rule")?;
        for rule in &self.logic.rules {
            for schedule in &rule.schedules {
                check_window(&schedule.window, &rule.id)?;
            }
        }
        for schedule in &self.logic.globals.schedules {
            check_window(&schedule.window, "globals")?;
        }

        unique(self.devices.iter().map(|d| d.device_id.as_str()), "device")?;
        for device in &self.devices {
            if !connections.contains(device.connection.as_str()) {
                return Err(invalid(format!(
                    "device {} references unknown connection {}",
                    device.device_id, device.connection
                )));
            }
            // 控制值按 float32 写两个寄存器
            if u32::from(device.address) + 2 > REGISTER_SPACE {
                return Err(invalid(format!(
                    "device {} at address {} extends past register 65535",
                    device.device_id, device.address
                )));
            }
        }

        if let Some(vendor) = &self.vendor_control {
            if vendor.device_prefix.is_empty() || vendor.url.trim().is_empty() {
                return Err(invalid("vendor_control requires device_prefix and url".to_string()));
            }
        }

        unique(self.hooks.iter().map(|h| h.name.as_str()), "hook")?;
        Ok(())
    }
}

fn unique<'a>(
    names: impl Iterator<Item = &'a str>,
    kind: &str,
) -> Result<HashSet<&'a str>, ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(invalid(format!("{kind} with empty name")));
        }
        if !seen.insert(name) {
            return Err(invalid(format!("duplicate {kind}: {name}")));
        }
    }
    Ok(seen)
}

fn check_window(window: &ScheduleWindow, owner: &str) -> Result<(), ConfigError> {
    window
        .window()
        .map(|_| ())
        .map_err(|e| invalid(format!("{owner}: {e}")))
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Project(message)
}
