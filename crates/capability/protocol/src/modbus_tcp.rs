//! Modbus TCP 客户端实现
//!
//! 基于 tokio-modbus，连接与每次读写都带超时。

use crate::client::{RegisterClient, RegisterConnector};
use crate::error::ProtocolError;
use async_trait::async_trait;
use domain::Connection;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::timeout;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{debug, info};

/// Modbus TCP 参数。
#[derive(Debug, Clone, Copy)]
pub struct ModbusTcpSettings {
    /// 从站 ID
    pub unit_id: u8,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
}

impl Default for ModbusTcpSettings {
    fn default() -> Self {
        Self {
            unit_id: 1,
            connect_timeout: Duration::from_millis(3000),
            io_timeout: Duration::from_millis(3000),
        }
    }
}

/// Modbus TCP 连接器。
#[derive(Debug, Clone, Default)]
pub struct ModbusTcpConnector {
    settings: ModbusTcpSettings,
}

impl ModbusTcpConnector {
    pub fn new(settings: ModbusTcpSettings) -> Self {
        Self { settings }
    }
}

async fn resolve(connection: &Connection) -> Result<SocketAddr, ProtocolError> {
    let target = format!("{}:{}", connection.host, connection.port);
    tokio::net::lookup_host(&target)
        .await
        .map_err(|e| ProtocolError::Transport(format!("resolve {}: {}", target, e)))?
        .next()
        .ok_or_else(|| ProtocolError::Transport(format!("no address for {}", target)))
}

#[async_trait]
impl RegisterConnector for ModbusTcpConnector {
    async fn connect(
        &self,
        connection: &Connection,
    ) -> Result<Box<dyn RegisterClient>, ProtocolError> {
        let addr = resolve(connection).await?;
        let ctx = timeout(
            self.settings.connect_timeout,
            tcp::connect_slave(addr, Slave(self.settings.unit_id)),
        )
        .await
        .map_err(|_| ProtocolError::Timeout(format!("connect {}", addr)))?
        .map_err(|e| ProtocolError::Transport(e.to_string()))?;

        info!(
            target: "scada.poll",
            connection = %connection.name,
            %addr,
            unit_id = self.settings.unit_id,
            "modbus_connected"
        );
        Ok(Box::new(ModbusTcpClient {
            ctx,
            io_timeout: self.settings.io_timeout,
        }))
    }
}

/// 单个 Modbus TCP 会话。
pub struct ModbusTcpClient {
    ctx: Context,
    io_timeout: Duration,
}

async fn with_timeout<T, F>(io_timeout: Duration, op: &str, fut: F) -> Result<T, ProtocolError>
where
    F: Future<Output = tokio_modbus::Result<T>>,
{
    timeout(io_timeout, fut)
        .await
        .map_err(|_| ProtocolError::Timeout(op.to_string()))?
        .map_err(|e| match e {
            tokio_modbus::Error::Transport(io) => ProtocolError::Transport(io.to_string()),
            other => ProtocolError::MalformedResponse(other.to_string()),
        })?
        .map_err(|code| ProtocolError::Exception(format!("{:?}", code)))
}

#[async_trait]
impl RegisterClient for ModbusTcpClient {
    async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, ProtocolError> {
        let words = with_timeout(
            self.io_timeout,
            "read holding registers",
            self.ctx.read_holding_registers(address, count),
        )
        .await?;
        debug!(
            target: "scada.poll",
            address,
            count,
            received = words.len(),
            "read_holding_registers"
        );
        Ok(words)
    }

    async fn write_multiple_registers(
        &mut self,
        address: u16,
        words: &[u16],
    ) -> Result<(), ProtocolError> {
        with_timeout(
            self.io_timeout,
            "write multiple registers",
            self.ctx.write_multiple_registers(address, words),
        )
        .await
    }
}
