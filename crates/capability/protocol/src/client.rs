//! 寄存器读写接口。

use crate::error::ProtocolError;
use async_trait::async_trait;
use domain::Connection;

/// 已建立的寄存器通道（单连接，非并发）。
#[async_trait]
pub trait RegisterClient: Send {
    /// 读保持寄存器（功能码 0x03）。
    async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, ProtocolError>;

    /// 写多个保持寄存器（功能码 0x10）。
    async fn write_multiple_registers(
        &mut self,
        address: u16,
        words: &[u16],
    ) -> Result<(), ProtocolError>;
}

/// 按连接配置建立寄存器通道。
#[async_trait]
pub trait RegisterConnector: Send + Sync {
    async fn connect(&self, connection: &Connection)
    -> Result<Box<dyn RegisterClient>, ProtocolError>;
}
