//! 协议错误类型定义

/// 协议通信错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// 连接建立失败或连接中断（下个周期重连）
    #[error("transport error: {0}")]
    Transport(String),

    /// 从站返回异常码（仅跳过当前寄存器段）
    #[error("modbus exception: {0}")]
    Exception(String),

    /// 响应格式不符合请求
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// 寄存器数据不足以解码
    #[error("malformed register data: expected {expected} words, got {actual}")]
    MalformedRegisterData { expected: usize, actual: usize },

    /// 超时错误
    #[error("timeout: {0}")]
    Timeout(String),
}

impl ProtocolError {
    /// 是否需要丢弃当前连接并在下个周期重建。
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
