//! Transport error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("bind to port {port} failed: {reason}")]
    BindFailed { port: u16, reason: String },

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    #[error("invalid host: {0}")]
    InvalidHost(String),

    #[error("network unavailable")]
    Unavailable,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// True when retrying on a later tick may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Unavailable | TransportError::SendFailed(_))
    }
}
