//! Runtime error types

use std::fmt;

use oscmux_transport::TransportError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OscError>;

/// A bounded collection that can refuse registrations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Subscriptions,
    Publications,
    Ports,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Subscriptions => f.write_str("subscription"),
            Resource::Publications => f.write_str("publication"),
            Resource::Ports => f.write_str("port"),
        }
    }
}

#[derive(Error, Debug)]
pub enum OscError {
    #[error("{resource} capacity exceeded (limit {capacity})")]
    CapacityExceeded { resource: Resource, capacity: usize },

    #[error("network unavailable")]
    TransportUnavailable,

    #[error("packet of {size} bytes exceeds the {limit} byte limit")]
    PacketTooLarge { size: usize, limit: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(TransportError),

    #[error("core protocol error: {0}")]
    Core(#[from] oscmux_core::Error),
}

impl From<TransportError> for OscError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Unavailable => OscError::TransportUnavailable,
            other => OscError::Transport(other),
        }
    }
}

impl OscError {
    /// True for conditions a later tick may clear
    pub fn is_retryable(&self) -> bool {
        match self {
            OscError::TransportUnavailable => true,
            OscError::Transport(e) => e.is_transient(),
            _ => false,
        }
    }
}
