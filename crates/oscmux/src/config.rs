//! Runtime configuration

use oscmux_core::codec::MAX_BUNDLE_DEPTH;
use oscmux_transport::MAX_UDP_PAYLOAD;
use serde::{Deserialize, Serialize};

use crate::error::{OscError, Result};

/// Smallest receive/transmit buffer that can hold a useful message
const MIN_PACKET_SIZE: usize = 64;

/// Bounds and defaults for an [`OscContext`](crate::OscContext)
///
/// Every collection is sized up front from these values, so steady-state
/// operation never grows the heap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscConfig {
    /// Local port used by `send`/`publish` without an explicit source port (0 = ephemeral)
    pub client_port: u16,
    /// Maximum number of bound local ports
    pub max_ports: usize,
    /// Subscriptions per server
    pub max_subscriptions: usize,
    /// Publish entries per client
    pub max_publications: usize,
    /// Datagrams drained per server per `parse`
    pub max_datagrams_per_parse: usize,
    /// Receive and transmit buffer size in bytes
    pub max_packet_size: usize,
    /// Deepest bundle nesting accepted on receive
    pub max_bundle_depth: usize,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            client_port: 0,
            max_ports: 8,
            max_subscriptions: 32,
            max_publications: 32,
            max_datagrams_per_parse: 16,
            max_packet_size: 2048,
            max_bundle_depth: MAX_BUNDLE_DEPTH,
        }
    }
}

impl OscConfig {
    /// Check that every bound is usable
    pub fn validate(&self) -> Result<()> {
        let nonzero = [
            ("max_ports", self.max_ports),
            ("max_subscriptions", self.max_subscriptions),
            ("max_publications", self.max_publications),
            ("max_datagrams_per_parse", self.max_datagrams_per_parse),
            ("max_bundle_depth", self.max_bundle_depth),
        ];
        if let Some((name, _)) = nonzero.iter().find(|(_, v)| *v == 0) {
            return Err(OscError::Config(format!("{} must be at least 1", name)));
        }

        if !(MIN_PACKET_SIZE..=MAX_UDP_PAYLOAD).contains(&self.max_packet_size) {
            return Err(OscError::Config(format!(
                "max_packet_size must be between {} and {}, got {}",
                MIN_PACKET_SIZE, MAX_UDP_PAYLOAD, self.max_packet_size
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(OscConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_bounds_rejected() {
        let config = OscConfig {
            max_subscriptions: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_subscriptions"));
    }

    #[test]
    fn test_packet_size_bounds() {
        let small = OscConfig {
            max_packet_size: 16,
            ..Default::default()
        };
        assert!(small.validate().is_err());

        let huge = OscConfig {
            max_packet_size: 70_000,
            ..Default::default()
        };
        assert!(huge.validate().is_err());
    }
}
