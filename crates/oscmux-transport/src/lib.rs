//! oscmux transport layer
//!
//! The runtime consumes a single capability: bind a local port, try to send
//! a datagram, try to receive one. Nothing here ever blocks.
//!
//! Backends:
//! - UDP (`udp` feature): std sockets configured through socket2
//! - Memory (`memory` feature): an in-process network for simulation and tests

pub mod error;
pub mod traits;

#[cfg(feature = "udp")]
pub mod udp;

#[cfg(feature = "memory")]
pub mod memory;

pub use error::{Result, TransportError};
pub use traits::{parse_host, DatagramSocket, DatagramTransport};

#[cfg(feature = "udp")]
pub use udp::{UdpConfig, UdpSocketHandle, UdpTransport};

#[cfg(feature = "memory")]
pub use memory::{MemoryNetwork, MemorySocket, MemoryTransport};

/// Largest payload a single UDP datagram can carry over IPv4
pub const MAX_UDP_PAYLOAD: usize = 65_507;
