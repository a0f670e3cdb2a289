//! oscmux
//!
//! OSC servers and clients multiplexed over non-blocking datagram sockets,
//! serviced from the host's own loop:
//! - Servers drain their port and dispatch matching messages to subscriptions
//! - Clients send immediately or on a schedule through publish entries
//! - One socket per local port, shared when a server and client use the same port
//!
//! Nothing runs in the background. The host calls [`OscContext::update`]
//! repeatedly and all work happens inside that call.
//!
//! # Example
//!
//! ```
//! use oscmux::{MemoryNetwork, OscConfig, OscContext, ValueSource};
//! use std::net::Ipv4Addr;
//!
//! let net = MemoryNetwork::new();
//! let mut device = OscContext::new(net.node(Ipv4Addr::new(10, 0, 0, 1)), OscConfig::default()).unwrap();
//! let mut console = OscContext::new(net.node(Ipv4Addr::new(10, 0, 0, 2)), OscConfig::default()).unwrap();
//!
//! device
//!     .subscribe_args(9000, "/lights/*/level", |(level,): (f32,)| println!("level {}", level))
//!     .unwrap();
//! console
//!     .publish("10.0.0.1", 9000, "/lights/1/level", ValueSource::fixed((0.8f32,)), 100)
//!     .unwrap();
//!
//! console.update().unwrap();
//! let stats = device.update().unwrap();
//! assert_eq!(stats.parse.dispatched, 1);
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod registry;
pub mod server;

pub use client::{Client, PostStats, PublishEntry, PublishRef, ValueSource};
pub use config::OscConfig;
pub use context::{OscContext, UpdateStats};
pub use error::{OscError, Resource, Result};
pub use registry::{ClientRegistry, PortRegistry, ServerRegistry, SocketRegistry};
pub use server::{MessageHandler, ParseStats, Server, SubscriptionId};

pub use oscmux_core::{
    AddressPattern, Clock, FromOscArgs, IntoOscArgs, ManualClock, MonotonicClock, OscBundle,
    OscMessage, OscPacket, OscValue, TimeTag, TypeSignature, DEFAULT_OSC_PORT,
};
pub use oscmux_transport::{DatagramSocket, DatagramTransport, TransportError};

#[cfg(feature = "udp")]
pub use oscmux_transport::{UdpConfig, UdpTransport};

#[cfg(feature = "memory")]
pub use oscmux_transport::{MemoryNetwork, MemoryTransport};
