//! oscmux core
//!
//! Open Sound Control 1.0 primitives shared by the runtime and its hosts.
//!
//! This crate provides:
//! - Argument and packet types ([`OscValue`], [`OscMessage`], [`OscBundle`], [`OscPacket`])
//! - Binary encoding/decoding ([`codec`])
//! - Address validation and pattern matching ([`AddressPattern`])
//! - Typed argument conversion ([`IntoOscArgs`], [`FromOscArgs`], [`TypeSignature`])
//! - Millisecond clocks for scheduling ([`Clock`])

pub mod address;
pub mod args;
pub mod codec;
pub mod error;
pub mod time;
pub mod types;

pub use address::{matches, validate_address, AddressPattern};
pub use args::{FromOscArgs, FromOscValue, IntoOscArgs, TypeSignature};
pub use codec::{decode, encode};
pub use error::{Error, Result};
pub use time::{Clock, ManualClock, MonotonicClock};
pub use types::*;

/// Conventional OSC port used by many hosts
pub const DEFAULT_OSC_PORT: u16 = 9000;
