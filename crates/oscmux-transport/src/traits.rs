//! Transport trait definitions

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::{Result, TransportError};

/// A bound, non-blocking datagram endpoint
pub trait DatagramSocket {
    /// Port this socket is bound to (resolved when bound to port 0)
    fn local_port(&self) -> u16;

    /// Send one datagram without waiting
    ///
    /// `host` is an IP literal or `localhost`.
    fn try_send_to(&mut self, host: &str, port: u16, bytes: &[u8]) -> Result<()>;

    /// Receive one queued datagram into `buf`
    ///
    /// Returns `Ok(None)` when nothing is queued. A datagram larger than
    /// `buf` is truncated to `buf.len()`, as with a real UDP socket.
    fn try_recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>>;
}

/// Factory for sockets on one network backend
pub trait DatagramTransport {
    type Socket: DatagramSocket;

    /// Bind a local port; 0 picks an ephemeral port
    fn bind(&mut self, port: u16) -> Result<Self::Socket>;

    /// Whether the underlying link is up
    fn is_available(&self) -> bool {
        true
    }
}

/// Resolve a destination host without touching DNS
///
/// Accepts IPv4/IPv6 literals (IPv6 optionally in brackets) and `localhost`.
pub fn parse_host(host: &str) -> Result<IpAddr> {
    if host.eq_ignore_ascii_case("localhost") {
        return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    let literal = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    literal
        .parse()
        .map_err(|_| TransportError::InvalidHost(host.to_string()))
}
