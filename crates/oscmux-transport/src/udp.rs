//! UDP transport implementation

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use tracing::{debug, info, trace};

use crate::error::{Result, TransportError};
use crate::traits::{parse_host, DatagramSocket, DatagramTransport};

/// UDP configuration
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// Local interface to bind (default: all IPv4 interfaces)
    pub bind_ip: IpAddr,
    /// Allow sending to broadcast addresses
    pub broadcast: bool,
    /// Set SO_REUSEADDR before binding
    pub reuse_address: bool,
    /// Kernel receive buffer size, if overriding the OS default
    pub recv_buffer_size: Option<usize>,
    /// Kernel send buffer size, if overriding the OS default
    pub send_buffer_size: Option<usize>,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            broadcast: false,
            reuse_address: false,
            recv_buffer_size: None,
            send_buffer_size: None,
        }
    }
}

/// UDP transport (connectionless)
#[derive(Debug, Clone, Default)]
pub struct UdpTransport {
    config: UdpConfig,
}

impl UdpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: UdpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UdpConfig {
        &self.config
    }

    fn open(&self, addr: SocketAddr) -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;

        if self.config.reuse_address {
            socket.set_reuse_address(true)?;
        }
        if self.config.broadcast {
            socket.set_broadcast(true)?;
        }
        if let Some(size) = self.config.recv_buffer_size {
            socket.set_recv_buffer_size(size)?;
        }
        if let Some(size) = self.config.send_buffer_size {
            socket.set_send_buffer_size(size)?;
        }

        socket.set_nonblocking(true)?;
        socket.bind(&SockAddr::from(addr))?;
        Ok(socket.into())
    }
}

impl DatagramTransport for UdpTransport {
    type Socket = UdpSocketHandle;

    fn bind(&mut self, port: u16) -> Result<UdpSocketHandle> {
        let addr = SocketAddr::new(self.config.bind_ip, port);
        let socket = self.open(addr).map_err(|e| TransportError::BindFailed {
            port,
            reason: e.to_string(),
        })?;
        let local = socket.local_addr()?;

        info!("UDP bound to {}", local);

        Ok(UdpSocketHandle { socket, local })
    }
}

/// A bound non-blocking UDP socket
#[derive(Debug)]
pub struct UdpSocketHandle {
    socket: UdpSocket,
    local: SocketAddr,
}

impl UdpSocketHandle {
    /// Get local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }
}

impl DatagramSocket for UdpSocketHandle {
    fn local_port(&self) -> u16 {
        self.local.port()
    }

    fn try_send_to(&mut self, host: &str, port: u16, bytes: &[u8]) -> Result<()> {
        let target = SocketAddr::new(parse_host(host)?, port);

        match self.socket.send_to(bytes, target) {
            Ok(sent) if sent == bytes.len() => {
                trace!("UDP sent {} bytes to {}", sent, target);
                Ok(())
            }
            Ok(sent) => Err(TransportError::SendFailed(format!(
                "short write to {}: {} of {} bytes",
                target,
                sent,
                bytes.len()
            ))),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(TransportError::SendFailed(
                format!("send buffer full for {}", target),
            )),
            Err(e) => Err(TransportError::SendFailed(format!("{}: {}", target, e))),
        }
    }

    fn try_recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        loop {
            match self.socket.recv_from(buf) {
                Ok((len, from)) => {
                    trace!("UDP received {} bytes from {}", len, from);
                    return Ok(Some((len, from)));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                // ICMP port unreachable for an earlier send, surfaced here on some platforms
                Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                    debug!("UDP ignoring connection reset on {}", self.local);
                    continue;
                }
                Err(e) => return Err(TransportError::ReceiveFailed(e.to_string())),
            }
        }
    }
}
