//! In-process datagram network
//!
//! Each [`MemoryTransport`] is a node with its own IP on a shared
//! [`MemoryNetwork`]. Datagrams land in bounded per-socket queues. Sends to
//! an unbound address, to a node whose link is down, or into a full queue
//! are dropped silently, as UDP would.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::{parse_host, DatagramSocket, DatagramTransport};

/// Datagrams a socket queues before further arrivals are dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// First port handed out for port-0 binds
pub const EPHEMERAL_PORT_START: u16 = 49152;

type Queue = VecDeque<(SocketAddr, Vec<u8>)>;

#[derive(Debug)]
struct NetworkState {
    queues: HashMap<SocketAddr, Queue>,
    down: HashSet<IpAddr>,
    next_ephemeral: u16,
    queue_capacity: usize,
    dropped: u64,
}

impl NetworkState {
    fn deliver(&mut self, from: SocketAddr, to: SocketAddr, bytes: &[u8]) -> bool {
        if self.down.contains(&to.ip()) {
            trace!("memory: {} is down, dropping datagram", to.ip());
            self.dropped += 1;
            return false;
        }

        let capacity = self.queue_capacity;
        match self.queues.get_mut(&to) {
            Some(queue) if queue.len() < capacity => {
                queue.push_back((from, bytes.to_vec()));
                true
            }
            Some(_) => {
                debug!("memory: queue full at {}, dropping datagram", to);
                self.dropped += 1;
                false
            }
            None => {
                trace!("memory: nothing bound at {}, dropping datagram", to);
                self.dropped += 1;
                false
            }
        }
    }

    fn allocate_port(&mut self, ip: IpAddr) -> Option<u16> {
        let span = u32::from(u16::MAX - EPHEMERAL_PORT_START) + 1;
        let cursor = u32::from(self.next_ephemeral - EPHEMERAL_PORT_START);

        for offset in 0..span {
            let port = EPHEMERAL_PORT_START + ((cursor + offset) % span) as u16;
            if !self.queues.contains_key(&SocketAddr::new(ip, port)) {
                self.next_ephemeral = if port == u16::MAX {
                    EPHEMERAL_PORT_START
                } else {
                    port + 1
                };
                return Some(port);
            }
        }
        None
    }
}

/// Shared simulated network
#[derive(Debug, Clone)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(NetworkState {
                queues: HashMap::new(),
                down: HashSet::new(),
                next_ephemeral: EPHEMERAL_PORT_START,
                queue_capacity,
                dropped: 0,
            })),
        }
    }

    /// Attach a node with the given IP
    pub fn node(&self, ip: impl Into<IpAddr>) -> MemoryTransport {
        MemoryTransport {
            network: self.clone(),
            ip: ip.into(),
        }
    }

    /// Bring a node's link up or down
    pub fn set_available(&self, ip: impl Into<IpAddr>, available: bool) {
        let ip = ip.into();
        let mut state = self.state.lock();
        if available {
            state.down.remove(&ip);
        } else {
            state.down.insert(ip);
        }
        debug!("memory: link {} {}", ip, if available { "up" } else { "down" });
    }

    pub fn is_available(&self, ip: IpAddr) -> bool {
        !self.state.lock().down.contains(&ip)
    }

    /// Deliver raw bytes as if `from` had sent them; returns whether they were queued
    pub fn inject(&self, from: SocketAddr, to: SocketAddr, bytes: &[u8]) -> bool {
        self.state.lock().deliver(from, to, bytes)
    }

    /// Datagrams waiting at `addr`
    pub fn pending(&self, addr: SocketAddr) -> usize {
        self.state.lock().queues.get(&addr).map_or(0, VecDeque::len)
    }

    /// Total datagrams dropped so far
    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// One node on a [`MemoryNetwork`]
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    network: MemoryNetwork,
    ip: IpAddr,
}

impl MemoryTransport {
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }
}

impl DatagramTransport for MemoryTransport {
    type Socket = MemorySocket;

    fn bind(&mut self, port: u16) -> Result<MemorySocket> {
        let mut state = self.network.state.lock();

        let port = if port == 0 {
            state
                .allocate_port(self.ip)
                .ok_or_else(|| TransportError::BindFailed {
                    port,
                    reason: "no ephemeral ports left".to_string(),
                })?
        } else {
            port
        };

        let local = SocketAddr::new(self.ip, port);
        if state.queues.contains_key(&local) {
            return Err(TransportError::BindFailed {
                port,
                reason: "address in use".to_string(),
            });
        }
        state.queues.insert(local, VecDeque::new());

        debug!("memory: bound {}", local);

        Ok(MemorySocket {
            network: self.network.clone(),
            local,
        })
    }

    fn is_available(&self) -> bool {
        self.network.is_available(self.ip)
    }
}

/// A socket bound on a [`MemoryNetwork`]; unbinds on drop
#[derive(Debug)]
pub struct MemorySocket {
    network: MemoryNetwork,
    local: SocketAddr,
}

impl MemorySocket {
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }
}

impl DatagramSocket for MemorySocket {
    fn local_port(&self) -> u16 {
        self.local.port()
    }

    fn try_send_to(&mut self, host: &str, port: u16, bytes: &[u8]) -> Result<()> {
        let mut ip = parse_host(host)?;
        if ip.is_loopback() {
            ip = self.local.ip();
        }

        let mut state = self.network.state.lock();
        if state.down.contains(&self.local.ip()) {
            return Err(TransportError::Unavailable);
        }
        state.deliver(self.local, SocketAddr::new(ip, port), bytes);
        Ok(())
    }

    fn try_recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        let mut state = self.network.state.lock();
        if state.down.contains(&self.local.ip()) {
            return Ok(None);
        }

        let Some((from, bytes)) = state
            .queues
            .get_mut(&self.local)
            .and_then(VecDeque::pop_front)
        else {
            return Ok(None);
        };

        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        Ok(Some((len, from)))
    }
}

impl Drop for MemorySocket {
    fn drop(&mut self) {
        self.network.state.lock().queues.remove(&self.local);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const A: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const B: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

    #[test]
    fn test_ephemeral_ports_are_distinct() {
        let net = MemoryNetwork::new();
        let mut node = net.node(A);
        let first = node.bind(0).unwrap();
        let second = node.bind(0).unwrap();
        assert_eq!(first.local_port(), EPHEMERAL_PORT_START);
        assert_ne!(first.local_port(), second.local_port());
    }

    #[test]
    fn test_bind_conflict() {
        let net = MemoryNetwork::new();
        let mut node = net.node(A);
        let _held = node.bind(9000).unwrap();
        assert!(matches!(
            node.bind(9000),
            Err(TransportError::BindFailed { port: 9000, .. })
        ));

        // same port on another node is fine
        assert!(net.node(B).bind(9000).is_ok());
    }

    #[test]
    fn test_drop_unbinds() {
        let net = MemoryNetwork::new();
        let mut node = net.node(A);
        drop(node.bind(9000).unwrap());
        assert!(node.bind(9000).is_ok());
    }

    #[test]
    fn test_send_between_nodes() {
        let net = MemoryNetwork::new();
        let mut server = net.node(A).bind(8000).unwrap();
        let mut client = net.node(B).bind(0).unwrap();

        client.try_send_to("10.0.0.1", 8000, b"ping").unwrap();
        assert_eq!(net.pending(server.local_addr()), 1);

        let mut buf = [0u8; 16];
        let (len, from) = server.try_recv_from(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..len], b"ping");
        assert_eq!(from, client.local_addr());
        assert!(server.try_recv_from(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_loopback_stays_on_node() {
        let net = MemoryNetwork::new();
        let mut node = net.node(A);
        let mut rx = node.bind(8000).unwrap();
        let mut tx = node.bind(0).unwrap();

        tx.try_send_to("localhost", 8000, b"x").unwrap();
        let mut buf = [0u8; 4];
        assert!(rx.try_recv_from(&mut buf).unwrap().is_some());
    }

    #[test]
    fn test_queue_overflow_drops() {
        let net = MemoryNetwork::with_queue_capacity(2);
        let rx = net.node(A).bind(8000).unwrap();
        let from = SocketAddr::new(B.into(), 1);

        assert!(net.inject(from, rx.local_addr(), b"1"));
        assert!(net.inject(from, rx.local_addr(), b"2"));
        assert!(!net.inject(from, rx.local_addr(), b"3"));
        assert_eq!(net.pending(rx.local_addr()), 2);
        assert_eq!(net.dropped(), 1);
    }

    #[test]
    fn test_link_down() {
        let net = MemoryNetwork::new();
        let mut node = net.node(A);
        let mut socket = node.bind(0).unwrap();

        net.set_available(A, false);
        assert!(!node.is_available());
        assert!(matches!(
            socket.try_send_to("10.0.0.2", 9000, b"x"),
            Err(TransportError::Unavailable)
        ));

        net.set_available(A, true);
        assert!(node.is_available());
        assert!(socket.try_send_to("10.0.0.2", 9000, b"x").is_ok());
    }

    #[test]
    fn test_oversized_datagram_truncated() {
        let net = MemoryNetwork::new();
        let mut rx = net.node(A).bind(8000).unwrap();
        net.inject(SocketAddr::new(B.into(), 1), rx.local_addr(), &[7u8; 32]);

        let mut buf = [0u8; 8];
        let (len, _) = rx.try_recv_from(&mut buf).unwrap().unwrap();
        assert_eq!(len, 8);
    }
}
