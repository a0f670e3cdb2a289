//! Port-keyed ownership of sockets, servers and clients
//!
//! A server and a client on the same port share one socket: the server only
//! receives on it and the client only sends.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use oscmux_transport::{DatagramSocket, DatagramTransport};
use tracing::info;

use crate::client::Client;
use crate::error::{OscError, Resource, Result};
use crate::server::Server;

/// Owns the transport and at most one socket per local port
pub struct SocketRegistry<T: DatagramTransport> {
    transport: T,
    sockets: BTreeMap<u16, T::Socket>,
    max_ports: usize,
}

impl<T: DatagramTransport> SocketRegistry<T> {
    pub fn new(transport: T, max_ports: usize) -> Self {
        Self {
            transport,
            sockets: BTreeMap::new(),
            max_ports,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_available(&self) -> bool {
        self.transport.is_available()
    }

    pub fn contains(&self, port: u16) -> bool {
        self.sockets.contains_key(&port)
    }

    /// Bound ports in ascending order
    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.sockets.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    /// Socket for `port`, binding it on first use
    ///
    /// Port 0 always binds a fresh ephemeral port; use the returned
    /// socket's `local_port` as its key afterwards.
    pub fn socket_mut(&mut self, port: u16) -> Result<&mut T::Socket> {
        let port = if port == 0 { self.bind_ephemeral()? } else { port };

        let full = self.sockets.len() >= self.max_ports;
        match self.sockets.entry(port) {
            btree_map::Entry::Occupied(entry) => Ok(entry.into_mut()),
            btree_map::Entry::Vacant(entry) => {
                if full {
                    return Err(OscError::CapacityExceeded {
                        resource: Resource::Ports,
                        capacity: self.max_ports,
                    });
                }
                let socket = self.transport.bind(port)?;
                info!("bound OSC port {}", port);
                Ok(entry.insert(socket))
            }
        }
    }

    /// Bind an ephemeral port and return the port number it got
    pub fn bind_ephemeral(&mut self) -> Result<u16> {
        if self.sockets.len() >= self.max_ports {
            return Err(OscError::CapacityExceeded {
                resource: Resource::Ports,
                capacity: self.max_ports,
            });
        }
        let socket = self.transport.bind(0)?;
        let port = socket.local_port();
        info!("bound ephemeral OSC port {}", port);
        self.sockets.insert(port, socket);
        Ok(port)
    }

    /// Socket already bound on `port`
    pub fn get_mut(&mut self, port: u16) -> Option<&mut T::Socket> {
        self.sockets.get_mut(&port)
    }
}

impl<T: DatagramTransport> fmt::Debug for SocketRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketRegistry")
            .field("ports", &self.sockets.keys().collect::<Vec<_>>())
            .field("max_ports", &self.max_ports)
            .finish()
    }
}

/// Values keyed by local port, iterated in ascending port order
#[derive(Debug)]
pub struct PortRegistry<V> {
    entries: BTreeMap<u16, V>,
}

/// Servers by port
pub type ServerRegistry = PortRegistry<Server>;

/// Clients by port
pub type ClientRegistry = PortRegistry<Client>;

impl<V> PortRegistry<V> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Existing value for `port`, or one built by `create`
    pub fn get_or_insert_with(&mut self, port: u16, create: impl FnOnce() -> V) -> &mut V {
        self.entries.entry(port).or_insert_with(create)
    }

    pub fn get(&self, port: u16) -> Option<&V> {
        self.entries.get(&port)
    }

    pub fn get_mut(&mut self, port: u16) -> Option<&mut V> {
        self.entries.get_mut(&port)
    }

    pub fn contains(&self, port: u16) -> bool {
        self.entries.contains_key(&port)
    }

    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &V)> + '_ {
        self.entries.iter().map(|(port, v)| (*port, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u16, &mut V)> + '_ {
        self.entries.iter_mut().map(|(port, v)| (*port, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for PortRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}
