//! The host-facing facade
//!
//! An [`OscContext`] bundles the socket, server and client registries with
//! a clock. The host builds one, registers subscriptions and publications,
//! and calls [`OscContext::update`] on every pass of its loop.

use oscmux_core::{
    validate_address, AddressPattern, Clock, FromOscArgs, IntoOscArgs, MonotonicClock, OscMessage,
    OscPacket, TypeSignature,
};
use oscmux_transport::DatagramTransport;
use tracing::{debug, warn};

use crate::client::{Client, PostStats, PublishEntry, PublishRef, ValueSource};
use crate::config::OscConfig;
use crate::error::{OscError, Resource, Result};
use crate::registry::{ClientRegistry, ServerRegistry, SocketRegistry};
use crate::server::{ParseStats, Server, SubscriptionId};

/// Counters from one `update`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub parse: ParseStats,
    pub post: PostStats,
}

/// OSC servers and clients multiplexed over one transport
pub struct OscContext<T: DatagramTransport, C: Clock = MonotonicClock> {
    config: OscConfig,
    clock: C,
    sockets: SocketRegistry<T>,
    servers: ServerRegistry,
    clients: ClientRegistry,
    default_client_port: Option<u16>,
}

impl<T: DatagramTransport> OscContext<T> {
    pub fn new(transport: T, config: OscConfig) -> Result<Self> {
        Self::with_clock(transport, config, MonotonicClock::new())
    }
}

impl<T: DatagramTransport, C: Clock> OscContext<T, C> {
    pub fn with_clock(transport: T, config: OscConfig, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sockets: SocketRegistry::new(transport, config.max_ports),
            servers: ServerRegistry::new(),
            clients: ClientRegistry::new(),
            default_client_port: (config.client_port != 0).then_some(config.client_port),
            clock,
            config,
        })
    }

    pub fn config(&self) -> &OscConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn transport(&self) -> &T {
        self.sockets.transport()
    }

    pub fn is_available(&self) -> bool {
        self.sockets.is_available()
    }

    /// Bound local ports in ascending order
    pub fn ports(&self) -> Vec<u16> {
        self.sockets.ports().collect()
    }

    pub fn server(&self, port: u16) -> Option<&Server> {
        self.servers.get(port)
    }

    pub fn client(&self, port: u16) -> Option<&Client> {
        self.clients.get(port)
    }

    /// Local port used by `send` and `publish`, binding it if needed
    pub fn default_client_port(&mut self) -> Result<u16> {
        match self.default_client_port {
            Some(port) => {
                self.sockets.socket_mut(port)?;
                Ok(port)
            }
            None => {
                let port = self.sockets.bind_ephemeral()?;
                self.default_client_port = Some(port);
                Ok(port)
            }
        }
    }

    /// Port 0 stands for the default client port
    fn resolve_client_port(&mut self, local_port: u16) -> Result<u16> {
        match local_port {
            0 => self.default_client_port(),
            port => Ok(port),
        }
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Call `handler` for every message on `port` matching `pattern`
    pub fn subscribe<F>(&mut self, port: u16, pattern: &str, handler: F) -> Result<SubscriptionId>
    where
        F: FnMut(&OscMessage) + 'static,
    {
        self.subscribe_with(port, pattern, None, handler)
    }

    /// Like [`subscribe`](Self::subscribe), skipping messages whose argument
    /// types differ from `signature` (e.g. `"if"`)
    pub fn subscribe_typed<F>(
        &mut self,
        port: u16,
        pattern: &str,
        signature: &str,
        handler: F,
    ) -> Result<SubscriptionId>
    where
        F: FnMut(&OscMessage) + 'static,
    {
        let signature = TypeSignature::parse(signature)?;
        self.subscribe_with(port, pattern, Some(signature), handler)
    }

    /// Subscribe with a handler taking typed arguments
    ///
    /// The expected signature comes from `A`, so `FnMut((i32, f32))` only
    /// sees messages tagged `,if`.
    pub fn subscribe_args<A, F>(
        &mut self,
        port: u16,
        pattern: &str,
        mut handler: F,
    ) -> Result<SubscriptionId>
    where
        A: FromOscArgs,
        F: FnMut(A) + 'static,
    {
        self.subscribe_with(port, pattern, Some(A::signature()), move |message| {
            if let Some(args) = A::from_osc_args(&message.args) {
                handler(args);
            }
        })
    }

    pub fn unsubscribe(&mut self, port: u16, id: SubscriptionId) -> bool {
        self.servers
            .get_mut(port)
            .is_some_and(|server| server.unsubscribe(id))
    }

    fn subscribe_with<F>(
        &mut self,
        port: u16,
        pattern: &str,
        signature: Option<TypeSignature>,
        handler: F,
    ) -> Result<SubscriptionId>
    where
        F: FnMut(&OscMessage) + 'static,
    {
        if port == 0 {
            return Err(OscError::Config(
                "servers need a fixed port, not 0".to_string(),
            ));
        }
        // a rejected subscription must not bind the port
        AddressPattern::parse(pattern)?;
        if let Some(server) = self.servers.get(port) {
            if server.len() >= server.capacity() {
                return Err(OscError::CapacityExceeded {
                    resource: Resource::Subscriptions,
                    capacity: server.capacity(),
                });
            }
        }
        self.sockets.socket_mut(port)?;

        let config = &self.config;
        self.servers
            .get_or_insert_with(port, || Server::new(port, config))
            .subscribe(pattern, signature, handler)
    }

    // ------------------------------------------------------------------
    // Immediate sends
    // ------------------------------------------------------------------

    /// Send one message from the default client port
    pub fn send(
        &mut self,
        host: &str,
        port: u16,
        address: &str,
        args: impl IntoOscArgs,
    ) -> Result<()> {
        let local_port = self.default_client_port()?;
        self.send_from(local_port, host, port, address, args)
    }

    /// Send one message from a specific local port (0 for the default)
    pub fn send_from(
        &mut self,
        local_port: u16,
        host: &str,
        port: u16,
        address: &str,
        args: impl IntoOscArgs,
    ) -> Result<()> {
        validate_address(address)?;
        let packet = OscPacket::Message(OscMessage::with_args(address, args.into_osc_args()));
        self.send_packet(local_port, host, port, &packet)
    }

    /// Send a prepared packet, bundles included
    pub fn send_packet(
        &mut self,
        local_port: u16,
        host: &str,
        port: u16,
        packet: &OscPacket,
    ) -> Result<()> {
        if !self.sockets.is_available() {
            warn!("network unavailable, not sending to {}:{}", host, port);
            return Err(OscError::TransportUnavailable);
        }

        let local_port = self.resolve_client_port(local_port)?;
        let socket = self.sockets.socket_mut(local_port)?;
        let config = &self.config;
        self.clients
            .get_or_insert_with(local_port, || Client::new(local_port, config))
            .send(socket, host, port, packet)
    }

    // ------------------------------------------------------------------
    // Scheduled publishing
    // ------------------------------------------------------------------

    /// Schedule a message from the default client port
    ///
    /// `interval_ms` of 0 sends once on the next `post`.
    pub fn publish(
        &mut self,
        host: &str,
        port: u16,
        address: &str,
        source: ValueSource,
        interval_ms: u64,
    ) -> Result<PublishRef> {
        let local_port = self.default_client_port()?;
        self.publish_from(local_port, host, port, address, source, interval_ms)
    }

    /// Schedule a message from a specific local port (0 for the default)
    pub fn publish_from(
        &mut self,
        local_port: u16,
        host: &str,
        port: u16,
        address: &str,
        source: ValueSource,
        interval_ms: u64,
    ) -> Result<PublishRef> {
        if !self.sockets.is_available() {
            warn!("network unavailable, not publishing {}", address);
            return Err(OscError::TransportUnavailable);
        }

        validate_address(address)?;
        let local_port = self.resolve_client_port(local_port)?;
        if let Some(client) = self.clients.get(local_port) {
            if client.len() >= client.capacity() {
                return Err(OscError::CapacityExceeded {
                    resource: Resource::Publications,
                    capacity: client.capacity(),
                });
            }
        }
        self.sockets.socket_mut(local_port)?;
        let config = &self.config;
        self.clients
            .get_or_insert_with(local_port, || Client::new(local_port, config))
            .publish(host, port, address, source, interval_ms)
    }

    /// Handle of an existing publication of `address` to `host:port`
    pub fn publish_ref(&self, host: &str, port: u16, address: &str) -> Option<PublishRef> {
        self.clients
            .iter()
            .find_map(|(_, client)| client.find(host, port, address))
    }

    pub fn publication(&self, handle: PublishRef) -> Option<&PublishEntry> {
        self.clients.get(handle.port())?.get(handle)
    }

    pub fn publication_mut(&mut self, handle: PublishRef) -> Option<&mut PublishEntry> {
        self.clients.get_mut(handle.port())?.get_mut(handle)
    }

    /// False when the handle is stale
    pub fn set_publish_enabled(&mut self, handle: PublishRef, enabled: bool) -> bool {
        self.update_publication(handle, |entry| entry.set_enabled(enabled))
    }

    /// False when the handle is stale
    pub fn set_publish_interval(&mut self, handle: PublishRef, interval_ms: u64) -> bool {
        self.update_publication(handle, |entry| entry.set_interval(interval_ms))
    }

    /// False when the handle is stale
    pub fn set_publish_value(&mut self, handle: PublishRef, args: impl IntoOscArgs) -> bool {
        self.update_publication(handle, |entry| entry.set_value(args))
    }

    fn update_publication(
        &mut self,
        handle: PublishRef,
        change: impl FnOnce(&mut PublishEntry),
    ) -> bool {
        match self.publication_mut(handle) {
            Some(entry) => {
                change(entry);
                true
            }
            None => false,
        }
    }

    pub fn unpublish(&mut self, handle: PublishRef) -> bool {
        self.clients
            .get_mut(handle.port())
            .is_some_and(|client| client.remove(handle))
    }

    // ------------------------------------------------------------------
    // Update loop
    // ------------------------------------------------------------------

    /// Drain and dispatch inbound datagrams on every server port
    pub fn parse(&mut self) -> Result<ParseStats> {
        if !self.sockets.is_available() {
            return Err(OscError::TransportUnavailable);
        }

        let mut stats = ParseStats::default();
        for (port, server) in self.servers.iter_mut() {
            match self.sockets.get_mut(port) {
                Some(socket) => stats += server.parse(socket),
                None => warn!("server on port {} has no socket", port),
            }
        }
        Ok(stats)
    }

    /// Send every publication that is due
    pub fn post(&mut self) -> Result<PostStats> {
        if !self.sockets.is_available() {
            return Err(OscError::TransportUnavailable);
        }

        let now = self.clock.now_ms();
        let mut stats = PostStats::default();
        for (port, client) in self.clients.iter_mut() {
            match self.sockets.get_mut(port) {
                Some(socket) => stats += client.post(socket, now),
                None => warn!("client on port {} has no socket", port),
            }
        }
        Ok(stats)
    }

    /// `parse` then `post`; call this on every pass of the host loop
    pub fn update(&mut self) -> Result<UpdateStats> {
        let stats = UpdateStats {
            parse: self.parse()?,
            post: self.post()?,
        };
        if stats.parse.decode_failures > 0 {
            debug!("dropped {} malformed datagrams", stats.parse.decode_failures);
        }
        Ok(stats)
    }
}
