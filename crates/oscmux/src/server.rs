//! Inbound side of a port: subscriptions and dispatch

use std::fmt;
use std::ops::AddAssign;

use oscmux_core::{codec, AddressPattern, OscMessage, OscPacket, TypeSignature};
use oscmux_transport::DatagramSocket;
use tracing::{debug, trace, warn};

use crate::config::OscConfig;
use crate::error::{OscError, Resource, Result};

/// Callback invoked with every matching message
pub type MessageHandler = Box<dyn FnMut(&OscMessage)>;

/// Opaque handle to a registered subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u32);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

struct Subscription {
    id: SubscriptionId,
    pattern: AddressPattern,
    signature: Option<TypeSignature>,
    handler: MessageHandler,
}

impl Subscription {
    /// Invoke the handler if the message qualifies
    fn deliver(&mut self, message: &OscMessage, stats: &mut ParseStats) {
        if !self.pattern.matches(&message.address) {
            return;
        }

        if let Some(signature) = &self.signature {
            if !signature.matches(&message.args) {
                debug!(
                    "{} on {} expects {}, got {}; skipping",
                    self.id,
                    self.pattern,
                    signature,
                    message.type_tags()
                );
                stats.type_mismatches += 1;
                return;
            }
        }

        (self.handler)(message);
        stats.dispatched += 1;
    }
}

/// Counters from one `parse` or `dispatch` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Datagrams pulled off the socket
    pub datagrams: usize,
    /// Messages decoded, bundle contents included
    pub messages: usize,
    /// Handler invocations
    pub dispatched: usize,
    /// Datagrams dropped as malformed or truncated
    pub decode_failures: usize,
    /// Matching subscriptions skipped for a signature mismatch
    pub type_mismatches: usize,
    /// Socket errors; the drain stops at the first one
    pub receive_errors: usize,
}

impl AddAssign for ParseStats {
    fn add_assign(&mut self, other: Self) {
        self.datagrams += other.datagrams;
        self.messages += other.messages;
        self.dispatched += other.dispatched;
        self.decode_failures += other.decode_failures;
        self.type_mismatches += other.type_mismatches;
        self.receive_errors += other.receive_errors;
    }
}

/// Subscriptions and receive state for one local port
pub struct Server {
    port: u16,
    subscriptions: Vec<Subscription>,
    capacity: usize,
    next_id: u32,
    rx_buf: Vec<u8>,
    max_datagrams: usize,
    max_bundle_depth: usize,
}

impl Server {
    pub fn new(port: u16, config: &OscConfig) -> Self {
        Self {
            port,
            subscriptions: Vec::with_capacity(config.max_subscriptions),
            capacity: config.max_subscriptions,
            next_id: 0,
            rx_buf: vec![0; config.max_packet_size],
            max_datagrams: config.max_datagrams_per_parse,
            max_bundle_depth: config.max_bundle_depth,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Subscribed patterns in registration order
    pub fn patterns(&self) -> impl Iterator<Item = &str> + '_ {
        self.subscriptions.iter().map(|s| s.pattern.as_str())
    }

    /// Register a handler for addresses matching `pattern`
    ///
    /// With a `signature`, messages whose argument types differ are skipped
    /// for this subscription only.
    pub fn subscribe<F>(
        &mut self,
        pattern: &str,
        signature: Option<TypeSignature>,
        handler: F,
    ) -> Result<SubscriptionId>
    where
        F: FnMut(&OscMessage) + 'static,
    {
        let pattern = AddressPattern::parse(pattern)?;

        if self.subscriptions.len() >= self.capacity {
            warn!(
                "port {}: subscription to {} rejected, {} of {} in use",
                self.port,
                pattern,
                self.subscriptions.len(),
                self.capacity
            );
            return Err(OscError::CapacityExceeded {
                resource: Resource::Subscriptions,
                capacity: self.capacity,
            });
        }

        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        debug!("port {}: {} subscribed to {}", self.port, id, pattern);

        self.subscriptions.push(Subscription {
            id,
            pattern,
            signature,
            handler: Box::new(handler),
        });
        Ok(id)
    }

    /// Remove a subscription; later registrations keep their order
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        match self.subscriptions.iter().position(|s| s.id == id) {
            Some(index) => {
                let removed = self.subscriptions.remove(index);
                debug!("port {}: {} unsubscribed from {}", self.port, id, removed.pattern);
                true
            }
            None => false,
        }
    }

    /// Drain and dispatch up to `max_datagrams_per_parse` queued datagrams
    pub fn parse<S: DatagramSocket>(&mut self, socket: &mut S) -> ParseStats {
        let mut stats = ParseStats::default();

        for _ in 0..self.max_datagrams {
            let (len, from) = match socket.try_recv_from(&mut self.rx_buf) {
                Ok(Some(datagram)) => datagram,
                Ok(None) => break,
                Err(e) => {
                    warn!("port {}: receive failed: {}", self.port, e);
                    stats.receive_errors += 1;
                    break;
                }
            };
            stats.datagrams += 1;

            // a full buffer means the datagram may have been cut short
            if len >= self.rx_buf.len() {
                warn!(
                    "port {}: datagram from {} fills the {} byte buffer, dropping",
                    self.port,
                    from,
                    self.rx_buf.len()
                );
                stats.decode_failures += 1;
                continue;
            }

            match codec::decode_with_depth(&self.rx_buf[..len], self.max_bundle_depth) {
                Ok(packet) => {
                    trace!("port {}: {} bytes from {}", self.port, len, from);
                    self.dispatch_into(&packet, &mut stats);
                }
                Err(e) => {
                    debug!("port {}: dropping malformed datagram from {}: {}", self.port, from, e);
                    stats.decode_failures += 1;
                }
            }
        }

        stats
    }

    /// Decode and dispatch bytes that were received elsewhere
    pub fn dispatch_bytes(&mut self, bytes: &[u8]) -> ParseStats {
        let mut stats = ParseStats {
            datagrams: 1,
            ..Default::default()
        };
        match codec::decode_with_depth(bytes, self.max_bundle_depth) {
            Ok(packet) => self.dispatch_into(&packet, &mut stats),
            Err(e) => {
                debug!("port {}: dropping malformed packet: {}", self.port, e);
                stats.decode_failures += 1;
            }
        }
        stats
    }

    /// Dispatch an already decoded packet
    pub fn dispatch(&mut self, packet: &OscPacket) -> ParseStats {
        let mut stats = ParseStats::default();
        self.dispatch_into(packet, &mut stats);
        stats
    }

    fn dispatch_into(&mut self, packet: &OscPacket, stats: &mut ParseStats) {
        match packet {
            OscPacket::Message(message) => self.dispatch_message(message, stats),
            OscPacket::Bundle(bundle) => {
                // bundles are delivered on arrival whatever their time tag says
                if !bundle.timetag.is_immediate() {
                    trace!(
                        "port {}: delivering bundle tagged {:?} immediately",
                        self.port,
                        bundle.timetag
                    );
                }
                for message in bundle.messages() {
                    self.dispatch_message(message, stats);
                }
            }
        }
    }

    fn dispatch_message(&mut self, message: &OscMessage, stats: &mut ParseStats) {
        stats.messages += 1;
        for subscription in &mut self.subscriptions {
            subscription.deliver(message, stats);
        }
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("port", &self.port)
            .field("patterns", &self.patterns().collect::<Vec<_>>())
            .field("capacity", &self.capacity)
            .finish()
    }
}
