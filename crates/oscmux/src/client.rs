//! Outbound side of a port: immediate sends and the publish scheduler

use std::fmt;
use std::ops::AddAssign;

use bytes::BytesMut;
use oscmux_core::{codec, validate_address, IntoOscArgs, OscMessage, OscPacket, OscValue};
use oscmux_transport::DatagramSocket;
use tracing::{debug, trace, warn};

use crate::config::OscConfig;
use crate::error::{OscError, Resource, Result};

/// Where a publish entry gets its arguments from
pub enum ValueSource {
    /// The same arguments every time
    Fixed(Vec<OscValue>),
    /// Re-evaluated at each send
    Producer(Box<dyn FnMut() -> Vec<OscValue>>),
}

impl ValueSource {
    pub fn fixed(args: impl IntoOscArgs) -> Self {
        ValueSource::Fixed(args.into_osc_args())
    }

    pub fn producer<F, A>(mut produce: F) -> Self
    where
        F: FnMut() -> A + 'static,
        A: IntoOscArgs,
    {
        ValueSource::Producer(Box::new(move || produce().into_osc_args()))
    }

    fn current(&mut self) -> Vec<OscValue> {
        match self {
            ValueSource::Fixed(args) => args.clone(),
            ValueSource::Producer(produce) => produce(),
        }
    }
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Fixed(args) => f.debug_tuple("Fixed").field(args).finish(),
            ValueSource::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Handle to a publish entry
///
/// Stays valid until the entry is removed. After that every operation
/// through it is a no-op, even if the slot has been reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublishRef {
    port: u16,
    slot: u32,
    generation: u32,
}

impl PublishRef {
    /// Local port of the client that owns the entry
    pub fn port(&self) -> u16 {
        self.port
    }
}

/// A scheduled, possibly repeating, outbound message
#[derive(Debug)]
pub struct PublishEntry {
    host: String,
    port: u16,
    address: String,
    source: ValueSource,
    interval_ms: u64,
    last_sent: Option<u64>,
    enabled: bool,
    one_shot: bool,
}

impl PublishEntry {
    pub fn destination(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Clock reading of the last successful send
    pub fn last_sent(&self) -> Option<u64> {
        self.last_sent
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Removed after its first successful send
    pub fn is_one_shot(&self) -> bool {
        self.one_shot
    }

    /// Fixed arguments, or `None` for a producer
    pub fn value(&self) -> Option<&[OscValue]> {
        match &self.source {
            ValueSource::Fixed(args) => Some(args),
            ValueSource::Producer(_) => None,
        }
    }

    pub fn set_value(&mut self, args: impl IntoOscArgs) {
        self.source = ValueSource::fixed(args);
    }

    pub fn set_producer<F, A>(&mut self, produce: F)
    where
        F: FnMut() -> A + 'static,
        A: IntoOscArgs,
    {
        self.source = ValueSource::producer(produce);
    }

    pub fn set_source(&mut self, source: ValueSource) {
        self.source = source;
    }

    pub fn set_interval(&mut self, interval_ms: u64) {
        self.interval_ms = interval_ms;
    }

    /// Set the interval from a rate in Hz; non-positive rates are ignored
    pub fn set_frame_rate(&mut self, fps: f32) {
        if fps.is_finite() && fps > 0.0 {
            self.interval_ms = (1000.0 / fps).round() as u64;
        } else {
            warn!("ignoring frame rate {} for {}", fps, self.address);
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_due(&self, now_ms: u64) -> bool {
        match self.last_sent {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        }
    }

    fn targets(&self, host: &str, port: u16, address: &str) -> bool {
        self.port == port && self.address == address && self.host == host
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<PublishEntry>,
}

/// Counters from one `post` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostStats {
    pub sent: usize,
    pub failed: usize,
    /// One-shot entries retired after sending
    pub retired: usize,
}

impl AddAssign for PostStats {
    fn add_assign(&mut self, other: Self) {
        self.sent += other.sent;
        self.failed += other.failed;
        self.retired += other.retired;
    }
}

/// Publish schedule and transmit state for one local port
#[derive(Debug)]
pub struct Client {
    port: u16,
    slots: Vec<Slot>,
    len: usize,
    capacity: usize,
    tx_buf: BytesMut,
    max_packet_size: usize,
}

impl Client {
    pub fn new(port: u16, config: &OscConfig) -> Self {
        Self {
            port,
            slots: Vec::with_capacity(config.max_publications),
            len: 0,
            capacity: config.max_publications,
            tx_buf: BytesMut::with_capacity(config.max_packet_size),
            max_packet_size: config.max_packet_size,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Live publish entries
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Encode and send a packet right away
    pub fn send<S: DatagramSocket>(
        &mut self,
        socket: &mut S,
        host: &str,
        port: u16,
        packet: &OscPacket,
    ) -> Result<()> {
        transmit(
            &mut self.tx_buf,
            self.max_packet_size,
            socket,
            host,
            port,
            packet,
        )
    }

    /// Schedule `address` to be sent to `host:port` every `interval_ms`
    ///
    /// An interval of 0 sends once on the next `post` and then retires the entry.
    pub fn publish(
        &mut self,
        host: &str,
        port: u16,
        address: &str,
        source: ValueSource,
        interval_ms: u64,
    ) -> Result<PublishRef> {
        validate_address(address)?;

        if self.len >= self.capacity {
            warn!(
                "port {}: publish of {} rejected, {} of {} in use",
                self.port, address, self.len, self.capacity
            );
            return Err(OscError::CapacityExceeded {
                resource: Resource::Publications,
                capacity: self.capacity,
            });
        }

        let entry = PublishEntry {
            host: host.to_string(),
            port,
            address: address.to_string(),
            source,
            interval_ms,
            last_sent: None,
            enabled: true,
            one_shot: interval_ms == 0,
        };

        let index = match self.slots.iter().position(|s| s.entry.is_none()) {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.entry = Some(entry);
        self.len += 1;

        debug!(
            "port {}: publishing {} to {}:{} every {} ms",
            self.port, address, host, port, interval_ms
        );

        Ok(PublishRef {
            port: self.port,
            slot: index as u32,
            generation: slot.generation,
        })
    }

    /// Handle of the first live entry sending `address` to `host:port`
    pub fn find(&self, host: &str, port: u16, address: &str) -> Option<PublishRef> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            slot.entry
                .as_ref()
                .filter(|e| e.targets(host, port, address))
                .map(|_| PublishRef {
                    port: self.port,
                    slot: index as u32,
                    generation: slot.generation,
                })
        })
    }

    pub fn get(&self, handle: PublishRef) -> Option<&PublishEntry> {
        self.slot(handle)
            .and_then(|index| self.slots[index].entry.as_ref())
    }

    pub fn get_mut(&mut self, handle: PublishRef) -> Option<&mut PublishEntry> {
        self.slot(handle)
            .and_then(|index| self.slots[index].entry.as_mut())
    }

    /// Remove an entry; false for a stale handle
    pub fn remove(&mut self, handle: PublishRef) -> bool {
        match self.slot(handle) {
            Some(index) if self.slots[index].entry.is_some() => {
                self.retire(index);
                true
            }
            _ => false,
        }
    }

    /// Live entries in slot order
    pub fn entries(&self) -> impl Iterator<Item = &PublishEntry> + '_ {
        self.slots.iter().filter_map(|s| s.entry.as_ref())
    }

    /// Send every enabled entry whose interval has elapsed at `now_ms`
    ///
    /// The next interval is measured from `now_ms`, not from the ideal
    /// schedule. A failed send keeps the entry and its `last_sent`, so it is
    /// retried on the next call.
    pub fn post<S: DatagramSocket>(&mut self, socket: &mut S, now_ms: u64) -> PostStats {
        let mut stats = PostStats::default();

        for index in 0..self.slots.len() {
            let Some(entry) = self.slots[index].entry.as_mut() else {
                continue;
            };
            if !entry.enabled || !entry.is_due(now_ms) {
                continue;
            }

            let args = entry.source.current();
            let packet = OscPacket::Message(OscMessage::with_args(entry.address.clone(), args));

            match transmit(
                &mut self.tx_buf,
                self.max_packet_size,
                socket,
                &entry.host,
                entry.port,
                &packet,
            ) {
                Ok(()) => {
                    entry.last_sent = Some(now_ms);
                    stats.sent += 1;
                    if entry.one_shot {
                        self.retire(index);
                        stats.retired += 1;
                    }
                }
                Err(e) => {
                    debug!(
                        "port {}: publish of {} to {}:{} failed: {}",
                        self.port, entry.address, entry.host, entry.port, e
                    );
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    fn slot(&self, handle: PublishRef) -> Option<usize> {
        let index = handle.slot as usize;
        (handle.port == self.port
            && self
                .slots
                .get(index)
                .is_some_and(|s| s.generation == handle.generation))
        .then_some(index)
    }

    fn retire(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        if let Some(entry) = slot.entry.take() {
            trace!("port {}: retired publish of {}", self.port, entry.address);
            slot.generation = slot.generation.wrapping_add(1);
            self.len -= 1;
        }
    }
}

fn transmit<S: DatagramSocket>(
    buf: &mut BytesMut,
    limit: usize,
    socket: &mut S,
    host: &str,
    port: u16,
    packet: &OscPacket,
) -> Result<()> {
    let size = codec::encoded_len(packet);
    if size > limit {
        return Err(OscError::PacketTooLarge { size, limit });
    }

    buf.clear();
    codec::encode_into(buf, packet)?;
    socket.try_send_to(host, port, &buf[..])?;

    trace!("sent {} bytes to {}:{}", size, host, port);
    Ok(())
}
