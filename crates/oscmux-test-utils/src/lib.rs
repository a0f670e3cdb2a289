//! Common test helpers and utilities for oscmux tests
//!
//! This crate provides:
//! - Port allocation for real UDP tests
//! - Condition-based waiting (no hardcoded sleeps)
//! - Simulated networks with a shared manual clock
//! - Message collectors for subscription testing

use oscmux::{
    ManualClock, MemoryNetwork, MemoryTransport, OscConfig, OscContext, OscMessage, OscValue,
};
use parking_lot::Mutex;
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(2);

// ============================================================================
// Port Allocation
// ============================================================================

/// Find an available UDP port for testing
pub fn find_available_udp_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Poll `check` until it returns true or `max_wait` elapses
pub fn wait_for<F>(mut check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check() {
            return true;
        }
        thread::sleep(interval);
    }
    check()
}

// ============================================================================
// Simulated Network
// ============================================================================

/// A [`MemoryNetwork`] whose contexts all share one manual clock
pub struct TestNetwork {
    network: MemoryNetwork,
    clock: ManualClock,
}

/// Context type produced by [`TestNetwork`]
pub type TestContext = OscContext<MemoryTransport, ManualClock>;

impl TestNetwork {
    pub fn new() -> Self {
        Self {
            network: MemoryNetwork::new(),
            clock: ManualClock::new(0),
        }
    }

    /// Context for a node at `10.0.0.<host>` with default configuration
    pub fn context(&self, host: u8) -> TestContext {
        self.context_with_config(host, OscConfig::default())
    }

    pub fn context_with_config(&self, host: u8, config: OscConfig) -> TestContext {
        OscContext::with_clock(
            self.network.node(Self::ip(host)),
            config,
            self.clock.clone(),
        )
        .unwrap()
    }

    /// Address of node `host`
    pub fn ip(host: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, host)
    }

    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Move the shared clock to `ms`
    pub fn set_time(&self, ms: u64) {
        self.clock.set(ms);
    }
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Test Collectors - for verifying received messages
// ============================================================================

/// Collector for dispatched messages
#[derive(Clone, Default)]
pub struct MessageCollector {
    messages: Arc<Mutex<Vec<OscMessage>>>,
}

impl MessageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handler for subscriptions
    pub fn callback(&self) -> impl FnMut(&OscMessage) + 'static {
        let messages = self.messages.clone();
        move |message: &OscMessage| messages.lock().push(message.clone())
    }

    pub fn count(&self) -> usize {
        self.messages.lock().len()
    }

    /// Get all collected messages
    pub fn messages(&self) -> Vec<OscMessage> {
        self.messages.lock().clone()
    }

    /// Addresses in arrival order
    pub fn addresses(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .map(|m| m.address.clone())
            .collect()
    }

    /// Arguments of every message sent to `address`
    pub fn args_for(&self, address: &str) -> Vec<Vec<OscValue>> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.address == address)
            .map(|m| m.args.clone())
            .collect()
    }
}
