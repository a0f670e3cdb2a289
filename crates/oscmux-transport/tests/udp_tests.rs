//! UDP Transport Tests (oscmux-transport)
//!
//! Tests for the UDP backend:
//! - Binding and local address
//! - Non-blocking send/receive
//! - Truncation of oversized datagrams
//! - Host resolution without DNS

use oscmux_transport::{
    DatagramSocket, DatagramTransport, TransportError, UdpConfig, UdpSocketHandle, UdpTransport,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::thread;
use std::time::Duration;

// ============================================================================
// Utilities
// ============================================================================

fn loopback_transport() -> UdpTransport {
    UdpTransport::with_config(UdpConfig {
        bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        ..Default::default()
    })
}

/// Poll a non-blocking socket until a datagram shows up
fn recv_within(
    socket: &mut UdpSocketHandle,
    buf: &mut [u8],
    timeout: Duration,
) -> Option<(usize, SocketAddr)> {
    let step = Duration::from_millis(2);
    let mut waited = Duration::ZERO;
    while waited < timeout {
        if let Some(datagram) = socket.try_recv_from(buf).expect("receive failed") {
            return Some(datagram);
        }
        thread::sleep(step);
        waited += step;
    }
    None
}

// ============================================================================
// Basic Binding Tests
// ============================================================================

#[test]
fn test_udp_bind_ephemeral() {
    let socket = loopback_transport().bind(0).expect("Bind should succeed");
    assert!(socket.local_port() > 0, "Port should be > 0");
    assert_eq!(socket.local_addr().ip(), Ipv4Addr::LOCALHOST);
}

#[test]
fn test_udp_bind_with_config() {
    let config = UdpConfig {
        bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        broadcast: true,
        reuse_address: true,
        recv_buffer_size: Some(64 * 1024),
        send_buffer_size: Some(64 * 1024),
    };

    let socket = UdpTransport::with_config(config)
        .bind(0)
        .expect("Bind with config should succeed");
    assert!(socket.local_port() > 0);
}

#[test]
fn test_udp_bind_conflict() {
    let mut transport = loopback_transport();
    let held = transport.bind(0).unwrap();

    match transport.bind(held.local_port()) {
        Err(TransportError::BindFailed { port, .. }) => assert_eq!(port, held.local_port()),
        other => panic!("Expected BindFailed, got {:?}", other),
    }
}

// ============================================================================
// Send/Receive Tests
// ============================================================================

#[test]
fn test_udp_send_receive() {
    let mut transport = loopback_transport();
    let mut server = transport.bind(0).unwrap();
    let mut client = transport.bind(0).unwrap();

    client
        .try_send_to("127.0.0.1", server.local_port(), b"/ping\0\0\0")
        .expect("Send should succeed");

    let mut buf = [0u8; 1500];
    let (len, from) =
        recv_within(&mut server, &mut buf, Duration::from_secs(2)).expect("Should receive");
    assert_eq!(&buf[..len], b"/ping\0\0\0");
    assert_eq!(from.port(), client.local_port());
}

#[test]
fn test_udp_localhost_name() {
    let mut transport = loopback_transport();
    let mut server = transport.bind(0).unwrap();
    let mut client = transport.bind(0).unwrap();

    client
        .try_send_to("localhost", server.local_port(), b"hi")
        .unwrap();

    let mut buf = [0u8; 16];
    assert!(recv_within(&mut server, &mut buf, Duration::from_secs(2)).is_some());
}

#[test]
fn test_udp_recv_returns_none_when_idle() {
    let mut socket = loopback_transport().bind(0).unwrap();
    let mut buf = [0u8; 16];
    assert!(socket.try_recv_from(&mut buf).unwrap().is_none());
}

#[test]
fn test_udp_datagrams_stay_separate() {
    let mut transport = loopback_transport();
    let mut server = transport.bind(0).unwrap();
    let mut client = transport.bind(0).unwrap();

    for i in 0u8..5 {
        client
            .try_send_to("127.0.0.1", server.local_port(), &[i; 8])
            .unwrap();
    }

    let mut buf = [0u8; 64];
    for i in 0u8..5 {
        let (len, _) = recv_within(&mut server, &mut buf, Duration::from_secs(2))
            .expect("Should receive every datagram on loopback");
        assert_eq!(&buf[..len], &[i; 8]);
    }
}

#[cfg(unix)]
#[test]
fn test_udp_oversized_datagram_fills_buffer() {
    let mut transport = loopback_transport();
    let mut server = transport.bind(0).unwrap();
    let mut client = transport.bind(0).unwrap();

    client
        .try_send_to("127.0.0.1", server.local_port(), &[0xAB; 256])
        .unwrap();

    let mut buf = [0u8; 64];
    let (len, _) = recv_within(&mut server, &mut buf, Duration::from_secs(2))
        .expect("Should receive truncated datagram");
    assert_eq!(len, buf.len());
}

// ============================================================================
// Host Resolution Tests
// ============================================================================

#[test]
fn test_udp_rejects_hostnames() {
    let mut socket = loopback_transport().bind(0).unwrap();
    let result = socket.try_send_to("example.com", 9000, b"x");
    assert!(matches!(result, Err(TransportError::InvalidHost(_))));
}
