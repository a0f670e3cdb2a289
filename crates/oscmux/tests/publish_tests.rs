//! Publish Tests
//!
//! Scheduled sending through the context:
//! - Interval scheduling anchored to actual send time
//! - Producers, one-shots and per-entry mutation
//! - Handle lookup and staleness
//! - Capacity limits

use oscmux::{OscConfig, OscError, OscValue, Resource, ValueSource};
use oscmux_test_utils::{MessageCollector, TestContext, TestNetwork};
use std::cell::Cell;
use std::rc::Rc;

const DEVICE: u8 = 1;
const CONSOLE: u8 = 2;
const PORT: u16 = 9000;

/// Console publishing to a device that records every single-segment address
fn setup(net: &TestNetwork) -> (TestContext, TestContext, MessageCollector) {
    let mut device = net.context(DEVICE);
    let console = net.context(CONSOLE);
    let collector = MessageCollector::new();
    device.subscribe(PORT, "/*", collector.callback()).unwrap();
    (device, console, collector)
}

#[test]
fn test_interval_schedule() {
    let net = TestNetwork::new();
    let (mut device, mut console, collector) = setup(&net);

    let handle = console
        .publish("10.0.0.1", PORT, "/tick", ValueSource::fixed((1i32,)), 100)
        .unwrap();

    net.set_time(0);
    assert_eq!(console.post().unwrap().sent, 1);
    net.set_time(50);
    assert_eq!(console.post().unwrap().sent, 0);
    net.set_time(101);
    assert_eq!(console.post().unwrap().sent, 1);

    // next interval counts from 101, not 100
    assert_eq!(console.publication(handle).unwrap().last_sent(), Some(101));
    net.set_time(200);
    assert_eq!(console.post().unwrap().sent, 0);
    net.set_time(201);
    assert_eq!(console.post().unwrap().sent, 1);

    device.update().unwrap();
    assert_eq!(collector.count(), 3);
}

#[test]
fn test_producer_value_at_send_time() {
    let net = TestNetwork::new();
    let (mut device, mut console, collector) = setup(&net);

    let level = Rc::new(Cell::new(0.0f32));
    let source = {
        let level = level.clone();
        ValueSource::producer(move || (level.get(),))
    };
    console
        .publish("10.0.0.1", PORT, "/level", source, 10)
        .unwrap();

    level.set(0.25);
    console.update().unwrap();
    level.set(0.75);
    net.set_time(10);
    console.update().unwrap();

    device.update().unwrap();
    assert_eq!(
        collector.args_for("/level"),
        vec![vec![OscValue::Float(0.25)], vec![OscValue::Float(0.75)]]
    );
}

#[test]
fn test_one_shot_publish() {
    let net = TestNetwork::new();
    let (mut device, mut console, collector) = setup(&net);

    let handle = console
        .publish("10.0.0.1", PORT, "/once", ValueSource::fixed(()), 0)
        .unwrap();

    let stats = console.post().unwrap();
    assert_eq!((stats.sent, stats.retired), (1, 1));
    assert!(console.publication(handle).is_none());

    net.set_time(1000);
    assert_eq!(console.post().unwrap().sent, 0);
    device.update().unwrap();
    assert_eq!(collector.count(), 1);
}

#[test]
fn test_mutation_through_handle() {
    let net = TestNetwork::new();
    let (mut device, mut console, collector) = setup(&net);

    let handle = console
        .publish("10.0.0.1", PORT, "/v", ValueSource::fixed((1i32,)), 100)
        .unwrap();
    console.post().unwrap();

    assert!(console.set_publish_value(handle, (2i32,)));
    assert!(console.set_publish_interval(handle, 10));
    net.set_time(10);
    console.post().unwrap();

    assert!(console.set_publish_enabled(handle, false));
    net.set_time(100);
    assert_eq!(console.post().unwrap().sent, 0);

    device.update().unwrap();
    assert_eq!(
        collector.args_for("/v"),
        vec![vec![OscValue::Int(1)], vec![OscValue::Int(2)]]
    );
}

#[test]
fn test_frame_rate() {
    let net = TestNetwork::new();
    let (_device, mut console, _collector) = setup(&net);

    let handle = console
        .publish("10.0.0.1", PORT, "/fps", ValueSource::fixed(()), 1000)
        .unwrap();
    console.publication_mut(handle).unwrap().set_frame_rate(50.0);
    assert_eq!(console.publication(handle).unwrap().interval_ms(), 20);
}

#[test]
fn test_publish_ref_lookup() {
    let net = TestNetwork::new();
    let (_device, mut console, _collector) = setup(&net);

    let handle = console
        .publish("10.0.0.1", PORT, "/lookup", ValueSource::fixed(()), 100)
        .unwrap();

    assert_eq!(console.publish_ref("10.0.0.1", PORT, "/lookup"), Some(handle));
    assert_eq!(console.publish_ref("10.0.0.1", PORT, "/other"), None);
    assert_eq!(console.publish_ref("10.0.0.9", PORT, "/lookup"), None);
}

#[test]
fn test_stale_handle_is_noop() {
    let net = TestNetwork::new();
    let (mut device, mut console, collector) = setup(&net);

    let old = console
        .publish("10.0.0.1", PORT, "/old", ValueSource::fixed(()), 10)
        .unwrap();
    assert!(console.unpublish(old));
    assert!(!console.unpublish(old));

    // the freed slot is reused by the next entry
    let new = console
        .publish("10.0.0.1", PORT, "/new", ValueSource::fixed(()), 10)
        .unwrap();

    assert!(console.publication(old).is_none());
    assert!(!console.set_publish_enabled(old, false));
    assert!(!console.set_publish_value(old, (9i32,)));
    assert!(!console.set_publish_interval(old, 1));
    assert!(console.publication(new).unwrap().is_enabled());

    console.post().unwrap();
    device.update().unwrap();
    assert_eq!(collector.addresses(), vec!["/new"]);
}

#[test]
fn test_publish_capacity() {
    let net = TestNetwork::new();
    let mut console = net.context_with_config(
        CONSOLE,
        OscConfig {
            max_publications: 2,
            ..Default::default()
        },
    );

    let a = console
        .publish("10.0.0.1", PORT, "/a", ValueSource::fixed(()), 10)
        .unwrap();
    console
        .publish("10.0.0.1", PORT, "/b", ValueSource::fixed(()), 10)
        .unwrap();

    let err = console
        .publish("10.0.0.1", PORT, "/c", ValueSource::fixed(()), 10)
        .unwrap_err();
    assert!(matches!(
        err,
        OscError::CapacityExceeded {
            resource: Resource::Publications,
            capacity: 2
        }
    ));
    assert_eq!(console.publication(a).unwrap().address(), "/a");

    // removing one frees room
    assert!(console.unpublish(a));
    assert!(console
        .publish("10.0.0.1", PORT, "/c", ValueSource::fixed(()), 10)
        .is_ok());
}
