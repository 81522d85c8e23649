//! Integration Tests for the Transport Bridge
//!
//! Exercises the full pipeline over the in-memory loopback adapter: request
//! operations queue commands, the worker thread dispatches them into the
//! adapter, the adapter's notifies queue events, and the per-tick pumps
//! deliver them as callbacks on the test (consumer) thread. Shutdown
//! ordering and failure reporting are verified against the recording
//! adapter.

use std::thread;
use std::time::{Duration, Instant};

use trestle_core::{
    BridgeConfig, BridgeError, ChannelId, ClientCallbacks, ConnectionId, ServerCallbacks,
    ThreadedAdapter, TransportErrorKind,
};
use trestle_harness::{LoopbackAdapter, RecordedCall, RecordingAdapter};
use trestle_runtime::{ClientRole, ServerRole, TransportBridge};

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

/// Server-role callback sink collecting everything the pump delivers
#[derive(Default)]
struct ServerProbe {
    connected: Vec<(ConnectionId, String)>,
    sent: Vec<(ConnectionId, Vec<u8>, ChannelId)>,
    received: Vec<(ConnectionId, Vec<u8>, ChannelId)>,
    errors: Vec<(ConnectionId, TransportErrorKind)>,
    disconnected: Vec<ConnectionId>,
}

impl ServerCallbacks for ServerProbe {
    fn on_connected(&mut self, conn: ConnectionId, address: &str) {
        self.connected.push((conn, address.to_string()));
    }

    fn on_data_sent(&mut self, conn: ConnectionId, payload: &[u8], channel: ChannelId) {
        self.sent.push((conn, payload.to_vec(), channel));
    }

    fn on_data_received(&mut self, conn: ConnectionId, payload: &[u8], channel: ChannelId) {
        self.received.push((conn, payload.to_vec(), channel));
    }

    fn on_error(&mut self, conn: ConnectionId, kind: TransportErrorKind, _message: &str) {
        self.errors.push((conn, kind));
    }

    fn on_disconnected(&mut self, conn: ConnectionId) {
        self.disconnected.push(conn);
    }
}

/// Client-role callback sink collecting everything the pump delivers
#[derive(Default)]
struct ClientProbe {
    connected: usize,
    sent: Vec<(Vec<u8>, ChannelId)>,
    received: Vec<(Vec<u8>, ChannelId)>,
    errors: Vec<TransportErrorKind>,
    disconnected: usize,
}

impl ClientCallbacks for ClientProbe {
    fn on_connected(&mut self) {
        self.connected += 1;
    }

    fn on_data_sent(&mut self, payload: &[u8], channel: ChannelId) {
        self.sent.push((payload.to_vec(), channel));
    }

    fn on_data_received(&mut self, payload: &[u8], channel: ChannelId) {
        self.received.push((payload.to_vec(), channel));
    }

    fn on_error(&mut self, kind: TransportErrorKind, _message: &str) {
        self.errors.push(kind);
    }

    fn on_disconnected(&mut self) {
        self.disconnected += 1;
    }
}

/// Opt into log output with RUST_LOG, e.g. RUST_LOG=trestle_runtime=trace
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn loopback_bridge() -> TransportBridge {
    init_tracing();
    let mut bridge =
        TransportBridge::new(Box::new(LoopbackAdapter::new()), BridgeConfig::testing()).unwrap();
    bridge.init().unwrap();
    bridge
}

/// Tick the consumer loop until `done` holds or the deadline passes
fn pump_until<F>(
    bridge: &mut TransportBridge,
    server: &mut ServerProbe,
    client: &mut ClientProbe,
    timeout: Duration,
    mut done: F,
) -> bool
where
    F: FnMut(&ServerProbe, &ClientProbe) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        bridge.server_early_update(server);
        bridge.client_early_update(client);
        bridge.server_late_update();
        bridge.client_late_update();
        if done(server, client) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// Tick only the client side of the consumer loop until `done` holds or
/// the deadline passes, leaving the server event queue untouched
fn pump_client_until<F>(
    bridge: &mut TransportBridge,
    client: &mut ClientProbe,
    timeout: Duration,
    mut done: F,
) -> bool
where
    F: FnMut(&ClientProbe) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        bridge.client_early_update(client);
        bridge.client_late_update();
        if done(client) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    predicate()
}

/// Start the server role, connect the client role, and pump until both
/// sides have observed the connection. Returns the server-side id.
fn establish_connection(
    bridge: &mut TransportBridge,
    server: &mut ServerProbe,
    client: &mut ClientProbe,
) -> ConnectionId {
    bridge.server_start();
    bridge.client_connect("loopback:7777");
    assert!(
        pump_until(bridge, server, client, Duration::from_secs(2), |s, c| {
            !s.connected.is_empty() && c.connected > 0
        }),
        "connection was never established",
    );
    assert_eq!(bridge.client_role(), ClientRole::Connected);
    server.connected[0].0
}

// ----------------------------------------------------------------------------
// Round Trip Tests
// ----------------------------------------------------------------------------

#[test]
fn test_client_to_server_round_trip() {
    let mut bridge = loopback_bridge();
    let mut server = ServerProbe::default();
    let mut client = ClientProbe::default();
    let conn = establish_connection(&mut bridge, &mut server, &mut client);

    bridge.client_send(b"ping from client", ChannelId::UNRELIABLE);

    assert!(pump_until(
        &mut bridge,
        &mut server,
        &mut client,
        Duration::from_secs(2),
        |s, c| !s.received.is_empty() && !c.sent.is_empty(),
    ));
    assert_eq!(
        server.received,
        vec![(conn, b"ping from client".to_vec(), ChannelId::UNRELIABLE)],
    );
    assert_eq!(
        client.sent,
        vec![(b"ping from client".to_vec(), ChannelId::UNRELIABLE)],
    );

    bridge.shutdown().unwrap();
}

#[test]
fn test_server_to_client_round_trip() {
    let mut bridge = loopback_bridge();
    let mut server = ServerProbe::default();
    let mut client = ClientProbe::default();
    let conn = establish_connection(&mut bridge, &mut server, &mut client);

    bridge.server_send(conn, b"pong from server", ChannelId::RELIABLE);

    assert!(pump_until(
        &mut bridge,
        &mut server,
        &mut client,
        Duration::from_secs(2),
        |s, c| !c.received.is_empty() && !s.sent.is_empty(),
    ));
    assert_eq!(
        client.received,
        vec![(b"pong from server".to_vec(), ChannelId::RELIABLE)],
    );
    assert_eq!(
        server.sent,
        vec![(conn, b"pong from server".to_vec(), ChannelId::RELIABLE)],
    );

    bridge.shutdown().unwrap();
}

#[test]
fn test_ten_server_messages_arrive_in_send_order() {
    let mut bridge = loopback_bridge();
    let mut server = ServerProbe::default();
    let mut client = ClientProbe::default();
    let conn = establish_connection(&mut bridge, &mut server, &mut client);

    // Alternate channels so channel values are asserted along with content.
    let expected: Vec<(Vec<u8>, ChannelId)> = (0..10u8)
        .map(|i| {
            let channel = if i % 2 == 0 {
                ChannelId::RELIABLE
            } else {
                ChannelId::UNRELIABLE
            };
            (format!("message number {i}").into_bytes(), channel)
        })
        .collect();

    for (payload, channel) in &expected {
        bridge.server_send(conn, payload, *channel);
    }

    assert!(pump_until(
        &mut bridge,
        &mut server,
        &mut client,
        Duration::from_secs(2),
        |_, c| c.received.len() >= 10,
    ));
    assert_eq!(client.received, expected);

    bridge.shutdown().unwrap();
}

#[test]
fn test_empty_payload_round_trips() {
    let mut bridge = loopback_bridge();
    let mut server = ServerProbe::default();
    let mut client = ClientProbe::default();
    establish_connection(&mut bridge, &mut server, &mut client);

    bridge.client_send(b"", ChannelId::RELIABLE);

    assert!(pump_until(
        &mut bridge,
        &mut server,
        &mut client,
        Duration::from_secs(2),
        |s, _| !s.received.is_empty(),
    ));
    assert!(server.received[0].1.is_empty());

    bridge.shutdown().unwrap();
}

// ----------------------------------------------------------------------------
// Connection Lifecycle Tests
// ----------------------------------------------------------------------------

#[test]
fn test_connect_without_server_reports_refused() {
    let mut bridge = loopback_bridge();
    let mut server = ServerProbe::default();
    let mut client = ClientProbe::default();

    bridge.client_connect("loopback:7777");

    assert!(pump_until(
        &mut bridge,
        &mut server,
        &mut client,
        Duration::from_secs(2),
        |_, c| !c.errors.is_empty(),
    ));
    assert_eq!(client.errors, vec![TransportErrorKind::Refused]);
    assert_eq!(client.connected, 0);
    assert_eq!(bridge.client_role(), ClientRole::Disconnected);

    bridge.shutdown().unwrap();
}

#[test]
fn test_connect_retry_succeeds_after_refusal() {
    let mut bridge = loopback_bridge();
    let mut server = ServerProbe::default();
    let mut client = ClientProbe::default();

    // First attempt is refused because the server role never started.
    bridge.client_connect("loopback:7777");
    assert!(pump_until(
        &mut bridge,
        &mut server,
        &mut client,
        Duration::from_secs(2),
        |_, c| !c.errors.is_empty(),
    ));
    assert_eq!(bridge.client_role(), ClientRole::Disconnected);

    // The retry is valid input and must reach the adapter.
    bridge.server_start();
    bridge.client_connect("loopback:7777");
    assert!(pump_until(
        &mut bridge,
        &mut server,
        &mut client,
        Duration::from_secs(2),
        |s, c| c.connected > 0 && !s.connected.is_empty(),
    ));
    assert_eq!(bridge.client_role(), ClientRole::Connected);

    bridge.client_send(b"after retry", ChannelId::RELIABLE);
    assert!(pump_until(
        &mut bridge,
        &mut server,
        &mut client,
        Duration::from_secs(2),
        |s, _| !s.received.is_empty(),
    ));
    assert_eq!(server.received[0].1, b"after retry".to_vec());

    bridge.shutdown().unwrap();
}

#[test]
fn test_client_disconnect_reaches_both_roles() {
    let mut bridge = loopback_bridge();
    let mut server = ServerProbe::default();
    let mut client = ClientProbe::default();
    let conn = establish_connection(&mut bridge, &mut server, &mut client);

    bridge.client_disconnect();

    assert!(pump_until(
        &mut bridge,
        &mut server,
        &mut client,
        Duration::from_secs(2),
        |s, c| !s.disconnected.is_empty() && c.disconnected > 0,
    ));
    assert_eq!(server.disconnected, vec![conn]);
    assert_eq!(bridge.client_role(), ClientRole::Disconnected);

    bridge.shutdown().unwrap();
}

#[test]
fn test_server_restart_discards_prior_session_events() {
    let mut bridge = loopback_bridge();
    let mut server = ServerProbe::default();
    let mut client = ClientProbe::default();

    // Session 1: connect and send without ever pumping the server queue,
    // so its events stay buffered.
    bridge.server_start();
    bridge.client_connect("loopback:1");
    assert!(pump_client_until(
        &mut bridge,
        &mut client,
        Duration::from_secs(2),
        |c| c.connected > 0,
    ));
    bridge.client_send(b"from session one", ChannelId::RELIABLE);
    assert!(wait_until(
        || bridge.pending_server_events() >= 2,
        Duration::from_secs(2),
    ));

    // Stop the role; the loopback adapter tears the connection down.
    bridge.server_stop();
    assert!(wait_until(
        || bridge.pending_server_events() >= 3,
        Duration::from_secs(2),
    ));
    assert!(pump_client_until(
        &mut bridge,
        &mut client,
        Duration::from_secs(2),
        |c| c.disconnected > 0,
    ));

    // Session 2: the restart clears everything session 1 left queued.
    bridge.server_start();
    assert_eq!(bridge.pending_server_events(), 0);
    bridge.client_connect("loopback:2");
    assert!(pump_until(
        &mut bridge,
        &mut server,
        &mut client,
        Duration::from_secs(2),
        |s, _| !s.connected.is_empty(),
    ));
    bridge.client_send(b"from session two", ChannelId::RELIABLE);
    assert!(pump_until(
        &mut bridge,
        &mut server,
        &mut client,
        Duration::from_secs(2),
        |s, _| !s.received.is_empty(),
    ));

    // Only session-2 traffic was ever observed by this probe.
    assert_eq!(server.connected.len(), 1);
    assert_eq!(server.received.len(), 1);
    assert_eq!(server.received[0].1, b"from session two".to_vec());

    bridge.shutdown().unwrap();
}

// ----------------------------------------------------------------------------
// Misuse Tests
// ----------------------------------------------------------------------------

#[test]
fn test_client_send_while_disconnected_reaches_nothing() {
    let adapter = RecordingAdapter::new();
    let log = adapter.log();
    let mut bridge =
        TransportBridge::new(Box::new(adapter), BridgeConfig::testing()).unwrap();
    bridge.init().unwrap();

    bridge.client_send(b"goes nowhere", ChannelId::RELIABLE);

    // Let the worker run several iterations so a queued command WOULD have
    // been dispatched by now.
    assert!(wait_until(|| log.early_updates() >= 10, Duration::from_secs(2)));
    assert!(log.calls().is_empty());
    assert_eq!(bridge.pending_commands(), 0);
    assert_eq!(bridge.pending_client_events(), 0);
    assert_eq!(bridge.pool_stats().in_flight, 0);

    bridge.shutdown().unwrap();
}

#[test]
fn test_server_send_while_inactive_reaches_nothing() {
    let adapter = RecordingAdapter::new();
    let log = adapter.log();
    let mut bridge =
        TransportBridge::new(Box::new(adapter), BridgeConfig::testing()).unwrap();
    bridge.init().unwrap();

    bridge.server_send(ConnectionId::new(1), b"goes nowhere", ChannelId::RELIABLE);

    assert!(wait_until(|| log.early_updates() >= 10, Duration::from_secs(2)));
    assert!(log.calls().is_empty());
    assert_eq!(bridge.pool_stats().in_flight, 0);

    bridge.shutdown().unwrap();
}

// ----------------------------------------------------------------------------
// Shutdown Tests
// ----------------------------------------------------------------------------

#[test]
fn test_shutdown_runs_adapter_shutdown_off_the_consumer_thread() {
    let adapter = RecordingAdapter::new();
    let log = adapter.log();
    let mut bridge =
        TransportBridge::new(Box::new(adapter), BridgeConfig::testing()).unwrap();
    bridge.init().unwrap();
    bridge.server_start();

    bridge.shutdown().unwrap();

    // Ok from shutdown implies the adapter's cleanup already ran, on the
    // worker thread.
    let shutdown_thread = log.shutdown_thread().expect("adapter shutdown never ran");
    assert_ne!(shutdown_thread, thread::current().id());
    assert_eq!(log.calls().last(), Some(&RecordedCall::Shutdown));
}

#[test]
fn test_shutdown_clears_all_queues() {
    let mut bridge = loopback_bridge();
    let mut server = ServerProbe::default();
    let mut client = ClientProbe::default();
    establish_connection(&mut bridge, &mut server, &mut client);

    for _ in 0..50 {
        bridge.client_send(b"undrained", ChannelId::RELIABLE);
    }
    bridge.shutdown().unwrap();

    assert_eq!(bridge.pending_commands(), 0);
    assert_eq!(bridge.pending_server_events(), 0);
    assert_eq!(bridge.pending_client_events(), 0);
    // Every buffer queued inside a dropped command or event went back.
    assert_eq!(bridge.pool_stats().in_flight, 0);
}

#[test]
fn test_wedged_adapter_shutdown_times_out_then_recovers() {
    let config = BridgeConfig {
        shutdown_timeout: Duration::from_millis(50),
        ..BridgeConfig::testing()
    };
    let adapter = RecordingAdapter::with_shutdown_stall(Duration::from_millis(300));
    let log = adapter.log();
    let mut bridge = TransportBridge::new(Box::new(adapter), config).unwrap();
    bridge.init().unwrap();

    assert!(matches!(
        bridge.shutdown(),
        Err(BridgeError::ShutdownTimeout { .. })
    ));

    // Retrying keeps waiting in bounded steps until the stall ends.
    assert!(wait_until(|| bridge.shutdown().is_ok(), Duration::from_secs(2)));
    assert_eq!(log.calls().last(), Some(&RecordedCall::Shutdown));
}

#[test]
fn test_panicked_worker_is_reported_at_shutdown() {
    struct PanickingAdapter;

    impl ThreadedAdapter for PanickingAdapter {
        fn attach(&mut self, _notifier: trestle_core::BridgeNotifier) {}
        fn threaded_server_start(&mut self) {
            panic!("adapter failure on the worker thread");
        }
        fn threaded_server_stop(&mut self) {}
        fn threaded_server_send(&mut self, _: ConnectionId, _: &[u8], _: ChannelId) {}
        fn threaded_server_disconnect(&mut self, _: ConnectionId) {}
        fn threaded_client_connect(&mut self, _: &str) {}
        fn threaded_client_send(&mut self, _: &[u8], _: ChannelId) {}
        fn threaded_client_disconnect(&mut self) {}
        fn threaded_shutdown(&mut self) {}
    }

    let mut bridge =
        TransportBridge::new(Box::new(PanickingAdapter), BridgeConfig::testing()).unwrap();
    bridge.init().unwrap();
    bridge.server_start();

    // Wait until the worker has consumed the command, so the panicking
    // dispatch has provably fired before shutdown observes the worker.
    assert!(wait_until(
        || bridge.pending_commands() == 0,
        Duration::from_secs(2),
    ));

    let result = bridge.shutdown();
    assert!(matches!(result, Err(BridgeError::WorkerFailed { .. })));

    // The bridge considers itself finished after reporting the dead worker.
    assert_eq!(bridge.server_role(), ServerRole::Inactive);
    bridge.shutdown().unwrap();
}
