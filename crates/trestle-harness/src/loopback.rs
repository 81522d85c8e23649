//! In-memory loopback adapter
//!
//! Wires a bridge's client role to its own server role with no sockets in
//! between: everything the client sends surfaces as a server receive and
//! vice versa. Deterministic and instantaneous, which makes it the reference
//! adapter for integration tests.

use tracing::{debug, trace};

use trestle_core::{
    BridgeNotifier, ChannelId, ConnectionId, ThreadedAdapter, TransportErrorKind,
};

// ----------------------------------------------------------------------------
// Loopback Adapter
// ----------------------------------------------------------------------------

/// Adapter that loops the client role back into the server role.
///
/// A client connect succeeds only while the server role is started, mirroring
/// a real transport refusing connections to a closed port.
#[derive(Default)]
pub struct LoopbackAdapter {
    notifier: Option<BridgeNotifier>,
    server_active: bool,
    client_conn: Option<ConnectionId>,
    next_conn: u64,
}

impl LoopbackAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_conn(&mut self) -> ConnectionId {
        self.next_conn += 1;
        ConnectionId::new(self.next_conn)
    }
}

impl ThreadedAdapter for LoopbackAdapter {
    fn attach(&mut self, notifier: BridgeNotifier) {
        self.notifier = Some(notifier);
    }

    fn threaded_server_start(&mut self) {
        debug!("loopback server started");
        self.server_active = true;
    }

    fn threaded_server_stop(&mut self) {
        // State resets even when no notifier is attached yet.
        self.server_active = false;
        let closed = self.client_conn.take();
        debug!("loopback server stopped");
        let Some(notifier) = self.notifier.as_ref() else {
            return;
        };
        if let Some(conn) = closed {
            notifier.notify_server_disconnected(conn);
            notifier.notify_client_disconnected();
        }
    }

    fn threaded_server_send(&mut self, conn: ConnectionId, payload: &[u8], channel: ChannelId) {
        let Some(notifier) = self.notifier.as_ref() else {
            return;
        };
        if self.client_conn != Some(conn) {
            notifier.notify_server_error(
                conn,
                TransportErrorKind::ConnectionClosed,
                "send to unknown connection",
            );
            return;
        }
        trace!(%conn, len = payload.len(), %channel, "loopback server send");
        notifier.notify_client_received(payload, channel);
        notifier.notify_server_sent(conn, payload, channel);
    }

    fn threaded_server_disconnect(&mut self, conn: ConnectionId) {
        let Some(notifier) = self.notifier.as_ref() else {
            return;
        };
        if self.client_conn == Some(conn) {
            self.client_conn = None;
            notifier.notify_server_disconnected(conn);
            notifier.notify_client_disconnected();
        } else {
            notifier.notify_server_error(
                conn,
                TransportErrorKind::ConnectionClosed,
                "disconnect of unknown connection",
            );
        }
    }

    fn threaded_client_connect(&mut self, address: &str) {
        // Cloned so the borrow does not conflict with allocate_conn below.
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        if !self.server_active {
            notifier.notify_client_error(
                TransportErrorKind::Refused,
                "loopback server is not started",
            );
            return;
        }
        let conn = self.allocate_conn();
        self.client_conn = Some(conn);
        debug!(%conn, address, "loopback client connected");
        notifier.notify_server_connected(conn, address);
        notifier.notify_client_connected();
    }

    fn threaded_client_send(&mut self, payload: &[u8], channel: ChannelId) {
        let Some(notifier) = self.notifier.as_ref() else {
            return;
        };
        let Some(conn) = self.client_conn else {
            notifier.notify_client_error(
                TransportErrorKind::ConnectionClosed,
                "send with no connection",
            );
            return;
        };
        trace!(%conn, len = payload.len(), %channel, "loopback client send");
        notifier.notify_server_received(conn, payload, channel);
        notifier.notify_client_sent(payload, channel);
    }

    fn threaded_client_disconnect(&mut self) {
        let closed = self.client_conn.take();
        let Some(notifier) = self.notifier.as_ref() else {
            return;
        };
        if let Some(conn) = closed {
            notifier.notify_client_disconnected();
            notifier.notify_server_disconnected(conn);
        }
    }

    fn threaded_shutdown(&mut self) {
        debug!("loopback adapter shut down");
        self.server_active = false;
        self.client_conn = None;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
