//! Worker-side event emission
//!
//! The [`BridgeNotifier`] is the adapter's only way to make the consumer see
//! anything. It copies borrowed payload views into pooled buffers (the view
//! is only valid for the duration of the notify call) and enqueues role
//! events for the consumer's next pump. Adapters never invoke consumer
//! callbacks directly and never touch the queues directly.

use tracing::trace;

use crate::buffer::BufferPool;
use crate::channel::{ClientEvent, ClientEventSender, ServerEvent, ServerEventSender};
use crate::types::{ChannelId, ConnectionId, TransportErrorKind};

// ----------------------------------------------------------------------------
// Bridge Notifier
// ----------------------------------------------------------------------------

/// Handle the adapter uses to report transport outcomes.
///
/// Clone-cheap; all clones feed the same event queues and buffer pool.
#[derive(Clone)]
pub struct BridgeNotifier {
    server_events: ServerEventSender,
    client_events: ClientEventSender,
    pool: BufferPool,
}

impl BridgeNotifier {
    /// Wire a notifier to the given event queues and pool
    pub fn new(
        server_events: ServerEventSender,
        client_events: ClientEventSender,
        pool: BufferPool,
    ) -> Self {
        Self {
            server_events,
            client_events,
            pool,
        }
    }

    /// Pool the notifier copies payloads into
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Server role
    // ------------------------------------------------------------------

    /// Report a remote client connecting to the server role
    pub fn notify_server_connected(&self, conn: ConnectionId, address: &str) {
        self.push_server(ServerEvent::Connected {
            conn,
            address: address.to_string(),
        });
    }

    /// Report a completed server-side send
    pub fn notify_server_sent(&self, conn: ConnectionId, payload: &[u8], channel: ChannelId) {
        let payload = self.pool.copy_from(payload);
        self.push_server(ServerEvent::Sent {
            conn,
            payload,
            channel,
        });
    }

    /// Report a payload received from a server-side connection
    pub fn notify_server_received(&self, conn: ConnectionId, payload: &[u8], channel: ChannelId) {
        let payload = self.pool.copy_from(payload);
        self.push_server(ServerEvent::Received {
            conn,
            payload,
            channel,
        });
    }

    /// Report a transport failure on a server-side connection
    pub fn notify_server_error(&self, conn: ConnectionId, kind: TransportErrorKind, message: &str) {
        self.push_server(ServerEvent::Error {
            conn,
            kind,
            message: message.to_string(),
        });
    }

    /// Report a server-side connection closing
    pub fn notify_server_disconnected(&self, conn: ConnectionId) {
        self.push_server(ServerEvent::Disconnected { conn });
    }

    // ------------------------------------------------------------------
    // Client role
    // ------------------------------------------------------------------

    /// Report the client role's connection being established
    pub fn notify_client_connected(&self) {
        self.push_client(ClientEvent::Connected);
    }

    /// Report a completed client-side send
    pub fn notify_client_sent(&self, payload: &[u8], channel: ChannelId) {
        let payload = self.pool.copy_from(payload);
        self.push_client(ClientEvent::Sent { payload, channel });
    }

    /// Report a payload received on the client role's connection
    pub fn notify_client_received(&self, payload: &[u8], channel: ChannelId) {
        let payload = self.pool.copy_from(payload);
        self.push_client(ClientEvent::Received { payload, channel });
    }

    /// Report a transport failure on the client role's connection
    pub fn notify_client_error(&self, kind: TransportErrorKind, message: &str) {
        self.push_client(ClientEvent::Error {
            kind,
            message: message.to_string(),
        });
    }

    /// Report the client role's connection closing
    pub fn notify_client_disconnected(&self) {
        self.push_client(ClientEvent::Disconnected);
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn push_server(&self, event: ServerEvent) {
        // Send only fails once the bridge (receiver) is gone; the carried
        // buffer drops back into the pool either way.
        if self.server_events.send(event).is_err() {
            trace!("server event dropped, bridge no longer listening");
        }
    }

    fn push_client(&self, event: ClientEvent) {
        if self.client_events.send(event).is_err() {
            trace!("client event dropped, bridge no longer listening");
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
