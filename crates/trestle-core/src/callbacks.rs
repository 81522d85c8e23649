//! Consumer-side callback contracts
//!
//! The pump operations translate queued events into calls on these traits,
//! synchronously, on the consumer thread. Payload slices are views into
//! pooled storage and are valid only for the duration of the call; the
//! buffer returns to the pool when the callback returns.
//!
//! Every method has an empty default body, so consumers implement only the
//! events they care about.

use crate::types::{ChannelId, ConnectionId, TransportErrorKind};

// ----------------------------------------------------------------------------
// Server Callbacks
// ----------------------------------------------------------------------------

/// Observer for server-role events
pub trait ServerCallbacks {
    /// A remote client connected
    fn on_connected(&mut self, conn: ConnectionId, address: &str) {
        let _ = (conn, address);
    }

    /// A previously requested send completed
    fn on_data_sent(&mut self, conn: ConnectionId, payload: &[u8], channel: ChannelId) {
        let _ = (conn, payload, channel);
    }

    /// A payload arrived from a connected client
    fn on_data_received(&mut self, conn: ConnectionId, payload: &[u8], channel: ChannelId) {
        let _ = (conn, payload, channel);
    }

    /// A transport-level failure tied to one connection
    fn on_error(&mut self, conn: ConnectionId, kind: TransportErrorKind, message: &str) {
        let _ = (conn, kind, message);
    }

    /// A connection closed
    fn on_disconnected(&mut self, conn: ConnectionId) {
        let _ = conn;
    }
}

// ----------------------------------------------------------------------------
// Client Callbacks
// ----------------------------------------------------------------------------

/// Observer for client-role events
pub trait ClientCallbacks {
    /// The connection to the server was established
    fn on_connected(&mut self) {}

    /// A previously requested send completed
    fn on_data_sent(&mut self, payload: &[u8], channel: ChannelId) {
        let _ = (payload, channel);
    }

    /// A payload arrived from the server
    fn on_data_received(&mut self, payload: &[u8], channel: ChannelId) {
        let _ = (payload, channel);
    }

    /// A transport-level failure on the client connection
    fn on_error(&mut self, kind: TransportErrorKind, message: &str) {
        let _ = (kind, message);
    }

    /// The connection closed
    fn on_disconnected(&mut self) {}
}
