//! Adapter abstraction for the transport bridge
//!
//! A `ThreadedAdapter` is the transport implementation the bridge hosts: the
//! code that owns sockets, protocol state, and blocking I/O. Every
//! `threaded_*` method runs on the worker thread only, so implementations
//! are free to block briefly, poll, and keep single-threaded state.
//!
//! Adapter operations do not return results. Outcomes that the consumer
//! should observe (connects, completed sends, received payloads, failures)
//! are reported through the [`BridgeNotifier`] handed to [`attach`], which
//! queues them for the consumer's next pump.
//!
//! [`attach`]: ThreadedAdapter::attach

use crate::notify::BridgeNotifier;
use crate::types::{ChannelId, ConnectionId};

// ----------------------------------------------------------------------------
// Threaded Adapter Trait
// ----------------------------------------------------------------------------

/// Transport capability contract, driven entirely from the worker thread
pub trait ThreadedAdapter: Send {
    /// Receive the notifier for reporting outcomes. Called exactly once,
    /// before the worker thread starts.
    fn attach(&mut self, notifier: BridgeNotifier);

    /// Begin accepting connections on the server role
    fn threaded_server_start(&mut self);

    /// Stop accepting connections and close all server-side connections
    fn threaded_server_stop(&mut self);

    /// Send a payload to one server-side connection
    fn threaded_server_send(&mut self, conn: ConnectionId, payload: &[u8], channel: ChannelId);

    /// Close one server-side connection
    fn threaded_server_disconnect(&mut self, conn: ConnectionId);

    /// Connect the client role to a remote address
    fn threaded_client_connect(&mut self, address: &str);

    /// Send a payload on the client role's connection
    fn threaded_client_send(&mut self, payload: &[u8], channel: ChannelId);

    /// Close the client role's connection
    fn threaded_client_disconnect(&mut self);

    /// Per-iteration hook that runs before queued commands are dispatched.
    /// Typically polls the transport for inbound traffic.
    fn threaded_network_early_update(&mut self) {}

    /// Per-iteration hook that runs after queued commands are dispatched.
    /// Typically flushes outbound traffic.
    fn threaded_network_late_update(&mut self) {}

    /// Release transport resources. Runs on the worker thread as its final
    /// act before the thread exits.
    fn threaded_shutdown(&mut self);
}
