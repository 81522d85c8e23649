//! Bridge queue message types
//!
//! All traffic between the consumer thread and the worker thread flows
//! through these types. Commands travel consumer to worker on one queue;
//! events travel worker to consumer on one queue per role, so each role's
//! per-tick drain cost stays independent of the other's volume.
//!
//! Payload-carrying variants own a [`PooledBuffer`]: moving the variant
//! through a queue moves buffer ownership with it, and dropping the variant
//! (delivered or discarded in a shutdown drain) returns the storage to the
//! pool.

use crate::buffer::PooledBuffer;
use crate::types::{ChannelId, ConnectionId, TransportErrorKind};

// ----------------------------------------------------------------------------
// Command: Consumer → Worker
// ----------------------------------------------------------------------------

/// Commands sent from the consumer thread to the worker thread
#[derive(Debug)]
pub enum Command {
    /// Begin accepting connections on the server role
    StartServer,
    /// Send a payload to one server-side connection
    SendServer {
        conn: ConnectionId,
        payload: PooledBuffer,
        channel: ChannelId,
    },
    /// Close one server-side connection
    DisconnectServer { conn: ConnectionId },
    /// Stop accepting connections and close the server role
    StopServer,
    /// Connect the client role to a remote address
    ConnectClient { address: String },
    /// Send a payload on the client role's connection
    SendClient {
        payload: PooledBuffer,
        channel: ChannelId,
    },
    /// Close the client role's connection
    DisconnectClient,
    /// Stop the worker loop and release adapter resources
    Shutdown,
}

// ----------------------------------------------------------------------------
// ServerEvent: Worker → Consumer (server role)
// ----------------------------------------------------------------------------

/// Events reported by the worker for the server role
#[derive(Debug)]
pub enum ServerEvent {
    /// A remote client connected
    Connected {
        conn: ConnectionId,
        address: String,
    },
    /// A previously requested send completed
    Sent {
        conn: ConnectionId,
        payload: PooledBuffer,
        channel: ChannelId,
    },
    /// A payload arrived from a connected client
    Received {
        conn: ConnectionId,
        payload: PooledBuffer,
        channel: ChannelId,
    },
    /// A transport-level failure tied to one connection
    Error {
        conn: ConnectionId,
        kind: TransportErrorKind,
        message: String,
    },
    /// A connection closed
    Disconnected { conn: ConnectionId },
}

// ----------------------------------------------------------------------------
// ClientEvent: Worker → Consumer (client role)
// ----------------------------------------------------------------------------

/// Events reported by the worker for the client role.
///
/// The client role has at most one connection, so no variant carries a
/// connection identifier.
#[derive(Debug)]
pub enum ClientEvent {
    /// The connection to the server was established
    Connected,
    /// A previously requested send completed
    Sent {
        payload: PooledBuffer,
        channel: ChannelId,
    },
    /// A payload arrived from the server
    Received {
        payload: PooledBuffer,
        channel: ChannelId,
    },
    /// A transport-level failure on the client connection
    Error {
        kind: TransportErrorKind,
        message: String,
    },
    /// The connection closed
    Disconnected,
}
