//! Core types for the trestle transport bridge
//!
//! This module defines the fundamental identifiers and classifications used
//! throughout the bridge, using newtype patterns for semantic validation and
//! type safety.

use core::fmt;
use core::ops::Deref;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Connection Identifier
// ----------------------------------------------------------------------------

/// Identifier for a single connection on the server role.
///
/// Only meaningful for the server role; the client role has at most one
/// implicit connection and never carries one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a new ConnectionId from a raw value
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Deref for ConnectionId {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ----------------------------------------------------------------------------
// Channel Identifier
// ----------------------------------------------------------------------------

/// Identifier selecting a delivery channel (e.g. reliable vs. unreliable).
///
/// Orthogonal to connection identity: the bridge passes it through to the
/// adapter untouched, so adapters may define channels beyond the two
/// conventional ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Conventional reliable-ordered delivery channel
    pub const RELIABLE: Self = Self(0);

    /// Conventional unreliable delivery channel
    pub const UNRELIABLE: Self = Self(1);

    /// Create a new ChannelId from a raw value
    pub fn new(value: u8) -> Self {
        Self(value)
    }

    /// Get the raw value
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::RELIABLE
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::RELIABLE => write!(f, "reliable"),
            Self::UNRELIABLE => write!(f, "unreliable"),
            Self(other) => write!(f, "channel#{other}"),
        }
    }
}

impl From<u8> for ChannelId {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

// ----------------------------------------------------------------------------
// Transport Error Classification
// ----------------------------------------------------------------------------

/// Classification of a transport-level failure reported through an error event.
///
/// Carried alongside a free-text reason; consumers match on the kind and log
/// the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportErrorKind {
    /// The remote endpoint refused the connection
    Refused,
    /// An operation exceeded its deadline
    Timeout,
    /// The address could not be resolved
    Dns,
    /// Inbound data violated the transport protocol
    InvalidReceive,
    /// Outbound data was rejected by the transport
    InvalidSend,
    /// The connection was closed mid-operation
    ConnectionClosed,
    /// Anything the transport could not classify
    Unexpected,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Refused => "refused",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Dns => "dns",
            TransportErrorKind::InvalidReceive => "invalid receive",
            TransportErrorKind::InvalidSend => "invalid send",
            TransportErrorKind::ConnectionClosed => "connection closed",
            TransportErrorKind::Unexpected => "unexpected",
        };
        write!(f, "{name}")
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
