//! Trestle Core
//!
//! Foundational pieces of the trestle transport bridge: the identifiers and
//! message types that cross the thread boundary, the buffer pool they travel
//! in, the queue plumbing, and the adapter/callback contracts at either end.
//! The worker thread and the orchestrator that tie these together live in
//! `trestle-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod adapter;
pub mod buffer;
pub mod callbacks;
pub mod channel;
pub mod config;
pub mod errors;
pub mod notify;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use adapter::ThreadedAdapter;
pub use buffer::{BufferPool, PoolStats, PooledBuffer};
pub use callbacks::{ClientCallbacks, ServerCallbacks};
pub use channel::{ClientEvent, Command, ServerEvent};
pub use config::BridgeConfig;
pub use errors::{BridgeError, BridgeResult};
pub use notify::BridgeNotifier;
pub use types::{ChannelId, ConnectionId, TransportErrorKind};
