//! Trestle Runtime
//!
//! The moving parts of the trestle transport bridge: the worker execution
//! context that drives a [`ThreadedAdapter`] on its own OS thread, and the
//! [`TransportBridge`] orchestrator a single-threaded consumer talks to.
//!
//! A consumer constructs a bridge around an adapter, calls
//! [`TransportBridge::init`] once, then issues request operations and pumps
//! the role event queues once per tick. [`TransportBridge::shutdown`] is the
//! only operation that blocks, and only up to the configured bound.
//!
//! [`ThreadedAdapter`]: trestle_core::ThreadedAdapter

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod bridge;
pub mod worker;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use bridge::{BridgeHandle, ClientRole, ServerRole, TransportBridge};
pub use worker::{WorkerContext, WorkerState};
