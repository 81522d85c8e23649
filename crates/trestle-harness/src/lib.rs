//! Trestle Harness
//!
//! Deterministic adapters for exercising the transport bridge without real
//! sockets:
//!
//! - [`LoopbackAdapter`]: wires a bridge's client role to its own server
//!   role, so full round trips run in-process and instantaneously.
//! - [`RecordingAdapter`]: performs no transport work and captures every
//!   call the worker makes, including which thread shutdown ran on.
//!
//! ```rust,ignore
//! use trestle_harness::LoopbackAdapter;
//! use trestle_runtime::TransportBridge;
//! use trestle_core::BridgeConfig;
//!
//! let mut bridge = TransportBridge::new(Box::new(LoopbackAdapter::new()), BridgeConfig::testing())?;
//! bridge.init()?;
//! bridge.server_start();
//! bridge.client_connect("loopback:1");
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod loopback;
pub mod recording;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use loopback::LoopbackAdapter;
pub use recording::{RecordedCall, RecordingAdapter, RecordingLog};
