//! Error types for the trestle transport bridge
//!
//! This module contains the error types surfaced by the bridge's own
//! lifecycle operations. Transport-level failures never appear here: they
//! travel through the event queues as error events so the consumer observes
//! them on its own thread, in order, like everything else.

use std::time::Duration;

// ----------------------------------------------------------------------------
// Bridge Error Type
// ----------------------------------------------------------------------------

/// Errors returned by bridge lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Bridge is already initialized")]
    AlreadyInitialized,

    #[error("Bridge is not initialized")]
    NotInitialized,

    #[error("Worker did not acknowledge shutdown within {waited:?}")]
    ShutdownTimeout { waited: Duration },

    #[error("Worker thread failed: {reason}")]
    WorkerFailed { reason: String },

    #[error("Invalid bridge configuration: {reason}")]
    InvalidConfiguration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl BridgeError {
    /// Create a shutdown timeout error for the given wait duration
    pub fn shutdown_timeout(waited: Duration) -> Self {
        BridgeError::ShutdownTimeout { waited }
    }

    /// Create a worker failure error with a reason
    pub fn worker_failed<R: Into<String>>(reason: R) -> Self {
        BridgeError::WorkerFailed {
            reason: reason.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn invalid_config<R: Into<String>>(reason: R) -> Self {
        BridgeError::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, BridgeError>;
pub type BridgeResult<T> = Result<T>;
