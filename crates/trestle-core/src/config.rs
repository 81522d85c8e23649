//! Bridge configuration
//!
//! This module consolidates the tunables for a bridge instance: worker loop
//! cadence, shutdown bounds, and buffer pool sizing.

use crate::errors::{BridgeError, BridgeResult};
use std::time::Duration;

// ----------------------------------------------------------------------------
// Bridge Configuration
// ----------------------------------------------------------------------------

/// Configuration for a single bridge instance
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BridgeConfig {
    /// Sleep between worker loop iterations. Bounds worker CPU use and sets
    /// the approximate latency floor for command processing.
    pub tick_interval: Duration,
    /// Upper bound on how long `shutdown()` waits for the worker to
    /// acknowledge before reporting failure.
    pub shutdown_timeout: Duration,
    /// Number of buffers preallocated into the pool at construction
    pub pool_warmup: usize,
    /// Initial capacity of newly created pool buffers, in bytes
    pub default_buffer_capacity: usize,
    /// Name given to the worker OS thread
    pub worker_thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1), // poll cadence, not a scheduling guarantee
            shutdown_timeout: Duration::from_secs(2),
            pool_warmup: 0,
            default_buffer_capacity: 1200, // fits a typical MTU-sized payload
            worker_thread_name: "trestle-worker".into(),
        }
    }
}

impl BridgeConfig {
    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            tick_interval: Duration::from_micros(100),
            shutdown_timeout: Duration::from_millis(500),
            pool_warmup: 4,
            default_buffer_capacity: 64,
            worker_thread_name: "trestle-test-worker".into(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> BridgeResult<()> {
        if self.tick_interval.is_zero() {
            return Err(BridgeError::invalid_config("Tick interval cannot be zero"));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(BridgeError::invalid_config(
                "Shutdown timeout cannot be zero",
            ));
        }
        if self.worker_thread_name.is_empty() {
            return Err(BridgeError::invalid_config(
                "Worker thread name cannot be empty",
            ));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
