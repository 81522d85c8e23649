//! Call-recording adapter
//!
//! Captures every `threaded_*` invocation into a shared log so tests can
//! assert exactly what reached the adapter, on which thread, and in what
//! order. An optional shutdown stall simulates an adapter wedged in resource
//! release, which is how the bounded-shutdown path gets exercised.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use trestle_core::{BridgeNotifier, ChannelId, ConnectionId, ThreadedAdapter};

// ----------------------------------------------------------------------------
// Recorded Calls
// ----------------------------------------------------------------------------

/// One adapter invocation, as seen by the worker thread.
///
/// The per-iteration update hooks are counted separately rather than logged,
/// since a running worker produces thousands of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    ServerStart,
    ServerStop,
    ServerSend {
        conn: ConnectionId,
        payload: Vec<u8>,
        channel: ChannelId,
    },
    ServerDisconnect {
        conn: ConnectionId,
    },
    ClientConnect {
        address: String,
    },
    ClientSend {
        payload: Vec<u8>,
        channel: ChannelId,
    },
    ClientDisconnect,
    Shutdown,
}

// ----------------------------------------------------------------------------
// Recording Log
// ----------------------------------------------------------------------------

/// Shared view into a [`RecordingAdapter`]'s capture, usable from the test
/// thread while the worker drives the adapter.
#[derive(Clone, Default)]
pub struct RecordingLog {
    inner: Arc<LogInner>,
}

#[derive(Default)]
struct LogInner {
    calls: Mutex<Vec<RecordedCall>>,
    early_updates: AtomicUsize,
    late_updates: AtomicUsize,
    shutdown_thread: Mutex<Option<ThreadId>>,
}

impl RecordingLog {
    /// Snapshot of the discrete calls recorded so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.calls.lock().clone()
    }

    /// Number of early-update iterations the worker has run
    pub fn early_updates(&self) -> usize {
        self.inner.early_updates.load(Ordering::Relaxed)
    }

    /// Number of late-update iterations the worker has run
    pub fn late_updates(&self) -> usize {
        self.inner.late_updates.load(Ordering::Relaxed)
    }

    /// Thread the shutdown call ran on, once it has run
    pub fn shutdown_thread(&self) -> Option<ThreadId> {
        *self.inner.shutdown_thread.lock()
    }

    fn record(&self, call: RecordedCall) {
        self.inner.calls.lock().push(call);
    }
}

// ----------------------------------------------------------------------------
// Recording Adapter
// ----------------------------------------------------------------------------

/// Adapter that does no transport work and records everything it is asked
/// to do
#[derive(Default)]
pub struct RecordingAdapter {
    log: RecordingLog,
    shutdown_stall: Option<Duration>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `threaded_shutdown` block for `stall` before returning, so the
    /// acknowledgment the bridge waits for arrives late.
    pub fn with_shutdown_stall(stall: Duration) -> Self {
        Self {
            log: RecordingLog::default(),
            shutdown_stall: Some(stall),
        }
    }

    /// Handle for inspecting the capture from the test thread
    pub fn log(&self) -> RecordingLog {
        self.log.clone()
    }
}

impl ThreadedAdapter for RecordingAdapter {
    fn attach(&mut self, _notifier: BridgeNotifier) {}

    fn threaded_server_start(&mut self) {
        self.log.record(RecordedCall::ServerStart);
    }

    fn threaded_server_stop(&mut self) {
        self.log.record(RecordedCall::ServerStop);
    }

    fn threaded_server_send(&mut self, conn: ConnectionId, payload: &[u8], channel: ChannelId) {
        self.log.record(RecordedCall::ServerSend {
            conn,
            payload: payload.to_vec(),
            channel,
        });
    }

    fn threaded_server_disconnect(&mut self, conn: ConnectionId) {
        self.log.record(RecordedCall::ServerDisconnect { conn });
    }

    fn threaded_client_connect(&mut self, address: &str) {
        self.log.record(RecordedCall::ClientConnect {
            address: address.to_string(),
        });
    }

    fn threaded_client_send(&mut self, payload: &[u8], channel: ChannelId) {
        self.log.record(RecordedCall::ClientSend {
            payload: payload.to_vec(),
            channel,
        });
    }

    fn threaded_client_disconnect(&mut self) {
        self.log.record(RecordedCall::ClientDisconnect);
    }

    fn threaded_network_early_update(&mut self) {
        self.log.inner.early_updates.fetch_add(1, Ordering::Relaxed);
    }

    fn threaded_network_late_update(&mut self) {
        self.log.inner.late_updates.fetch_add(1, Ordering::Relaxed);
    }

    fn threaded_shutdown(&mut self) {
        *self.log.inner.shutdown_thread.lock() = Some(std::thread::current().id());
        if let Some(stall) = self.shutdown_stall {
            debug!(?stall, "recording adapter stalling in shutdown");
            std::thread::sleep(stall);
        }
        self.log.record(RecordedCall::Shutdown);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
