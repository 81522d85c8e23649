//! Pooled byte buffers
//!
//! Payloads cross the thread boundary as pooled buffers: checked out on the
//! producing side, moved through a queue, and dropped on the consuming side,
//! which returns the storage to the pool. Ownership of a checked-out buffer
//! is the value itself, so a buffer can never be returned twice or touched
//! after return.
//!
//! Checkout never blocks and never fails: if the free list has no block of
//! sufficient capacity, the pool allocates a new one. The pool grows without
//! bound under sustained demand; memory is traded for latency.

use bytes::BytesMut;
use core::fmt;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;
use std::sync::Arc;

// ----------------------------------------------------------------------------
// Buffer Pool
// ----------------------------------------------------------------------------

/// Thread-safe pool of reusable byte buffers, scoped to one bridge instance.
///
/// Cloning the pool is cheap and yields a handle to the same free list, so
/// both the consumer side and the worker side can check out and return
/// buffers concurrently.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /// Create an empty pool. Fresh allocations use at least
    /// `default_capacity` bytes so small checkouts still produce
    /// reusable blocks.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free_list: Mutex::new(Vec::new()),
                default_capacity,
                created: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Preallocate `count` buffers into the free list
    pub fn warm_up(&self, count: usize) {
        let mut list = self.inner.free_list.lock();
        for _ in 0..count {
            list.push(BytesMut::with_capacity(self.inner.default_capacity));
            self.inner.created.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Check out an empty buffer with at least `min_capacity` bytes of
    /// capacity. Never blocks beyond the free-list lock; never fails.
    pub fn checkout(&self, min_capacity: usize) -> PooledBuffer {
        let reused = {
            let mut list = self.inner.free_list.lock();
            list.iter()
                .position(|buf| buf.capacity() >= min_capacity)
                .map(|index| list.swap_remove(index))
        };

        let mut data = match reused {
            Some(buf) => buf,
            None => {
                let capacity = min_capacity.max(self.inner.default_capacity);
                self.inner.created.fetch_add(1, Ordering::Relaxed);
                BytesMut::with_capacity(capacity)
            }
        };
        data.clear();
        self.inner.in_flight.fetch_add(1, Ordering::Relaxed);

        PooledBuffer {
            data,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Check out a buffer and fill it from `data`.
    ///
    /// Payload views handed to the bridge are only valid for the duration of
    /// the call, so they are copied into pool storage before crossing any
    /// queue.
    pub fn copy_from(&self, data: &[u8]) -> PooledBuffer {
        let mut buffer = self.checkout(data.len());
        buffer.extend_from_slice(data);
        buffer
    }

    /// Snapshot of pool accounting
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.inner.created.load(Ordering::Relaxed),
            available: self.inner.free_list.lock().len(),
            in_flight: self.inner.in_flight.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("BufferPool")
            .field("created", &stats.created)
            .field("available", &stats.available)
            .field("in_flight", &stats.in_flight)
            .finish()
    }
}

struct PoolInner {
    free_list: Mutex<Vec<BytesMut>>,
    default_capacity: usize,
    created: AtomicUsize,
    in_flight: AtomicUsize,
}

impl PoolInner {
    fn reclaim(&self, mut data: BytesMut) {
        data.clear();
        self.in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |prev| {
                Some(prev.saturating_sub(1))
            })
            .ok();
        self.free_list.lock().push(data);
    }
}

// ----------------------------------------------------------------------------
// Pool Statistics
// ----------------------------------------------------------------------------

/// Point-in-time view of pool accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Total buffers ever allocated by this pool
    pub created: usize,
    /// Buffers currently sitting in the free list
    pub available: usize,
    /// Buffers currently checked out (including any queued inside events)
    pub in_flight: usize,
}

// ----------------------------------------------------------------------------
// Pooled Buffer
// ----------------------------------------------------------------------------

/// A byte buffer on loan from a [`BufferPool`].
///
/// Dereferences to [`BytesMut`] for writing and to `[u8]` for reading.
/// Dropping the buffer returns its storage to the pool.
pub struct PooledBuffer {
    data: BytesMut,
    pool: Arc<PoolInner>,
}

impl PooledBuffer {
    /// View the written bytes
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl AsRef<[u8]> for PooledBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.len())
            .field("capacity", &self.data.capacity())
            .finish()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        // mem::take leaves a fresh, allocation-free BytesMut behind; the
        // real storage goes back to the free list exactly once.
        self.pool.reclaim(std::mem::take(&mut self.data));
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
