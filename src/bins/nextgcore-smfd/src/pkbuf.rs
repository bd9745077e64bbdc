//! Packet buffers
//!
//! Every received datagram is wrapped in a [`Pkbuf`] drawn from a
//! [`PkbufPool`]. Dropping the buffer returns it to the pool, so an event
//! that is consumed by dispatch releases its buffer exactly once whatever
//! branch the dispatcher took. The pool keeps counters that tests and the
//! periodic stats log read back.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;

#[derive(Debug, Default)]
struct PoolStats {
    alloc: AtomicU64,
    free: AtomicU64,
}

/// Shared allocation accounting for packet buffers
#[derive(Debug, Clone, Default)]
pub struct PkbufPool {
    stats: Arc<PoolStats>,
}

impl PkbufPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap received bytes in a buffer owned by this pool
    pub fn alloc(&self, data: impl Into<Bytes>) -> Pkbuf {
        self.stats.alloc.fetch_add(1, Ordering::Relaxed);
        Pkbuf {
            data: data.into(),
            stats: Arc::clone(&self.stats),
        }
    }

    pub fn alloc_count(&self) -> u64 {
        self.stats.alloc.load(Ordering::Relaxed)
    }

    pub fn free_count(&self) -> u64 {
        self.stats.free.load(Ordering::Relaxed)
    }

    /// Buffers handed out and not yet released
    pub fn in_use(&self) -> u64 {
        self.alloc_count().saturating_sub(self.free_count())
    }
}

/// A received datagram; released to its pool on drop
pub struct Pkbuf {
    data: Bytes,
    stats: Arc<PoolStats>,
}

impl Pkbuf {
    /// Contents as a cheaply cloneable view for the decoders
    pub fn data(&self) -> Bytes {
        self.data.clone()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Pkbuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pkbuf").field("len", &self.data.len()).finish()
    }
}

impl Drop for Pkbuf {
    fn drop(&mut self) {
        self.stats.free.fetch_add(1, Ordering::Relaxed);
    }
}
