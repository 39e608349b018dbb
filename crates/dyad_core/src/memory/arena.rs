//! # Batch Arena
//!
//! Recycles per-cycle batch storage. The simulation thread takes an empty
//! batch, fills it during a drain and ships it; the core thread empties it
//! while applying and hands it back. In steady state no batch vector is ever
//! allocated.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Allocation statistics for a [`BatchArena`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Batches created from scratch.
    pub fresh: u64,
    /// Batches served from the free list.
    pub reused: u64,
    /// Batches dropped on recycle because the free list was full.
    pub discarded: u64,
}

/// A thread-safe free list of reusable `Vec<T>` batches.
///
/// # Example
///
/// ```rust,ignore
/// let arena: BatchArena<Command> = BatchArena::new(64, 4);
///
/// let mut batch = arena.take();     // simulation thread
/// batch.push(command);
/// sender.send(batch)?;
///
/// for cmd in batch.drain(..) { ... } // core thread
/// arena.recycle(batch);
/// ```
pub struct BatchArena<T> {
    free: Mutex<Vec<Vec<T>>>,
    batch_capacity: usize,
    max_retained: usize,
    fresh: AtomicU64,
    reused: AtomicU64,
    discarded: AtomicU64,
}

impl<T> BatchArena<T> {
    /// Creates an arena handing out batches with `batch_capacity` slots and
    /// keeping at most `max_retained` idle batches.
    #[must_use]
    pub fn new(batch_capacity: usize, max_retained: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_retained)),
            batch_capacity,
            max_retained,
            fresh: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Takes an empty batch, reusing a recycled one when available.
    pub fn take(&self) -> Vec<T> {
        if let Some(batch) = self.free.lock().pop() {
            self.reused.fetch_add(1, Ordering::Relaxed);
            return batch;
        }
        self.fresh.fetch_add(1, Ordering::Relaxed);
        Vec::with_capacity(self.batch_capacity)
    }

    /// Returns a batch to the arena.
    ///
    /// Remaining elements are dropped here, so anything the batch still owns
    /// is released before the storage is reused.
    pub fn recycle(&self, mut batch: Vec<T>) {
        batch.clear();
        let mut free = self.free.lock();
        if free.len() < self.max_retained {
            free.push(batch);
        } else {
            drop(free);
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of idle batches ready for reuse.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.free.lock().len()
    }

    /// Returns allocation statistics.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            fresh: self.fresh.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_recycled_batch_is_reused() {
        let arena: BatchArena<u32> = BatchArena::new(16, 2);

        let mut batch = arena.take();
        batch.extend([1, 2, 3]);
        let ptr = batch.as_ptr();
        arena.recycle(batch);

        let batch = arena.take();
        assert!(batch.is_empty());
        assert_eq!(batch.as_ptr(), ptr);
        assert_eq!(arena.stats(), ArenaStats { fresh: 1, reused: 1, discarded: 0 });
    }

    #[test]
    fn test_retention_is_bounded() {
        let arena: BatchArena<u8> = BatchArena::new(4, 1);
        let a = arena.take();
        let b = arena.take();
        arena.recycle(a);
        arena.recycle(b);
        assert_eq!(arena.retained(), 1);
        assert_eq!(arena.stats().discarded, 1);
    }

    #[test]
    fn test_recycle_releases_owned_values() {
        let arena: BatchArena<Arc<()>> = BatchArena::new(4, 4);
        let shared = Arc::new(());
        let mut batch = arena.take();
        batch.push(Arc::clone(&shared));
        assert_eq!(Arc::strong_count(&shared), 2);

        arena.recycle(batch);
        assert_eq!(Arc::strong_count(&shared), 1);
    }
}
