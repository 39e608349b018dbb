//! # Double-Buffered Property Snapshot
//!
//! Small property blocks that the core thread owns but the simulation thread
//! must be able to read between sync cycles.
//!
//! ## Architecture
//!
//! ```text
//!      Core thread                                Simulation thread
//!  ┌──────────────────┐    ┌─────────────────┐    ┌──────────────────┐
//!  │ SnapshotPublisher│───►│ SpinLock<Shared>│───►│  SnapshotView    │
//!  │  publish(&block) │    │ block+generation│    │  pull() → local  │
//!  └──────────────────┘    └─────────────────┘    └──────────────────┘
//! ```
//!
//! The whole block is copied under the lock, in both directions. There is no
//! field-level granularity: a reader never sees half of a publish.

use std::sync::Arc;

use crate::sync::spin::SpinLock;

struct Shared<T> {
    block: T,
    generation: u64,
}

/// Creates a connected publisher/view pair seeded with `initial`.
#[must_use]
pub fn property_snapshot<T: Clone>(initial: T) -> (SnapshotPublisher<T>, SnapshotView<T>) {
    let shared = Arc::new(SpinLock::new(Shared {
        block: initial.clone(),
        generation: 0,
    }));
    (
        SnapshotPublisher {
            shared: Arc::clone(&shared),
        },
        SnapshotView {
            shared,
            local: initial,
            seen_generation: 0,
        },
    )
}

/// Core-side writer of a property snapshot.
pub struct SnapshotPublisher<T> {
    shared: Arc<SpinLock<Shared<T>>>,
}

impl<T> Clone for SnapshotPublisher<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> SnapshotPublisher<T> {
    /// Overwrites the shared block and bumps its generation.
    pub fn publish(&self, block: &T) {
        let mut shared = self.shared.lock();
        shared.block.clone_from(block);
        shared.generation += 1;
    }

    /// Returns the number of publishes so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }
}

/// Simulation-side reader holding the thread-local copy.
pub struct SnapshotView<T> {
    shared: Arc<SpinLock<Shared<T>>>,
    local: T,
    seen_generation: u64,
}

impl<T: Clone> SnapshotView<T> {
    /// Copies the shared block into the local view.
    ///
    /// Returns true if the shared block was newer than the local copy.
    pub fn pull(&mut self) -> bool {
        let shared = self.shared.lock();
        if shared.generation == self.seen_generation {
            return false;
        }
        self.local.clone_from(&shared.block);
        self.seen_generation = shared.generation;
        true
    }

    /// Returns the local copy as of the last [`SnapshotView::pull`].
    #[inline]
    #[must_use]
    pub fn local(&self) -> &T {
        &self.local
    }

    /// Generation of the local copy.
    #[inline]
    #[must_use]
    pub fn seen_generation(&self) -> u64 {
        self.seen_generation
    }
}
