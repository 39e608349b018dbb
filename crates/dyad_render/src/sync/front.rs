//! # Front Objects
//!
//! The simulation-thread half of a front/back pair. A [`Front`] owns the
//! authoritative intended state, accumulates a dirty mask and, after
//! [`Front::create_back`], holds exactly one [`BackHandle`].
//!
//! ## Lifecycle
//!
//! ```text
//! Front::new ──► create_back() ──► modify()/mark_dirty() ... ──► drop
//!                     │                  │                        │
//!              ConstructTask       ApplyTask per drain       TeardownTask
//! ```

use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::context::SyncContext;
use crate::sync::buffer::SyncBuffer;
use crate::sync::dirty::{DirtyMask, DirtySource, DirtyState};
use crate::sync::object::{BackHandle, BackObject};
use crate::sync::tasks::{ApplyTask, ConstructTask, CoreTask, TeardownTask};

/// Simulation-side state of a front/back pair.
pub trait FrontObject: Send + 'static {
    /// The core-thread counterpart.
    type Back: BackObject;

    /// Captures the one-time construction descriptor.
    fn describe(&self) -> <Self::Back as BackObject>::Desc;

    /// Captures the sync record for `mask`.
    ///
    /// Handles to other front objects are resolved here, on the simulation
    /// thread. A dependency without a ready back is recorded as `None`.
    fn build_record(&self, mask: DirtyMask) -> <Self::Back as BackObject>::Record;
}

pub(crate) struct FrontCell<F: FrontObject> {
    ctx: SyncContext,
    state: Mutex<F>,
    dirty: DirtyState,
    back: OnceLock<BackHandle<F::Back>>,
}

impl<F: FrontObject> DirtySource for FrontCell<F> {
    fn take_sync_task(&self, cycle: u64) -> Option<Box<dyn CoreTask>> {
        let mask = self.dirty.take();
        if mask.is_empty() {
            return None;
        }
        // Marked before create_back(): the descriptor already carried it.
        let back = self.back.get()?;
        let record = self.state.lock().build_record(mask);
        Some(Box::new(ApplyTask::new(
            back.clone(),
            SyncBuffer::new(mask, cycle, record),
        )))
    }
}

impl<F: FrontObject> Drop for FrontCell<F> {
    fn drop(&mut self) {
        if let Some(back) = self.back.take() {
            self.ctx
                .registry()
                .enqueue_teardown(Box::new(TeardownTask::new(back)));
        }
    }
}

/// Shared handle to a front object.
///
/// Clones refer to the same object. The teardown is queued when the last
/// clone is dropped.
pub struct Front<F: FrontObject>(Arc<FrontCell<F>>);

impl<F: FrontObject> Clone for Front<F> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<F: FrontObject> Front<F> {
    /// Wraps `state` in a front object bound to `ctx`. No back exists yet.
    #[must_use]
    pub fn new(ctx: &SyncContext, state: F) -> Self {
        Self(Arc::new(FrontCell {
            ctx: ctx.clone(),
            state: Mutex::new(state),
            dirty: DirtyState::default(),
            back: OnceLock::new(),
        }))
    }

    /// Queues construction of the back object and returns immediately.
    ///
    /// Calling it again returns the existing handle.
    pub fn create_back(&self) -> &BackHandle<F::Back> {
        let cell = &*self.0;
        cell.back.get_or_init(|| {
            let desc = cell.state.lock().describe();
            cell.dirty.discard();
            let back = BackHandle::new(cell.ctx.next_object_id());
            cell.ctx
                .submit_construct(Box::new(ConstructTask::new(back.clone(), desc)));
            back
        })
    }

    /// The back handle, if `create_back()` was called.
    #[inline]
    #[must_use]
    pub fn back(&self) -> Option<&BackHandle<F::Back>> {
        self.0.back.get()
    }

    /// The back handle, if its construction already completed.
    #[must_use]
    pub fn back_if_ready(&self) -> Option<BackHandle<F::Back>> {
        self.0.back.get().filter(|back| back.is_ready()).cloned()
    }

    /// Blocks until the back object exists and returns its handle.
    ///
    /// # Panics
    ///
    /// If `create_back()` was never called, or construction failed.
    #[track_caller]
    pub fn block_until_ready(&self) -> &BackHandle<F::Back> {
        let Some(back) = self.0.back.get() else {
            panic!(
                "usage error: block_until_ready on a {} front without create_back",
                <F::Back as BackObject>::KIND
            );
        };
        back.block_until_ready();
        back
    }

    /// Reads the front state.
    pub fn read<R>(&self, f: impl FnOnce(&F) -> R) -> R {
        f(&self.0.state.lock())
    }

    /// Mutates the front state and marks `mask` dirty.
    pub fn modify<R>(&self, mask: DirtyMask, f: impl FnOnce(&mut F) -> R) -> R {
        let out = f(&mut self.0.state.lock());
        self.mark_dirty(mask);
        out
    }

    /// ORs `mask` into the pending mask and registers for the next drain.
    pub fn mark_dirty(&self, mask: DirtyMask) {
        self.0.ctx.registry().mark(&self.0.dirty, mask, || {
            let weak: Weak<dyn DirtySource> = Arc::downgrade(&self.0) as Weak<dyn DirtySource>;
            weak
        });
    }

    /// Changes accumulated since the last drain.
    #[must_use]
    pub fn pending_mask(&self) -> DirtyMask {
        self.0.dirty.pending()
    }

    /// Context the object belongs to.
    #[must_use]
    pub fn context(&self) -> &SyncContext {
        &self.0.ctx
    }

    /// True if both handles refer to the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<F: FrontObject> std::fmt::Debug for Front<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Front")
            .field("kind", &<F::Back as BackObject>::KIND)
            .field("back", &self.0.back.get())
            .field("pending", &self.pending_mask())
            .finish()
    }
}
