//! Weak-reference deduplication cache.
//!
//! ```text
//! acquire(desc)
//!   ├─ lock ─ live entry?  ──yes──► strong ref
//!   │         expired?     ──────► remove entry
//!   ├─ unlock
//!   ├─ allocate id, construct          (no lock held)
//!   └─ lock ─ insert weak entry ─ unlock
//! ```
//!
//! Lookup-then-insert is not atomic. Two threads missing on the same
//! descriptor both construct a value-equal state; the later insert occupies
//! the slot. Both returned states are valid.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use dyad_core::BoundedCounter;
use parking_lot::Mutex;

use crate::error::RenderResult;
use crate::state::StateId;

struct CacheEntry<S> {
    state: Weak<S>,
    id: StateId,
}

/// Maps a descriptor to at most one live state object.
pub struct StateCache<D, S> {
    entries: Mutex<HashMap<D, CacheEntry<S>>>,
    ids: BoundedCounter,
}

impl<D, S> StateCache<D, S>
where
    D: Clone + Eq + Hash,
{
    /// Creates a cache whose ids fit in `bits` bits.
    #[must_use]
    pub fn new(category: &'static str, bits: u32) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ids: BoundedCounter::new(category, bits),
        }
    }

    /// Category name.
    #[must_use]
    pub fn category(&self) -> &'static str {
        self.ids.category()
    }

    /// Returns the live state for `desc`, or builds one with `create`.
    ///
    /// `create` receives the freshly allocated id and runs without the map
    /// lock held.
    ///
    /// # Errors
    ///
    /// Whatever `create` returns. The allocated id is not reused.
    ///
    /// # Panics
    ///
    /// When the id space of the category is exhausted.
    pub fn try_acquire_with<F>(&self, desc: &D, create: F) -> RenderResult<Arc<S>>
    where
        F: FnOnce(StateId) -> RenderResult<S>,
    {
        if let Some(state) = self.lookup(desc) {
            return Ok(state);
        }

        let id = self.ids.allocate_or_abort();
        let state = Arc::new(create(id)?);

        self.entries.lock().insert(
            desc.clone(),
            CacheEntry {
                state: Arc::downgrade(&state),
                id,
            },
        );
        Ok(state)
    }

    fn lookup(&self, desc: &D) -> Option<Arc<S>> {
        let mut entries = self.entries.lock();
        let entry = entries.get(desc)?;
        if let Some(state) = entry.state.upgrade() {
            return Some(state);
        }
        entries.remove(desc);
        None
    }

    /// Id of the live state for `desc`.
    #[must_use]
    pub fn id_of(&self, desc: &D) -> Option<StateId> {
        self.entries
            .lock()
            .get(desc)
            .filter(|entry| entry.state.strong_count() > 0)
            .map(|entry| entry.id)
    }

    /// Entries in the map, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if the map holds no entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Entries whose state is still referenced.
    #[must_use]
    pub fn live_entries(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.state.strong_count() > 0)
            .count()
    }

    /// Ids handed out so far.
    #[must_use]
    pub fn ids_allocated(&self) -> u64 {
        self.ids.allocated()
    }
}
