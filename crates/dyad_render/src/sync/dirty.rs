//! # Dirty Mask & Dirty Registry
//!
//! Every marking mutation ORs a category into the object's pending mask and
//! registers the object once per drain cycle. At the synchronization point
//! the simulation thread drains the registry: one sync task per object whose
//! mask is non-empty, followed by every teardown queued since the last drain.
//!
//! ```text
//! set_transform() ──► pending |= TRANSFORM ──┐
//! set_mesh()      ──► pending |= REFERENCES ─┤ registered once
//!                                            ▼
//!                      drain() ──► [apply(obj, TRANSFORM|REFERENCES), ..., teardown, ...]
//! ```

use std::ops::{BitOr, BitOrAssign};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Weak;

use parking_lot::Mutex;

use crate::sync::tasks::CoreTask;

/// Categories of pending front-side changes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct DirtyMask(u32);

impl DirtyMask {
    /// Nothing changed.
    pub const NONE: Self = Self(0);
    /// World transform only. The only category applied without a rebuild.
    pub const TRANSFORM: Self = Self(1 << 0);
    /// Owned data (geometry, parameters, sizes).
    pub const DATA: Self = Self(1 << 1);
    /// Handles to other front objects.
    pub const REFERENCES: Self = Self(1 << 2);
    /// Active/enabled toggle. Always a full remove/add.
    pub const ACTIVE: Self = Self(1 << 3);
    /// Small scalar properties (colors, flags, layers).
    pub const PROPERTIES: Self = Self(1 << 4);
    /// Everything changed.
    pub const ALL: Self = Self(u32::MAX);

    /// Creates a mask from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if no category is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every category of `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any category of `other` is set.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True if the transform is the only change.
    #[inline]
    #[must_use]
    pub const fn is_transform_only(self) -> bool {
        self.0 == Self::TRANSFORM.0
    }
}

impl BitOr for DirtyMask {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DirtyMask {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Debug for DirtyMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(DirtyMask, &str); 5] = [
            (DirtyMask::TRANSFORM, "TRANSFORM"),
            (DirtyMask::DATA, "DATA"),
            (DirtyMask::REFERENCES, "REFERENCES"),
            (DirtyMask::ACTIVE, "ACTIVE"),
            (DirtyMask::PROPERTIES, "PROPERTIES"),
        ];
        if *self == Self::ALL {
            return f.write_str("DirtyMask(ALL)");
        }
        f.write_str("DirtyMask(")?;
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("NONE")?;
        }
        f.write_str(")")
    }
}

/// Per-object dirty accumulator.
#[derive(Debug, Default)]
pub(crate) struct DirtyState {
    pending: AtomicU32,
    registered: AtomicBool,
}

impl DirtyState {
    /// ORs `mask` into the pending mask. Returns true if the object still
    /// needs to be registered for this cycle.
    #[inline]
    pub(crate) fn mark(&self, mask: DirtyMask) -> bool {
        self.pending.fetch_or(mask.bits(), Ordering::AcqRel);
        !self.registered.swap(true, Ordering::AcqRel)
    }

    /// Clears the registration and takes the pending mask.
    #[inline]
    pub(crate) fn take(&self) -> DirtyMask {
        self.registered.store(false, Ordering::Release);
        DirtyMask::from_bits(self.pending.swap(0, Ordering::AcqRel))
    }

    /// Discards pending changes without touching the registration.
    #[inline]
    pub(crate) fn discard(&self) {
        self.pending.store(0, Ordering::Release);
    }

    #[inline]
    pub(crate) fn pending(&self) -> DirtyMask {
        DirtyMask::from_bits(self.pending.load(Ordering::Acquire))
    }
}

/// Anything the registry can turn into a sync task at drain time.
pub(crate) trait DirtySource: Send + Sync {
    /// Takes the pending mask and builds the sync task for `cycle`.
    ///
    /// Returns `None` if nothing needs to be sent.
    fn take_sync_task(&self, cycle: u64) -> Option<Box<dyn CoreTask>>;
}

/// Outcome of one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Drain cycle number, starting at 1.
    pub cycle: u64,
    /// Registered objects still alive at drain time.
    pub objects_visited: usize,
    /// Sync buffers produced.
    pub buffers_built: usize,
    /// Teardowns appended after the buffers.
    pub teardowns: usize,
}

impl DrainReport {
    /// Total commands the drain produced.
    #[inline]
    #[must_use]
    pub fn commands(&self) -> usize {
        self.buffers_built + self.teardowns
    }
}

/// Set of front objects with pending changes, plus queued teardowns.
///
/// Both locks are held only across the vector mutation, never while a sync
/// buffer is built.
#[derive(Default)]
pub(crate) struct DirtyRegistry {
    pending: Mutex<Vec<Weak<dyn DirtySource>>>,
    teardowns: Mutex<Vec<Box<dyn CoreTask>>>,
    cycle: AtomicU64,
}

impl DirtyRegistry {
    /// Marks `state` dirty and registers `source` if this is the first mark
    /// of the cycle.
    pub(crate) fn mark(
        &self,
        state: &DirtyState,
        mask: DirtyMask,
        source: impl FnOnce() -> Weak<dyn DirtySource>,
    ) {
        if mask.is_empty() {
            return;
        }
        if state.mark(mask) {
            self.pending.lock().push(source());
        }
    }

    /// Queues a teardown for the next drain.
    pub(crate) fn enqueue_teardown(&self, task: Box<dyn CoreTask>) {
        self.teardowns.lock().push(task);
    }

    /// Number of objects registered for the next drain.
    pub(crate) fn registered(&self) -> usize {
        self.pending.lock().len()
    }

    /// Builds one task per dirty object into `batch`, then appends the
    /// queued teardowns.
    pub(crate) fn drain(&self, batch: &mut Vec<Box<dyn CoreTask>>) -> DrainReport {
        let cycle = self.cycle.fetch_add(1, Ordering::Relaxed) + 1;
        let mut sources = std::mem::take(&mut *self.pending.lock());

        let mut report = DrainReport {
            cycle,
            ..DrainReport::default()
        };
        for source in sources.drain(..) {
            // A destroyed object sends nothing; its teardown is already queued.
            let Some(source) = source.upgrade() else {
                continue;
            };
            report.objects_visited += 1;
            if let Some(task) = source.take_sync_task(cycle) {
                batch.push(task);
                report.buffers_built += 1;
            }
        }

        // Hand the storage back unless a re-entrant mark already refilled it.
        {
            let mut pending = self.pending.lock();
            if pending.is_empty() {
                *pending = sources;
            }
        }

        let mut teardowns = std::mem::take(&mut *self.teardowns.lock());
        report.teardowns = teardowns.len();
        batch.append(&mut teardowns);
        report
    }
}
