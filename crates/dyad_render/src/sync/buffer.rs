//! # Sync Buffer
//!
//! One record per dirty object per drain. The record type is owned by the
//! back object class (`BackObject::Record`), so the builder and the applier
//! agree on the field layout at compile time.

use crate::sync::dirty::DirtyMask;

/// A captured record tagged with the dirty mask it was built for.
#[derive(Debug, Clone)]
pub struct SyncBuffer<R> {
    mask: DirtyMask,
    cycle: u64,
    record: R,
}

impl<R> SyncBuffer<R> {
    /// Wraps a record built during drain `cycle`.
    #[inline]
    #[must_use]
    pub fn new(mask: DirtyMask, cycle: u64, record: R) -> Self {
        Self { mask, cycle, record }
    }

    /// Categories the record covers.
    #[inline]
    #[must_use]
    pub fn mask(&self) -> DirtyMask {
        self.mask
    }

    /// Drain cycle that produced the buffer.
    #[inline]
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Borrows the record.
    #[inline]
    #[must_use]
    pub fn record(&self) -> &R {
        &self.record
    }

    /// Moves the record out; embedded handles go with it.
    #[inline]
    #[must_use]
    pub fn into_parts(self) -> (DirtyMask, u64, R) {
        (self.mask, self.cycle, self.record)
    }
}
