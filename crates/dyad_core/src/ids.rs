//! # Bounded Identifiers
//!
//! Ids that must fit a fixed number of bits, because they are packed next to
//! other ids (draw sort keys, state hashes). Allocation is monotonic and never
//! wraps: running out is a hard structural limit, not a transient condition.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{CoreError, CoreResult};

/// An id guaranteed to fit the bit width of the counter that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct BoundedId(u32);

impl BoundedId {
    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for BoundedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic id counter limited to `bits` bits.
///
/// Thread-safe; ids are handed out in strictly increasing order.
#[derive(Debug)]
pub struct BoundedCounter {
    category: &'static str,
    bits: u32,
    next: AtomicU64,
}

impl BoundedCounter {
    /// Creates a counter for `category` with ids in `0..2^bits`.
    ///
    /// # Panics
    ///
    /// Panics if `bits` is zero or larger than 32.
    #[must_use]
    pub fn new(category: &'static str, bits: u32) -> Self {
        assert!(
            (1..=32).contains(&bits),
            "bounded counter for {category} needs 1..=32 bits, got {bits}"
        );
        Self {
            category,
            bits,
            next: AtomicU64::new(0),
        }
    }

    /// Category name used in diagnostics.
    #[inline]
    #[must_use]
    pub const fn category(&self) -> &'static str {
        self.category
    }

    /// Declared bit width.
    #[inline]
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Number of distinct ids this counter can ever produce.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        1u64 << self.bits
    }

    /// Number of ids handed out so far.
    #[inline]
    #[must_use]
    pub fn allocated(&self) -> u64 {
        self.next.load(Ordering::Acquire)
    }

    /// Allocates the next id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IdExhausted`] once all `2^bits` ids were used.
    /// The counter stays exhausted; it never wraps.
    #[allow(clippy::cast_possible_truncation)] // id < 2^bits <= 2^32
    pub fn allocate(&self) -> CoreResult<BoundedId> {
        let capacity = self.capacity();
        self.next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |next| {
                (next < capacity).then_some(next + 1)
            })
            .map(|id| BoundedId(id as u32))
            .map_err(|_| CoreError::IdExhausted {
                category: self.category,
                bits: self.bits,
            })
    }

    /// Fatal form of [`BoundedCounter::allocate`].
    ///
    /// # Panics
    ///
    /// Panics when the id space is exhausted.
    #[track_caller]
    pub fn allocate_or_abort(&self) -> BoundedId {
        match self.allocate() {
            Ok(id) => id,
            Err(err) => panic!("fatal: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let counter = BoundedCounter::new("sampler", 8);
        let a = counter.allocate().unwrap();
        let b = counter.allocate().unwrap();
        let c = counter.allocate().unwrap();
        assert!(a < b && b < c);
        assert_eq!(c.value(), 2);
        assert_eq!(counter.allocated(), 3);
    }

    #[test]
    fn test_ids_never_exceed_bit_width() {
        let counter = BoundedCounter::new("blend", 4);
        let ids: Vec<_> = std::iter::from_fn(|| counter.allocate().ok()).collect();
        assert_eq!(ids.len(), 16);
        assert!(ids.iter().all(|id| id.value() < 16));
        assert_eq!(
            counter.allocate(),
            Err(CoreError::IdExhausted { category: "blend", bits: 4 })
        );
        // stays exhausted
        assert!(counter.allocate().is_err());
        assert_eq!(counter.allocated(), 16);
    }

    #[test]
    #[should_panic(expected = "identifier space exhausted for rasterizer")]
    fn test_exhaustion_is_fatal() {
        let counter = BoundedCounter::new("rasterizer", 1);
        let _ = counter.allocate_or_abort();
        let _ = counter.allocate_or_abort();
        let _ = counter.allocate_or_abort();
    }

    #[test]
    fn test_full_width_counter() {
        let counter = BoundedCounter::new("pipeline", 32);
        assert_eq!(counter.capacity(), 1u64 << 32);
        assert_eq!(counter.allocate().unwrap().value(), 0);
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let counter = Arc::new(BoundedCounter::new("depth_stencil", 12));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&counter);
                std::thread::spawn(move || (0..1000).map(|_| c.allocate().unwrap()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
