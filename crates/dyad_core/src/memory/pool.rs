//! # Slot Pool
//!
//! Generation-checked slot storage for objects that come and go at runtime
//! (registered render objects, live tracker entries).

/// Handle to a value stored in a [`SlotPool`].
///
/// Split like an entity id: slot index plus the generation of that slot when
/// the value was inserted. A handle to a removed value never aliases the
/// value that later reuses the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    index: u32,
    generation: u32,
}

impl SlotHandle {
    /// Slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Growable pool with a free list and generation-checked handles.
///
/// # Thread Safety
///
/// Not thread-safe. Owned by a single thread (the core thread for the
/// object index).
pub struct SlotPool<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    len: usize,
}

impl<T> SlotPool<T> {
    /// Creates a pool with room for `capacity` values before growing.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Number of live values.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no value is stored.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a value, reusing a free slot when one exists.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` slots would be needed.
    pub fn insert(&mut self, value: T) -> SlotHandle {
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return SlotHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).unwrap_or_else(|_| panic!("slot pool overflow"));
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        SlotHandle { index, generation: 0 }
    }

    /// Removes and returns a value. Stale handles return `None`.
    pub fn remove(&mut self, handle: SlotHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Gets a value. Stale handles return `None`.
    #[must_use]
    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?
            .value
            .as_ref()
    }

    /// Gets a value mutably. Stale handles return `None`.
    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?
            .value
            .as_mut()
    }

    /// Iterates over live values.
    pub fn iter(&self) -> impl Iterator<Item = (SlotHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            #[allow(clippy::cast_possible_truncation)] // insert() bounds the slot count
            let index = index as u32;
            Some((SlotHandle { index, generation: slot.generation }, value))
        })
    }
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
