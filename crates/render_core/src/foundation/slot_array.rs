//! Generation-indexed slot array
//!
//! Fixed-capacity pool that hands out small copyable [`Handle`]s instead of
//! references. Each slot carries a generation counter which is bumped when the
//! slot is released, so every handle issued before the release stops
//! validating even after the slot is reused.
//!
//! ```text
//! reserve() -> {index: 3, generation: 0}
//! destroy([{3, 0}])        generation[3] = 1, 3 pushed to free list
//! reserve() -> {index: 3, generation: 1}
//! is_valid({3, 0}) == false
//! ```
//!
//! Running out of slots and destroying an invalid handle are both logic bugs
//! and panic immediately.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Largest capacity a slot array may have; indices must fit in a `u16`
pub const MAX_SLOT_CAPACITY: usize = 1 << 16;

/// Opaque `{index, generation}` reference into a [`SlotArray`]
///
/// The type parameter only tags which storage the handle belongs to, so a
/// mesh handle cannot be passed where a material handle is expected.
pub struct Handle<T> {
    index: u16,
    generation: u16,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Build a handle from raw parts
    ///
    /// Only useful for tests and debugging; real handles come from
    /// [`SlotArray::reserve`].
    pub const fn from_raw_parts(index: u16, generation: u16) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Slot index
    pub const fn index(self) -> u16 {
        self.index
    }

    /// Generation the slot had when this handle was issued
    pub const fn generation(self) -> u16 {
        self.generation
    }
}

// Manual impls: derives would put bounds on `T`, which is only a tag.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.index, self.generation).cmp(&(other.index, other.generation))
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Fixed-capacity generation counters plus a free list
pub struct SlotArray<T> {
    generation: Vec<u16>,
    free: Vec<u16>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SlotArray<T> {
    /// Create an array with `capacity` free slots, all at generation zero
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity <= MAX_SLOT_CAPACITY,
            "Slot array capacity {} exceeds the maximum of {}",
            capacity,
            MAX_SLOT_CAPACITY
        );
        // Stored reversed so the first reservation pops index 0.
        let free = (0..capacity).rev().map(|index| index as u16).collect();
        Self {
            generation: vec![0; capacity],
            free,
            _marker: PhantomData,
        }
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.generation.len()
    }

    /// Number of reserved slots
    pub fn len(&self) -> usize {
        self.capacity() - self.free.len()
    }

    /// True when nothing is reserved
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take a free slot
    ///
    /// # Panics
    /// When every slot is already reserved. Capacities are a design-time
    /// budget, so running out means the budget is wrong.
    #[must_use]
    pub fn reserve(&mut self) -> Handle<T> {
        let Some(index) = self.free.pop() else {
            panic!(
                "Exceeding the capacity of the generation index array ({})",
                self.capacity()
            );
        };
        Handle::from_raw_parts(index, self.generation[usize::from(index)])
    }

    /// Whether `handle` still refers to a live slot
    pub fn is_valid(&self, handle: Handle<T>) -> bool {
        self.generation
            .get(usize::from(handle.index))
            .is_some_and(|&generation| generation == handle.generation)
    }

    /// Panic with a uniform diagnostic if `handle` is out of range or stale
    ///
    /// `kind` names the resource in the message, e.g. `"mesh"`.
    pub fn assert_valid(&self, handle: Handle<T>, kind: &str) {
        assert!(
            usize::from(handle.index) < self.capacity(),
            "{} handle is invalid: index ({}) out of range [0, {})",
            kind,
            handle.index,
            self.capacity()
        );
        assert!(
            self.is_valid(handle),
            "Using a {} with an invalid handle {:?}. Either it has been destroyed or the handle is ill-formed",
            kind,
            handle
        );
    }

    /// Release slots, invalidating every handle issued for them
    ///
    /// # Panics
    /// When any handle is already invalid; double destroy is a bug.
    pub fn destroy(&mut self, handles: &[Handle<T>]) {
        for &handle in handles {
            assert!(
                self.is_valid(handle),
                "Cannot destroy an invalid entry {:?}",
                handle
            );
            let slot = &mut self.generation[usize::from(handle.index)];
            *slot = slot.wrapping_add(1);
            self.free.push(handle.index);
        }
    }

    /// Indices of every reserved slot in ascending order
    pub fn live_indices(&self) -> Vec<u16> {
        let mut is_free = vec![false; self.capacity()];
        for &index in &self.free {
            is_free[usize::from(index)] = true;
        }
        is_free
            .iter()
            .enumerate()
            .filter(|(_, &free)| !free)
            .map(|(index, _)| index as u16)
            .collect()
    }

    /// Handles for every reserved slot, at their current generation
    pub fn live_handles(&self) -> Vec<Handle<T>> {
        self.live_indices()
            .into_iter()
            .map(|index| Handle::from_raw_parts(index, self.generation[usize::from(index)]))
            .collect()
    }
}

impl<T> fmt::Debug for SlotArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotArray")
            .field("capacity", &self.capacity())
            .field("live", &self.len())
            .finish()
    }
}
