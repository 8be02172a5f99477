//! # Handle Pool
//!
//! Fixed-capacity slot storage handing out generational handles instead of
//! references.

use std::mem;

use crate::handle::{Handle, RawHandle};

/// Resources stored in a [`HandlePool`].
///
/// Slots are constructed up front with `Default` and reused for the lifetime
/// of the pool. The pool calls [`free`](Self::free) when a handle is released;
/// callers never call it directly.
pub trait PooledResource: Default {
    /// Releases whatever the resource holds. The default resets it to
    /// `Default`.
    fn free(&mut self) {
        *self = Self::default();
    }
}

/// One slot: the resource, its generation counter, and the handle it is
/// currently issued under (`RawHandle::INVALID` while free).
struct Slot<T> {
    resource: T,
    handle: RawHandle,
    generation: u32,
}

/// A pool of `T` addressed through generational handles.
///
/// Allocation, free and lookup are all **O(1)** with **zero heap
/// allocations** after construction. Slot 0 is reserved and never issued.
/// Each allocation bumps the slot's generation, so a handle kept after its
/// slot was freed and reused no longer matches and is caught on lookup.
///
/// A slot whose generation reaches the pool's limit is retired when it is
/// next freed: it is never pushed back onto the free list, so a generation
/// value can never be issued twice for the same index.
///
/// # Thread Safety
///
/// Allocation and free require `&mut self`. Lookups take `&self`, so the
/// pool can be shared read-only across threads during a frame when `T: Sync`.
///
/// # Example
///
/// ```rust
/// use kiln_core::{HandlePool, PooledResource};
///
/// #[derive(Default)]
/// struct Mesh { vertices: u32 }
/// impl PooledResource for Mesh {}
///
/// let mut pool: HandlePool<Mesh> = HandlePool::new(16);
/// let (handle, mesh) = pool.get_next_free_handle().expect("pool has room");
/// mesh.vertices = 36;
///
/// assert_eq!(pool.look_up(handle).vertices, 36);
/// pool.free_handle(handle);
/// assert!(!pool.is_valid(handle));
/// ```
pub struct HandlePool<T> {
    /// Slot storage, index 0 reserved.
    slots: Box<[Slot<T>]>,
    /// Free list - indices of available slots, top is issued next.
    free_list: Vec<u32>,
    /// Number of live handles.
    allocated_count: usize,
    /// Number of slots retired after running out of generations.
    retired_count: usize,
    /// Highest generation a slot may reach.
    generation_limit: u32,
}

impl<T: PooledResource> HandlePool<T> {
    /// Creates a pool with `capacity` usable slots.
    ///
    /// All memory is pre-allocated upfront.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or does not fit the handle index.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_generation_limit(capacity, u32::MAX)
    }

    /// Creates a pool whose slots retire after `generation_limit` uses.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of usable slots
    /// * `generation_limit` - Highest generation a slot may be issued with
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or too large, or `generation_limit` is zero.
    #[must_use]
    pub fn with_generation_limit(capacity: usize, generation_limit: u32) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(generation_limit > 0, "Generation limit must be greater than zero");
        let top = u32::try_from(capacity)
            .ok()
            .filter(|&top| top < u32::MAX)
            .unwrap_or_else(|| panic!("capacity {capacity} does not fit a handle index"));

        let slots: Vec<Slot<T>> = (0..=capacity)
            .map(|_| Slot {
                resource: T::default(),
                handle: RawHandle::INVALID,
                generation: 0,
            })
            .collect();

        // Reversed so that slot 1 is popped first.
        let free_list: Vec<u32> = (1..=top).rev().collect();

        Self {
            slots: slots.into_boxed_slice(),
            free_list,
            allocated_count: 0,
            retired_count: 0,
            generation_limit,
        }
    }

    /// Issues a handle to a free slot.
    ///
    /// Returns the handle together with mutable access to the slot's resource
    /// so the caller can initialise it, or `None` if every slot is in use.
    pub fn get_next_free_handle(&mut self) -> Option<(Handle<T>, &mut T)> {
        let Some(index) = self.free_list.pop() else {
            tracing::warn!(capacity = self.capacity(), "handle pool exhausted");
            return None;
        };

        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.generation < self.generation_limit);
        slot.generation += 1;
        slot.handle = RawHandle::new(index, slot.generation);
        self.allocated_count += 1;

        Some((Handle::from_raw(slot.handle), &mut slot.resource))
    }

    /// Releases a handle, running the resource's [`PooledResource::free`] hook.
    ///
    /// # Panics
    ///
    /// Panics if the handle is out of range or no longer live (double free or
    /// use after free).
    pub fn free_handle(&mut self, handle: Handle<T>) {
        let index = self.checked_index(handle.raw());
        let slot = &mut self.slots[index];

        slot.resource.free();
        slot.handle = RawHandle::INVALID;
        self.allocated_count -= 1;

        if slot.generation >= self.generation_limit {
            self.retired_count += 1;
            tracing::debug!(index, "slot retired after exhausting its generations");
        } else {
            self.free_list.push(handle.index());
        }
    }
}

impl<T> HandlePool<T> {
    /// Returns the resource behind a live handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle is out of range or stale.
    #[must_use]
    pub fn look_up(&self, handle: Handle<T>) -> &T {
        let index = self.checked_index(handle.raw());
        &self.slots[index].resource
    }

    /// Returns the resource behind a live handle, mutably.
    ///
    /// # Panics
    ///
    /// Panics if the handle is out of range or stale.
    #[must_use]
    pub fn look_up_mut(&mut self, handle: Handle<T>) -> &mut T {
        let index = self.checked_index(handle.raw());
        &mut self.slots[index].resource
    }

    /// Non-panicking lookup for code that cannot guarantee handle lifetime,
    /// such as tools inspecting another system's handles.
    #[must_use]
    pub fn try_look_up(&self, handle: Handle<T>) -> Option<&T> {
        let raw = handle.raw();
        if raw.is_null() {
            return None;
        }
        self.slots
            .get(raw.index() as usize)
            .filter(|slot| slot.handle == raw)
            .map(|slot| &slot.resource)
    }

    /// Checks whether a handle is currently live.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, handle: Handle<T>) -> bool {
        self.try_look_up(handle).is_some()
    }

    /// Returns the number of usable slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Returns the number of live handles.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.allocated_count
    }

    /// Returns true if no handle is live.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.allocated_count == 0
    }

    /// Returns the number of slots that can still be issued.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Returns the number of retired slots.
    #[inline]
    #[must_use]
    pub const fn retired_count(&self) -> usize {
        self.retired_count
    }

    /// Returns the highest generation a slot may reach.
    #[inline]
    #[must_use]
    pub const fn generation_limit(&self) -> u32 {
        self.generation_limit
    }

    /// Bytes owned by the pool, including slot storage and the free list.
    #[must_use]
    pub fn get_memory_footprint(&self) -> usize {
        mem::size_of::<Self>()
            + self.slots.len() * mem::size_of::<Slot<T>>()
            + self.free_list.capacity() * mem::size_of::<u32>()
    }

    /// Iterates over live handles and their resources.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots
            .iter()
            .filter(|slot| !slot.handle.is_null())
            .map(|slot| (Handle::from_raw(slot.handle), &slot.resource))
    }

    fn checked_index(&self, raw: RawHandle) -> usize {
        let index = raw.index() as usize;
        assert!(
            index != 0 && index < self.slots.len(),
            "handle {raw:?} is out of range for a pool of {} slots",
            self.slots.len() - 1
        );
        let current = self.slots[index].handle;
        assert!(
            current == raw,
            "stale handle {raw:?}: slot {index} is now issued as {current:?}"
        );
        index
    }
}
