//! # Resource Handles
//!
//! Handles are lightweight identifiers consisting of:
//! - An index into a pool's slot array
//! - A generation counter for safe slot reuse

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};

/// Untyped handle: a slot index paired with the slot's generation.
///
/// The all-zero value is reserved as the invalid handle. Slot 0 of every
/// pool is never issued and a live slot never has generation 0, so no pool
/// can hand it out.
///
/// The type is `Pod` so it can be stored inline in command packets and bind
/// tables as inert data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct RawHandle {
    index: u32,
    generation: u32,
}

impl RawHandle {
    /// The reserved invalid handle.
    pub const INVALID: Self = Self {
        index: 0,
        generation: 0,
    };

    /// Creates a handle from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - Slot index inside the pool
    /// * `generation` - Generation the slot had when the handle was issued
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Checks if this is the reserved invalid handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.index == 0 && self.generation == 0
    }

    /// Packs the handle into one integer (index low, generation high).
    ///
    /// Only meant for logging and external hashing.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Inverse of [`to_bits`](Self::to_bits).
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

/// Typed handle to a resource of type `T` living in a
/// [`HandlePool`](crate::HandlePool).
///
/// The type parameter only exists at compile time: a `Handle<Texture>` cannot
/// be passed where a `Handle<Buffer>` is expected, but both are eight bytes.
pub struct Handle<T> {
    raw: RawHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// The reserved invalid handle.
    pub const INVALID: Self = Self::from_raw(RawHandle::INVALID);

    /// Wraps an untyped handle.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: RawHandle) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Returns the untyped handle.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> RawHandle {
        self.raw
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.raw.index
    }

    /// Returns the generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.raw.generation
    }

    /// Checks if this is the reserved invalid handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.raw.is_null()
    }
}

// Manual impls: derives would put bounds on `T`.

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.raw.index)
            .field("generation", &self.raw.generation)
            .finish()
    }
}

impl<T> From<Handle<T>> for RawHandle {
    fn from(handle: Handle<T>) -> Self {
        handle.raw
    }
}
