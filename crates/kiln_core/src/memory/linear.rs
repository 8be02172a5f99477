//! # Linear Allocator
//!
//! A bump allocator for per-frame transient memory that is freed all at once.

use bytemuck::{Pod, Zeroable};

/// Largest alignment [`LinearAllocator::allocate`] can honour.
pub const MAX_ALIGN: usize = 16;

/// Storage unit. Keeps the base of the arena 16-byte aligned.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, align(16))]
struct Block([u8; MAX_ALIGN]);

/// A byte range handed out by a [`LinearAllocator`].
///
/// Ranges are plain offsets, never pointers. Each one remembers the epoch of
/// the allocator it came from so that a range kept across a `reset` is caught
/// instead of silently aliasing newer data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArenaRange {
    offset: usize,
    len: usize,
    epoch: u32,
}

impl ArenaRange {
    /// Byte offset from the arena base.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> usize {
        self.offset
    }

    /// Length in bytes.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.len
    }

    /// Returns true for zero-sized ranges.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }

    /// One past the last byte of the range.
    #[inline]
    #[must_use]
    pub const fn end(self) -> usize {
        self.offset + self.len
    }

    /// Allocator epoch the range was issued in.
    #[inline]
    #[must_use]
    pub const fn epoch(self) -> u32 {
        self.epoch
    }
}

/// A bump-pointer arena allocator.
///
/// Allocations are fast (just bump a cursor) and carry no metadata. Memory is
/// reclaimed all at once when the arena is reset or dropped.
///
/// # Thread Safety
///
/// Mutation requires `&mut self`. Use one arena per producer.
///
/// # Example
///
/// ```rust
/// use kiln_core::LinearAllocator;
///
/// let mut arena = LinearAllocator::new(1024);
/// let range = arena.allocate(64, 8).expect("fits");
/// arena.bytes_mut(range).fill(0xAB);
///
/// // Reset to free all allocations
/// arena.reset();
/// assert_eq!(arena.used(), 0);
/// ```
pub struct LinearAllocator {
    /// The backing storage, allocated once.
    storage: Box<[Block]>,
    /// Current allocation offset.
    offset: usize,
    /// Total capacity in bytes.
    capacity: usize,
    /// Largest offset ever reached.
    high_water_mark: usize,
    /// Bumped on every reset.
    epoch: u32,
}

impl LinearAllocator {
    /// Creates a new arena with the specified capacity in bytes.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Total size in bytes
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let blocks = capacity.div_ceil(MAX_ALIGN);
        Self {
            storage: vec![Block::zeroed(); blocks].into_boxed_slice(),
            offset: 0,
            capacity,
            high_water_mark: 0,
            epoch: 0,
        }
    }

    /// Returns the total capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the current used space in bytes.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.offset
    }

    /// Returns the remaining free space in bytes.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.capacity - self.offset
    }

    /// Returns the largest cursor position reached since construction.
    ///
    /// Useful for sizing the arena after a few representative frames.
    #[inline]
    #[must_use]
    pub const fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Returns the number of resets performed so far.
    #[inline]
    #[must_use]
    pub const fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Allocates `size` bytes aligned to `align`.
    ///
    /// This is a **O(1)** operation. Returns `None` if the request does not
    /// fit; exhaustion is an expected, recoverable condition.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two or exceeds [`MAX_ALIGN`].
    pub fn allocate(&mut self, size: usize, align: usize) -> Option<ArenaRange> {
        assert!(
            align.is_power_of_two() && align <= MAX_ALIGN,
            "unsupported arena alignment {align}"
        );

        let aligned_offset = (self.offset + align - 1) & !(align - 1);
        let new_offset = aligned_offset.checked_add(size)?;

        if new_offset > self.capacity {
            return None;
        }

        self.offset = new_offset;
        self.high_water_mark = self.high_water_mark.max(new_offset);

        Some(ArenaRange {
            offset: aligned_offset,
            len: size,
            epoch: self.epoch,
        })
    }

    /// Individual frees are not supported; memory comes back on [`reset`].
    ///
    /// [`reset`]: Self::reset
    #[inline]
    pub fn deallocate(&mut self, range: ArenaRange) {
        let _ = range;
    }

    /// Resets the arena, invalidating all previous allocations.
    ///
    /// This is a **zero-cost** operation - no memory is freed or reallocated.
    /// Ranges issued before the reset are rejected by [`bytes`](Self::bytes).
    #[inline]
    pub fn reset(&mut self) {
        self.offset = 0;
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Returns the bytes of an allocated range.
    ///
    /// # Panics
    ///
    /// Panics if the range was issued before the last reset.
    #[must_use]
    pub fn bytes(&self, range: ArenaRange) -> &[u8] {
        self.check_epoch(range);
        &bytemuck::cast_slice::<Block, u8>(&self.storage)[range.offset..range.end()]
    }

    /// Returns the bytes of an allocated range, mutably.
    ///
    /// # Panics
    ///
    /// Panics if the range was issued before the last reset.
    #[must_use]
    pub fn bytes_mut(&mut self, range: ArenaRange) -> &mut [u8] {
        self.check_epoch(range);
        &mut bytemuck::cast_slice_mut::<Block, u8>(&mut self.storage)[range.offset..range.end()]
    }

    #[inline]
    fn check_epoch(&self, range: ArenaRange) {
        assert_eq!(
            range.epoch, self.epoch,
            "arena range {range:?} used after the arena was reset"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_allocations_do_not_overlap() {
        let mut arena = LinearAllocator::new(1024);
        let a = arena.allocate(10, 1).unwrap();
        let b = arena.allocate(24, 8).unwrap();
        let c = arena.allocate(3, 4).unwrap();

        assert!(a.end() <= b.offset());
        assert!(b.end() <= c.offset());
        assert_eq!(b.offset() % 8, 0);
        assert_eq!(c.offset() % 4, 0);
    }

    #[test]
    fn test_reset_returns_base() {
        let mut arena = LinearAllocator::new(1024);
        let first = arena.allocate(32, 16).unwrap();
        let _ = arena.allocate(100, 4).unwrap();
        assert!(arena.used() > 0);

        arena.reset();
        assert_eq!(arena.used(), 0);

        let again = arena.allocate(32, 16).unwrap();
        assert_eq!(again.offset(), first.offset());
        assert_eq!(again.offset(), 0);
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let mut arena = LinearAllocator::new(64);
        assert!(arena.allocate(60, 1).is_some());
        assert!(arena.allocate(8, 1).is_none());
        // A failed request does not move the cursor.
        assert_eq!(arena.used(), 60);
        assert!(arena.allocate(4, 1).is_some());
        assert_eq!(arena.remaining(), 0);
    }

    #[test]
    fn test_high_water_mark_survives_reset() {
        let mut arena = LinearAllocator::new(256);
        let _ = arena.allocate(200, 1).unwrap();
        arena.reset();
        let _ = arena.allocate(10, 1).unwrap();
        assert_eq!(arena.high_water_mark(), 200);
    }

    #[test]
    fn test_bytes_are_writable() {
        let mut arena = LinearAllocator::new(128);
        let range = arena.allocate(4, 4).unwrap();
        arena.bytes_mut(range).copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(arena.bytes(range), &[1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "used after the arena was reset")]
    fn test_stale_range_rejected() {
        let mut arena = LinearAllocator::new(128);
        let range = arena.allocate(4, 4).unwrap();
        arena.reset();
        let _ = arena.bytes(range);
    }
}
