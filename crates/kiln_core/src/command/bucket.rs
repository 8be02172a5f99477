//! # Command Buckets
//!
//! A bucket collects `(sort_key, packet)` entries for one frame, sorts them,
//! replays them, and resets its arena in one go.
//!
//! ```text
//!   Empty ──add──► Filling ──sort──► Sorted ──flush──► Flushed ──reset──► Empty
//!                     ▲                 │
//!                     └──────add────────┘
//! ```

use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};

use bytemuck::Pod;
use rayon::slice::ParallelSliceMut;
use serde::{Deserialize, Serialize};

use super::packet::{Command, PacketArena, PacketRef};

/// Default maximum number of entries per frame.
pub const DEFAULT_BUCKET_CAPACITY: usize = 10_000;

/// Default arena size per bucket (1 MiB).
pub const DEFAULT_ARENA_BYTES: usize = 1 << 20;

/// Default entry count from which sorting goes parallel.
pub const DEFAULT_PARALLEL_SORT_THRESHOLD: usize = 4096;

/// Packet headers reserved per entry: the entry itself plus one appended
/// command, the shape of a bind table followed by its draw.
pub const PACKETS_PER_ENTRY: usize = 2;

/// Direction entries are replayed in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Highest key first.
    #[default]
    Descending,
    /// Lowest key first.
    Ascending,
}

/// Sizing and ordering of a [`CommandBucket`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    /// Maximum entries per frame. Exceeding it is a sizing defect.
    pub capacity: usize,
    /// Bytes available for commands and aux data per frame.
    pub arena_bytes: usize,
    /// Replay order.
    pub sort_order: SortOrder,
    /// Entry count from which `sort` uses the parallel sort.
    pub parallel_sort_threshold: usize,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUCKET_CAPACITY,
            arena_bytes: DEFAULT_ARENA_BYTES,
            sort_order: SortOrder::Descending,
            parallel_sort_threshold: DEFAULT_PARALLEL_SORT_THRESHOLD,
        }
    }
}

/// Where a bucket is in its per-frame cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BucketState {
    /// Nothing recorded.
    Empty,
    /// Commands recorded since the last sort.
    Filling,
    /// Entries are in replay order.
    Sorted,
    /// Replay finished, reset pending.
    Flushed,
}

/// Summary of one [`CommandBucket::flush`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Top-level entries replayed.
    pub entries: usize,
    /// Packets dispatched, including chained ones.
    pub packets: usize,
    /// Arena bytes in use before the reset.
    pub arena_bytes: usize,
    /// Commands dropped this frame because the arena was full.
    pub dropped: usize,
}

#[derive(Clone, Copy, Debug)]
struct BucketEntry<K> {
    key: K,
    packet: PacketRef,
}

/// A freshly recorded command, ready to be filled in.
///
/// Derefs to the command. The aux bytes recorded after it are available
/// through [`aux_mut`](Self::aux_mut).
pub struct CommandMut<'a, C> {
    packet: PacketRef,
    command: &'a mut C,
    aux: &'a mut [u8],
}

impl<'a, C> CommandMut<'a, C> {
    /// The packet holding this command, for use with
    /// [`CommandBucket::append_command`].
    #[inline]
    #[must_use]
    pub const fn packet(&self) -> PacketRef {
        self.packet
    }

    /// Replaces the whole command.
    #[inline]
    pub fn set(&mut self, command: C) {
        *self.command = command;
    }

    /// The aux bytes recorded after the command.
    #[inline]
    #[must_use]
    pub fn aux(&self) -> &[u8] {
        &*self.aux
    }

    /// The aux bytes recorded after the command, mutably.
    #[inline]
    #[must_use]
    pub fn aux_mut(&mut self) -> &mut [u8] {
        &mut *self.aux
    }

    /// Splits into the command and aux references.
    #[inline]
    #[must_use]
    pub fn into_parts(self) -> (&'a mut C, &'a mut [u8]) {
        (self.command, self.aux)
    }
}

impl<C> Deref for CommandMut<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &*self.command
    }
}

impl<C> DerefMut for CommandMut<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut *self.command
    }
}

/// Per-frame command recorder with sort keys of type `K`, replaying into a
/// backend of type `B`.
///
/// # Performance
///
/// - `add_command` / `append_command` are O(1) with no heap allocation once
///   the entry and header vectors are warm
/// - `sort` is O(n log n), parallel above the configured threshold
/// - the arena reset at the end of `flush` is O(1)
///
/// # Thread Safety
///
/// One producer at a time. Every mutating call takes `&mut self`, and the
/// references returned by `add_command` borrow the bucket, so none of them
/// can be held across a flush.
///
/// # Example
///
/// ```rust
/// use bytemuck::{Pod, Zeroable};
/// use kiln_core::{BucketConfig, Command, CommandBucket};
///
/// #[derive(Clone, Copy, Pod, Zeroable)]
/// #[repr(C)]
/// struct Log { value: u32 }
///
/// impl Command<Vec<u32>> for Log {
///     fn dispatch(&self, _aux: &[u8], out: &mut Vec<u32>) {
///         out.push(self.value);
///     }
/// }
///
/// let mut bucket: CommandBucket<u32, Vec<u32>> = CommandBucket::new(BucketConfig::default());
/// for key in [1, 9, 5] {
///     bucket.add_command::<Log>(key, 0).expect("arena has room").value = key;
/// }
/// bucket.sort();
///
/// let mut out = Vec::new();
/// bucket.flush(&mut out);
/// assert_eq!(out, vec![9, 5, 1]);
/// ```
pub struct CommandBucket<K, B: ?Sized> {
    entries: Vec<BucketEntry<K>>,
    packets: PacketArena<B>,
    config: BucketConfig,
    state: BucketState,
    dropped: usize,
    last_added: Option<PacketRef>,
}

impl<K, B: ?Sized> CommandBucket<K, B> {
    /// Creates a bucket. Entry storage and the arena are allocated here, once.
    ///
    /// # Panics
    ///
    /// Panics if `config.capacity` is zero.
    #[must_use]
    pub fn new(config: BucketConfig) -> Self {
        assert!(config.capacity > 0, "Capacity must be greater than zero");
        tracing::debug!(
            capacity = config.capacity,
            arena_bytes = config.arena_bytes,
            "command bucket created"
        );
        Self {
            entries: Vec::with_capacity(config.capacity),
            packets: PacketArena::new(
                config.arena_bytes,
                config.capacity.saturating_mul(PACKETS_PER_ENTRY),
            ),
            config,
            state: BucketState::Empty,
            dropped: 0,
            last_added: None,
        }
    }

    /// Records a command under `key` with `aux_size` trailing bytes.
    ///
    /// The command starts zeroed. Returns `None` and counts a dropped command
    /// if the arena is exhausted; the caller may skip the work for this frame.
    ///
    /// # Panics
    ///
    /// Panics if the bucket already holds `capacity` entries. Per-frame
    /// command volume is a sizing decision, not a runtime condition.
    pub fn add_command<C: Command<B>>(
        &mut self,
        key: K,
        aux_size: usize,
    ) -> Option<CommandMut<'_, C>> {
        assert!(
            self.entries.len() < self.config.capacity,
            "command bucket overflow: capacity of {} entries exceeded",
            self.config.capacity
        );

        let Some(packet) = self.packets.create::<C>(aux_size) else {
            self.record_drop::<C>(aux_size);
            return None;
        };
        self.entries.push(BucketEntry { key, packet });
        self.last_added = Some(packet);
        self.state = BucketState::Filling;

        Some(self.command_mut_at(packet))
    }

    /// Records a command that runs right after `base`'s chain, under the same
    /// key.
    ///
    /// Several appends to one base run in the order they were attached.
    /// Returns `None` if the arena is exhausted.
    ///
    /// # Panics
    ///
    /// Panics if `base` was recorded before the last flush.
    pub fn append_command<C: Command<B>>(
        &mut self,
        base: PacketRef,
        aux_size: usize,
    ) -> Option<CommandMut<'_, C>> {
        let tail = self.packets.tail(base);
        let Some(packet) = self.packets.create::<C>(aux_size) else {
            self.record_drop::<C>(aux_size);
            return None;
        };
        self.packets.append_packet(tail, packet);

        Some(self.command_mut_at(packet))
    }

    /// Returns a previously recorded command for further edits.
    ///
    /// # Panics
    ///
    /// Panics if `packet` is stale or holds another command type.
    #[must_use]
    pub fn command_mut<C: Pod>(&mut self, packet: PacketRef) -> CommandMut<'_, C> {
        self.command_mut_at(packet)
    }

    /// Removes the entry created by the latest
    /// [`add_command`](Self::add_command) without dispatching it.
    ///
    /// Works before or after [`sort`](Self::sort); the other entries keep
    /// their order. Its arena bytes stay used until the next reset. Returns
    /// `false` if there is nothing to undo, including after a previous
    /// discard.
    pub fn discard_last(&mut self) -> bool {
        let Some(packet) = self.last_added.take() else {
            return false;
        };
        let Some(position) = self.entries.iter().rposition(|entry| entry.packet == packet) else {
            return false;
        };
        self.entries.remove(position);
        if self.entries.is_empty() {
            self.state = BucketState::Empty;
        }
        true
    }

    /// Replays every entry in its current order, then resets the bucket.
    ///
    /// Each entry's chain is walked to its end before moving on. All
    /// `PacketRef`s recorded this frame are stale afterwards.
    pub fn flush(&mut self, backend: &mut B) -> FlushStats {
        if self.state == BucketState::Filling {
            tracing::trace!(entries = self.entries.len(), "flushing unsorted bucket");
        }

        let mut stats = FlushStats {
            entries: self.entries.len(),
            packets: 0,
            arena_bytes: self.packets.allocator().used(),
            dropped: self.dropped,
        };

        for entry in &self.entries {
            let mut next = Some(entry.packet);
            while let Some(packet) = next {
                self.packets.execute(packet, backend);
                stats.packets += 1;
                next = self.packets.next(packet);
            }
        }
        self.state = BucketState::Flushed;

        tracing::trace!(
            entries = stats.entries,
            packets = stats.packets,
            arena_bytes = stats.arena_bytes,
            "bucket flushed"
        );

        self.clear();
        stats
    }

    /// Drops everything recorded this frame without dispatching it.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.packets.reset();
        self.dropped = 0;
        self.last_added = None;
        self.state = BucketState::Empty;
    }

    /// Returns the number of recorded entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the maximum number of entries per frame.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Returns the bucket configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &BucketConfig {
        &self.config
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> BucketState {
        self.state
    }

    /// Returns the packet arena, for inspection.
    #[inline]
    #[must_use]
    pub const fn packets(&self) -> &PacketArena<B> {
        &self.packets
    }

    /// Returns the arena bytes used this frame.
    #[inline]
    #[must_use]
    pub const fn arena_used(&self) -> usize {
        self.packets.allocator().used()
    }

    /// Returns the peak arena usage since construction.
    #[inline]
    #[must_use]
    pub const fn arena_high_water_mark(&self) -> usize {
        self.packets.allocator().high_water_mark()
    }

    /// Returns the number of commands dropped this frame.
    #[inline]
    #[must_use]
    pub const fn dropped_commands(&self) -> usize {
        self.dropped
    }

    fn command_mut_at<C: Pod>(&mut self, packet: PacketRef) -> CommandMut<'_, C> {
        let (command, aux) = self.packets.command_and_aux_mut::<C>(packet);
        CommandMut {
            packet,
            command,
            aux,
        }
    }

    fn record_drop<C>(&mut self, aux_size: usize) {
        self.dropped += 1;
        tracing::warn!(
            command = std::any::type_name::<C>(),
            aux_size,
            arena_bytes = self.config.arena_bytes,
            "command arena exhausted, dropping command"
        );
    }
}

impl<K: Ord + Send, B: ?Sized> CommandBucket<K, B> {
    /// Orders entries by key according to the configured [`SortOrder`].
    ///
    /// The sort is stable: entries with equal keys keep their recording order.
    pub fn sort(&mut self) {
        let order = self.config.sort_order;
        let compare = move |a: &BucketEntry<K>, b: &BucketEntry<K>| -> Ordering {
            match order {
                SortOrder::Descending => b.key.cmp(&a.key),
                SortOrder::Ascending => a.key.cmp(&b.key),
            }
        };

        if self.entries.len() >= self.config.parallel_sort_threshold {
            self.entries.par_sort_by(compare);
        } else {
            self.entries.sort_by(compare);
        }

        if !self.entries.is_empty() {
            self.state = BucketState::Sorted;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    #[derive(Clone, Copy, Debug, Pod, Zeroable)]
    #[repr(C)]
    struct Record {
        id: u32,
    }

    impl Command<Vec<u32>> for Record {
        fn dispatch(&self, aux: &[u8], out: &mut Vec<u32>) {
            out.push(self.id);
            out.extend(aux.iter().map(|&b| u32::from(b)));
        }
    }

    fn bucket(capacity: usize) -> CommandBucket<u32, Vec<u32>> {
        CommandBucket::new(BucketConfig {
            capacity,
            arena_bytes: 4096,
            ..BucketConfig::default()
        })
    }

    #[test]
    fn test_sorted_flush_runs_highest_key_first() {
        let mut bucket = bucket(8);
        for key in [1, 9, 5] {
            bucket.add_command::<Record>(key, 0).unwrap().id = key;
        }
        assert_eq!(bucket.state(), BucketState::Filling);
        bucket.sort();
        assert_eq!(bucket.state(), BucketState::Sorted);

        let mut out = Vec::new();
        let stats = bucket.flush(&mut out);
        assert_eq!(out, vec![9, 5, 1]);
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.packets, 3);
    }

    #[test]
    fn test_ascending_order() {
        let mut bucket: CommandBucket<u32, Vec<u32>> = CommandBucket::new(BucketConfig {
            capacity: 8,
            arena_bytes: 1024,
            sort_order: SortOrder::Ascending,
            ..BucketConfig::default()
        });
        for key in [3, 1, 2] {
            bucket.add_command::<Record>(key, 0).unwrap().id = key;
        }
        bucket.sort();
        let mut out = Vec::new();
        let _ = bucket.flush(&mut out);
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn test_equal_keys_keep_recording_order() {
        let mut bucket = bucket(8);
        for id in 0..4 {
            bucket.add_command::<Record>(7, 0).unwrap().id = id;
        }
        bucket.sort();
        let mut out = Vec::new();
        let _ = bucket.flush(&mut out);
        assert_eq!(out, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_parallel_sort_matches_serial() {
        let mut bucket: CommandBucket<u32, Vec<u32>> = CommandBucket::new(BucketConfig {
            capacity: 2048,
            arena_bytes: 64 * 1024,
            parallel_sort_threshold: 16,
            ..BucketConfig::default()
        });
        for i in 0..2000u32 {
            let key = i.wrapping_mul(2_654_435_761) % 997;
            bucket.add_command::<Record>(key, 0).unwrap().id = key;
        }
        bucket.sort();
        let mut out = Vec::new();
        let _ = bucket.flush(&mut out);
        assert!(out.windows(2).all(|pair| pair[0] >= pair[1]));
        assert_eq!(out.len(), 2000);
    }

    #[test]
    fn test_appended_commands_run_after_base() {
        let mut bucket = bucket(8);
        bucket.add_command::<Record>(1, 0).unwrap().id = 100;
        let base = {
            let mut cmd = bucket.add_command::<Record>(5, 0).unwrap();
            cmd.id = 50;
            cmd.packet()
        };
        bucket.append_command::<Record>(base, 0).unwrap().id = 51;
        bucket.append_command::<Record>(base, 0).unwrap().id = 52;

        bucket.sort();
        let mut out = Vec::new();
        let stats = bucket.flush(&mut out);
        assert_eq!(out, vec![50, 51, 52, 100]);
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.packets, 4);
    }

    #[test]
    fn test_aux_bytes_reach_dispatch() {
        let mut bucket = bucket(4);
        let mut cmd = bucket.add_command::<Record>(0, 2).unwrap();
        cmd.set(Record { id: 1 });
        cmd.aux_mut().copy_from_slice(&[7, 8]);
        assert_eq!(cmd.aux(), &[7, 8]);

        let mut out = Vec::new();
        let _ = bucket.flush(&mut out);
        assert_eq!(out, vec![1, 7, 8]);
    }

    #[test]
    fn test_flush_resets_bucket() {
        let mut bucket = bucket(4);
        let _ = bucket.add_command::<Record>(0, 16).unwrap();
        assert!(bucket.arena_used() > 0);

        let mut out = Vec::new();
        let _ = bucket.flush(&mut out);
        assert_eq!(bucket.len(), 0);
        assert_eq!(bucket.arena_used(), 0);
        assert_eq!(bucket.state(), BucketState::Empty);

        let packet = bucket.add_command::<Record>(0, 0).unwrap().packet();
        assert_eq!(bucket.packets().range(packet).offset(), 0);
    }

    #[test]
    #[should_panic(expected = "command bucket overflow")]
    fn test_entry_overflow_panics() {
        let mut bucket = bucket(2);
        let _ = bucket.add_command::<Record>(0, 0);
        let _ = bucket.add_command::<Record>(0, 0);
        let _ = bucket.add_command::<Record>(0, 0);
    }

    #[test]
    fn test_arena_exhaustion_drops_command() {
        let mut bucket: CommandBucket<u32, Vec<u32>> = CommandBucket::new(BucketConfig {
            capacity: 8,
            arena_bytes: 8,
            ..BucketConfig::default()
        });
        assert!(bucket.add_command::<Record>(0, 0).is_some());
        assert!(bucket.add_command::<Record>(0, 8).is_none());
        assert_eq!(bucket.dropped_commands(), 1);
        assert_eq!(bucket.len(), 1);

        let mut out = Vec::new();
        let stats = bucket.flush(&mut out);
        assert_eq!(stats.dropped, 1);
        assert_eq!(bucket.dropped_commands(), 0);
    }

    #[test]
    #[should_panic(expected = "stale packet")]
    fn test_append_to_previous_frame_panics() {
        let mut bucket = bucket(4);
        let base = bucket.add_command::<Record>(0, 0).unwrap().packet();
        let mut out = Vec::new();
        let _ = bucket.flush(&mut out);
        let _ = bucket.append_command::<Record>(base, 0);
    }

    #[test]
    fn test_discard_last_skips_dispatch() {
        let mut bucket = bucket(4);
        bucket.add_command::<Record>(0, 0).unwrap().id = 1;
        bucket.add_command::<Record>(0, 0).unwrap().id = 2;
        assert!(bucket.discard_last());
        assert!(!bucket.discard_last());

        let mut out = Vec::new();
        let _ = bucket.flush(&mut out);
        assert_eq!(out, vec![1]);
        assert!(!bucket.discard_last());
    }

    #[test]
    fn test_discard_after_sort_removes_latest_entry() {
        let mut bucket = bucket(4);
        for key in [1, 9] {
            bucket.add_command::<Record>(key, 0).unwrap().id = key;
        }
        bucket.sort();
        assert!(bucket.discard_last());
        assert_eq!(bucket.state(), BucketState::Sorted);

        let mut out = Vec::new();
        let _ = bucket.flush(&mut out);
        assert_eq!(out, vec![1]);
    }

    #[test]
    fn test_discard_only_entry_empties_bucket() {
        let mut bucket = bucket(4);
        let _ = bucket.add_command::<Record>(3, 0).unwrap();
        bucket.sort();
        assert!(bucket.discard_last());
        assert!(bucket.is_empty());
        assert_eq!(bucket.state(), BucketState::Empty);
    }

    #[test]
    fn test_chained_frame_fits_reserved_headers() {
        let mut bucket = bucket(8);
        let reserved = bucket.packets().packet_capacity();
        assert!(reserved >= 8 * PACKETS_PER_ENTRY);

        for key in 0..8 {
            let base = bucket.add_command::<Record>(key, 0).unwrap().packet();
            let _ = bucket.append_command::<Record>(base, 0).unwrap();
        }
        assert_eq!(bucket.packets().len(), 16);
        assert_eq!(bucket.packets().packet_capacity(), reserved);
    }

    #[test]
    #[should_panic(expected = "another packet arena")]
    fn test_append_to_other_bucket_panics() {
        let mut first = bucket(4);
        let mut second = bucket(4);
        let base = first.add_command::<Record>(0, 0).unwrap().packet();
        let _ = second.add_command::<Record>(0, 0).unwrap();
        let _ = second.append_command::<Record>(base, 0);
    }
}
