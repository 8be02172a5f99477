//! # Command Packets
//!
//! A packet is a header (chain link, dispatch function, command type) stored
//! in an index table, plus one contiguous range of arena bytes holding the
//! inline command followed by its auxiliary bytes:
//!
//! ```text
//!   headers[i] ──► ArenaRange
//!                  ┌────────────────┬──────────────────────┐
//!                  │ command (Pod)  │ aux bytes (optional) │
//!                  └────────────────┴──────────────────────┘
//! ```
//!
//! Packets link to each other by index, never by pointer, so the whole arena
//! can be reset in O(1) without leaving anything dangling. A packet has at
//! most one successor and at most one predecessor, and only a packet with
//! neither can be linked in, so every chain is a finite list.

use std::any::{type_name, TypeId};
use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::Pod;

use crate::memory::{ArenaRange, LinearAllocator, MAX_ALIGN};

/// A recordable command.
///
/// Commands are plain data (`Pod`) so they can live in arena bytes. The
/// backend type `B` is whatever the dispatch needs to talk to: a graphics
/// backend, a recorder in tests, or a trait object.
pub trait Command<B: ?Sized>: Pod {
    /// Executes the command. `aux` holds the bytes recorded after it.
    fn dispatch(&self, aux: &[u8], backend: &mut B);
}

/// Type-erased dispatch entry stored in each packet header.
///
/// Receives the command bytes and the aux bytes.
pub type DispatchFn<B> = fn(&[u8], &[u8], &mut B);

static NEXT_ARENA_ID: AtomicU32 = AtomicU32::new(1);

/// Reference to a packet inside a [`PacketArena`].
///
/// Only meaningful in the arena that created it, until that arena is next
/// reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PacketRef {
    arena: u32,
    index: u32,
    epoch: u32,
}

impl PacketRef {
    /// Index into the arena's header table.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Arena epoch the packet was created in.
    #[inline]
    #[must_use]
    pub const fn epoch(self) -> u32 {
        self.epoch
    }
}

struct PacketHeader<B: ?Sized> {
    next: Option<PacketRef>,
    linked: bool,
    dispatch: DispatchFn<B>,
    command_type: TypeId,
    command_len: usize,
    range: ArenaRange,
}

fn dispatch_command<C: Command<B>, B: ?Sized>(command: &[u8], aux: &[u8], backend: &mut B) {
    bytemuck::from_bytes::<C>(command).dispatch(aux, backend);
}

/// Arena of command packets for one producer.
///
/// Headers are kept in a vector that is cleared (not freed) on reset, and
/// command bytes come from an owned [`LinearAllocator`].
pub struct PacketArena<B: ?Sized> {
    id: u32,
    allocator: LinearAllocator,
    headers: Vec<PacketHeader<B>>,
}

impl<B: ?Sized> PacketArena<B> {
    /// Creates an arena.
    ///
    /// # Arguments
    ///
    /// * `arena_bytes` - Bytes available for commands and aux data per frame
    /// * `expected_packets` - Header slots reserved up front
    #[must_use]
    pub fn new(arena_bytes: usize, expected_packets: usize) -> Self {
        Self {
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed),
            allocator: LinearAllocator::new(arena_bytes),
            headers: Vec::with_capacity(expected_packets),
        }
    }

    /// Creates a packet for command `C` with `aux_size` trailing bytes.
    ///
    /// The command and aux bytes are zeroed, `next` is `None` and the
    /// dispatch function is `C`'s. Returns `None` if the arena is exhausted.
    ///
    /// # Panics
    ///
    /// Panics if `C` needs an alignment above [`MAX_ALIGN`].
    pub fn create<C: Command<B>>(&mut self, aux_size: usize) -> Option<PacketRef> {
        assert!(
            mem::align_of::<C>() <= MAX_ALIGN,
            "{} is over-aligned for the packet arena",
            type_name::<C>()
        );
        let index = u32::try_from(self.headers.len()).ok()?;
        let command_len = mem::size_of::<C>();
        let range = self
            .allocator
            .allocate(command_len.checked_add(aux_size)?, mem::align_of::<C>())?;
        self.allocator.bytes_mut(range).fill(0);

        self.headers.push(PacketHeader {
            next: None,
            linked: false,
            dispatch: dispatch_command::<C, B>,
            command_type: TypeId::of::<C>(),
            command_len,
            range,
        });

        Some(PacketRef {
            arena: self.id,
            index,
            epoch: self.allocator.epoch(),
        })
    }

    /// Overrides the dispatch function of a packet.
    pub fn store_dispatch(&mut self, packet: PacketRef, dispatch: DispatchFn<B>) {
        self.header_mut(packet).dispatch = dispatch;
    }

    /// Returns the dispatch function of a packet.
    #[must_use]
    pub fn dispatch_fn(&self, packet: PacketRef) -> DispatchFn<B> {
        self.header(packet).dispatch
    }

    /// Links `next` directly after `packet`.
    ///
    /// `packet` is usually the [`tail`](Self::tail) of a chain, and `next` a
    /// freshly created packet.
    ///
    /// # Panics
    ///
    /// Panics if either reference is stale, if `packet` already has a
    /// successor, or if `next` is already linked or heads a chain of its own.
    pub fn append_packet(&mut self, packet: PacketRef, next: PacketRef) {
        assert_ne!(packet, next, "a packet cannot follow itself");
        let successor = self.header(next);
        assert!(
            !successor.linked && successor.next.is_none(),
            "packet {next:?} is already part of a chain"
        );
        let header = self.header_mut(packet);
        assert!(
            header.next.is_none(),
            "packet {packet:?} already has a successor"
        );
        header.next = Some(next);
        self.header_mut(next).linked = true;
    }

    /// Returns the packet chained after `packet`, if any.
    #[must_use]
    pub fn next(&self, packet: PacketRef) -> Option<PacketRef> {
        self.header(packet).next
    }

    /// Iterates over a chain, starting with `packet` itself.
    pub fn chain(&self, packet: PacketRef) -> impl Iterator<Item = PacketRef> + '_ {
        std::iter::successors(Some(packet), move |&current| self.next(current))
    }

    /// Returns the last packet of the chain starting at `packet`.
    #[must_use]
    pub fn tail(&self, packet: PacketRef) -> PacketRef {
        self.chain(packet).last().unwrap_or(packet)
    }

    /// Returns the inline command of a packet.
    ///
    /// # Panics
    ///
    /// Panics if the reference is stale or the packet holds another command type.
    #[must_use]
    pub fn command<C: Pod>(&self, packet: PacketRef) -> &C {
        let (range, command_len) = self.checked_layout::<C>(packet);
        bytemuck::from_bytes(&self.allocator.bytes(range)[..command_len])
    }

    /// Returns the inline command of a packet, mutably.
    ///
    /// # Panics
    ///
    /// Panics if the reference is stale or the packet holds another command type.
    #[must_use]
    pub fn command_mut<C: Pod>(&mut self, packet: PacketRef) -> &mut C {
        let (range, command_len) = self.checked_layout::<C>(packet);
        bytemuck::from_bytes_mut(&mut self.allocator.bytes_mut(range)[..command_len])
    }

    /// Returns the aux bytes recorded after the command.
    #[must_use]
    pub fn aux_memory(&self, packet: PacketRef) -> &[u8] {
        let header = self.header(packet);
        &self.allocator.bytes(header.range)[header.command_len..]
    }

    /// Returns the aux bytes recorded after the command, mutably.
    #[must_use]
    pub fn aux_memory_mut(&mut self, packet: PacketRef) -> &mut [u8] {
        let header = self.header(packet);
        let (range, command_len) = (header.range, header.command_len);
        &mut self.allocator.bytes_mut(range)[command_len..]
    }

    /// Returns the command and its aux bytes at the same time.
    ///
    /// # Panics
    ///
    /// Panics if the reference is stale or the packet holds another command type.
    #[must_use]
    pub fn command_and_aux_mut<C: Pod>(&mut self, packet: PacketRef) -> (&mut C, &mut [u8]) {
        let (range, command_len) = self.checked_layout::<C>(packet);
        let (command, aux) = self.allocator.bytes_mut(range).split_at_mut(command_len);
        (bytemuck::from_bytes_mut(command), aux)
    }

    /// Returns the arena range backing a packet.
    #[must_use]
    pub fn range(&self, packet: PacketRef) -> ArenaRange {
        self.header(packet).range
    }

    /// Runs a single packet's dispatch function.
    pub fn execute(&self, packet: PacketRef, backend: &mut B) {
        let header = self.header(packet);
        let (command, aux) = self
            .allocator
            .bytes(header.range)
            .split_at(header.command_len);
        (header.dispatch)(command, aux, backend);
    }

    /// Returns the number of packets created since the last reset.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns the number of headers the arena holds before its table grows.
    #[inline]
    #[must_use]
    pub fn packet_capacity(&self) -> usize {
        self.headers.capacity()
    }

    /// Returns true if no packet was created since the last reset.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Returns the backing allocator.
    #[inline]
    #[must_use]
    pub const fn allocator(&self) -> &LinearAllocator {
        &self.allocator
    }

    /// Drops every packet and rewinds the allocator.
    ///
    /// All outstanding [`PacketRef`]s become stale.
    pub fn reset(&mut self) {
        self.headers.clear();
        self.allocator.reset();
    }

    fn header(&self, packet: PacketRef) -> &PacketHeader<B> {
        self.check_owned(packet);
        &self.headers[packet.index as usize]
    }

    fn header_mut(&mut self, packet: PacketRef) -> &mut PacketHeader<B> {
        self.check_owned(packet);
        &mut self.headers[packet.index as usize]
    }

    fn check_owned(&self, packet: PacketRef) {
        assert_eq!(
            packet.arena, self.id,
            "packet {packet:?} belongs to another packet arena"
        );
        assert_eq!(
            packet.epoch,
            self.allocator.epoch(),
            "stale packet {packet:?} used after its arena was reset"
        );
    }

    fn checked_layout<C: Pod>(&self, packet: PacketRef) -> (ArenaRange, usize) {
        let header = self.header(packet);
        assert!(
            header.command_type == TypeId::of::<C>(),
            "packet {packet:?} does not hold a {}",
            type_name::<C>()
        );
        (header.range, header.command_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Add {
        amount: u32,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Tag {
        id: u64,
    }

    impl Command<Vec<u64>> for Add {
        fn dispatch(&self, aux: &[u8], backend: &mut Vec<u64>) {
            let extra: u64 = aux.iter().map(|&b| u64::from(b)).sum();
            backend.push(u64::from(self.amount) + extra);
        }
    }

    impl Command<Vec<u64>> for Tag {
        fn dispatch(&self, _aux: &[u8], backend: &mut Vec<u64>) {
            backend.push(self.id);
        }
    }

    fn doubled(command: &[u8], _aux: &[u8], backend: &mut Vec<u64>) {
        let add: Add = bytemuck::pod_read_unaligned(command);
        backend.push(u64::from(add.amount) * 2);
    }

    #[test]
    fn test_create_zeroes_command_and_aux() {
        let mut arena: PacketArena<Vec<u64>> = PacketArena::new(256, 4);
        let packet = arena.create::<Add>(4).unwrap();
        assert_eq!(*arena.command::<Add>(packet), Add { amount: 0 });
        assert_eq!(arena.aux_memory(packet), &[0, 0, 0, 0]);
        assert_eq!(arena.next(packet), None);
    }

    #[test]
    fn test_aux_follows_command() {
        let mut arena: PacketArena<Vec<u64>> = PacketArena::new(256, 4);
        let packet = arena.create::<Add>(3).unwrap();
        let range = arena.range(packet);
        assert_eq!(range.len(), mem::size_of::<Add>() + 3);

        let (command, aux) = arena.command_and_aux_mut::<Add>(packet);
        command.amount = 10;
        aux.copy_from_slice(&[1, 2, 3]);

        let mut out = Vec::new();
        arena.execute(packet, &mut out);
        assert_eq!(out, vec![16]);
    }

    #[test]
    fn test_chain_in_attachment_order() {
        let mut arena: PacketArena<Vec<u64>> = PacketArena::new(256, 4);
        let a = arena.create::<Tag>(0).unwrap();
        let b = arena.create::<Tag>(0).unwrap();
        let c = arena.create::<Tag>(0).unwrap();
        arena.append_packet(a, b);
        arena.append_packet(b, c);

        assert_eq!(arena.chain(a).collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(arena.tail(a), c);
        assert_eq!(arena.tail(c), c);
    }

    #[test]
    #[should_panic(expected = "already part of a chain")]
    fn test_linking_back_to_chain_head_panics() {
        let mut arena: PacketArena<Vec<u64>> = PacketArena::new(256, 4);
        let a = arena.create::<Tag>(0).unwrap();
        let b = arena.create::<Tag>(0).unwrap();
        arena.append_packet(a, b);
        arena.append_packet(b, a);
    }

    #[test]
    #[should_panic(expected = "already has a successor")]
    fn test_relinking_a_packet_panics() {
        let mut arena: PacketArena<Vec<u64>> = PacketArena::new(256, 4);
        let a = arena.create::<Tag>(0).unwrap();
        let b = arena.create::<Tag>(0).unwrap();
        let c = arena.create::<Tag>(0).unwrap();
        arena.append_packet(a, b);
        arena.append_packet(a, c);
    }

    #[test]
    #[should_panic(expected = "already part of a chain")]
    fn test_linking_a_linked_packet_twice_panics() {
        let mut arena: PacketArena<Vec<u64>> = PacketArena::new(256, 4);
        let a = arena.create::<Tag>(0).unwrap();
        let b = arena.create::<Tag>(0).unwrap();
        let c = arena.create::<Tag>(0).unwrap();
        arena.append_packet(a, c);
        arena.append_packet(b, c);
    }

    #[test]
    #[should_panic(expected = "another packet arena")]
    fn test_packet_from_other_arena_panics() {
        let mut first: PacketArena<Vec<u64>> = PacketArena::new(64, 4);
        let mut second: PacketArena<Vec<u64>> = PacketArena::new(64, 4);
        let foreign = first.create::<Tag>(0).unwrap();
        let _ = second.create::<Tag>(0).unwrap();
        let _ = second.next(foreign);
    }

    #[test]
    fn test_store_dispatch_overrides() {
        let mut arena: PacketArena<Vec<u64>> = PacketArena::new(256, 4);
        let packet = arena.create::<Add>(0).unwrap();
        arena.command_mut::<Add>(packet).amount = 21;
        arena.store_dispatch(packet, doubled);

        let mut out = Vec::new();
        arena.execute(packet, &mut out);
        assert_eq!(out, vec![42]);

        let dispatch = arena.dispatch_fn(packet);
        dispatch(bytemuck::bytes_of(&Add { amount: 5 }), &[], &mut out);
        assert_eq!(out, vec![42, 10]);
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let mut arena: PacketArena<Vec<u64>> = PacketArena::new(16, 4);
        assert!(arena.create::<Tag>(0).is_some());
        assert!(arena.create::<Tag>(1).is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    #[should_panic(expected = "does not hold")]
    fn test_wrong_command_type_panics() {
        let mut arena: PacketArena<Vec<u64>> = PacketArena::new(64, 4);
        let packet = arena.create::<Add>(0).unwrap();
        let _ = arena.command::<Tag>(packet);
    }

    #[test]
    #[should_panic(expected = "stale packet")]
    fn test_stale_packet_panics() {
        let mut arena: PacketArena<Vec<u64>> = PacketArena::new(64, 4);
        let packet = arena.create::<Add>(0).unwrap();
        arena.reset();
        let _ = arena.create::<Add>(0).unwrap();
        let _ = arena.next(packet);
    }
}
