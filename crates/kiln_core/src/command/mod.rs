//! # Deferred Command Submission
//!
//! Call sites record commands into a [`CommandBucket`] from anywhere in the
//! frame, in any order. Once per frame the bucket is sorted by key and
//! replayed, then its arena is reset in one step.
//!
//! Commands are plain `Pod` structs implementing [`Command`]. Each packet
//! stores a dispatch function monomorphised for its command type, so replay
//! needs neither trait objects nor per-command heap allocation.

mod bucket;
mod packet;

pub use bucket::{
    BucketConfig, BucketState, CommandBucket, CommandMut, FlushStats, SortOrder,
    DEFAULT_ARENA_BYTES, DEFAULT_BUCKET_CAPACITY, DEFAULT_PARALLEL_SORT_THRESHOLD,
    PACKETS_PER_ENTRY,
};
pub use packet::{Command, DispatchFn, PacketArena, PacketRef};
