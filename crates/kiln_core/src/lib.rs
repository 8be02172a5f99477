//! # KILN Core
//!
//! Backend-agnostic machinery for a real-time renderer:
//! - Generational handle pools for lifetime-safe resource references
//! - A linear arena for per-frame transient memory
//! - Command packets and sortable command buckets for deferred submission
//!
//! ## Architecture Rules
//!
//! 1. **No raw pointers handed out** - Resources are reached through handles
//! 2. **No heap allocations in the record path** - Memory is pre-allocated
//! 3. **Defects stop the frame** - Stale handles and overflows panic; running
//!    out of arena or pool space is reported through `Option`
//!
//! ## Example
//!
//! ```rust,ignore
//! use kiln_core::{BucketConfig, CommandBucket};
//!
//! let mut bucket: CommandBucket<u64, MyBackend> = CommandBucket::new(BucketConfig::default());
//! // Record from anywhere, sort once, flush once per frame.
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod command;
pub mod handle;
pub mod memory;
pub mod pool;

pub use command::{
    BucketConfig, BucketState, Command, CommandBucket, CommandMut, DispatchFn, FlushStats,
    PacketArena, PacketRef, SortOrder,
};
pub use handle::{Handle, RawHandle};
pub use memory::{ArenaRange, LinearAllocator};
pub use pool::{HandlePool, PooledResource};
