//! # Memory Management
//!
//! Pre-allocated arenas for zero-allocation frame recording.
//!
//! ## Design Philosophy
//!
//! All memory is allocated once at startup. During a frame:
//! - No heap allocations
//! - No individual frees
//! - One O(1) reset when the frame's work has been replayed

mod linear;

pub use linear::{ArenaRange, LinearAllocator, MAX_ALIGN};
