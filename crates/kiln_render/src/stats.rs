//! Submission statistics.

use kiln_core::FlushStats;

/// Counters accumulated over the bucket flushes of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Frame the counters belong to.
    pub frame: u64,
    /// Buckets submitted.
    pub buckets_flushed: u32,
    /// Top-level bucket entries replayed.
    pub commands: usize,
    /// Packets dispatched, chained ones included.
    pub packets: usize,
    /// Commands dropped because an arena was full.
    pub dropped_commands: usize,
    /// Arena bytes used, summed over buckets.
    pub arena_bytes: usize,
    /// Largest single bucket arena usage.
    pub peak_arena_bytes: usize,
}

impl RenderStats {
    /// Adds one flush to the counters.
    pub fn record_flush(&mut self, flush: &FlushStats) {
        self.buckets_flushed += 1;
        self.commands += flush.entries;
        self.packets += flush.packets;
        self.dropped_commands += flush.dropped;
        self.arena_bytes += flush.arena_bytes;
        self.peak_arena_bytes = self.peak_arena_bytes.max(flush.arena_bytes);
    }

    /// Returns true if any command was dropped this frame.
    #[must_use]
    pub const fn dropped_any(&self) -> bool {
        self.dropped_commands > 0
    }

    /// Average packets per entry; above 1.0 when commands were chained.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn packets_per_command(&self) -> f32 {
        if self.commands > 0 {
            self.packets as f32 / self.commands as f32
        } else {
            0.0
        }
    }
}
