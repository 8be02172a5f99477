//! Sort keys for draw ordering.
//!
//! Buckets replay the highest key first. A [`DrawKey`] compares by layer,
//! then pipeline (so draws sharing a pipeline end up adjacent), then depth.

use crate::resources::PipelineHandle;

/// How draws within one layer and pipeline are ordered by depth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DepthOrder {
    /// Nearest first (opaque geometry, early depth rejection).
    FrontToBack,
    /// Farthest first (blended geometry).
    BackToFront,
}

/// Structured sort key for a [`CommandBucket`](kiln_core::CommandBucket)
/// with the default descending order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrawKey {
    layer: u8,
    pipeline: u32,
    depth: u32,
}

impl DrawKey {
    /// Builds a key. Higher layers replay first.
    ///
    /// `depth` is a view-space distance quantized by the caller; larger is
    /// farther away.
    #[must_use]
    pub const fn new(layer: u8, pipeline: PipelineHandle, depth: u32, order: DepthOrder) -> Self {
        let depth = match order {
            DepthOrder::FrontToBack => u32::MAX - depth,
            DepthOrder::BackToFront => depth,
        };
        Self {
            layer,
            pipeline: pipeline.index(),
            depth,
        }
    }

    /// Key for opaque geometry: nearest first.
    #[must_use]
    pub const fn opaque(layer: u8, pipeline: PipelineHandle, depth: u32) -> Self {
        Self::new(layer, pipeline, depth, DepthOrder::FrontToBack)
    }

    /// Key for blended geometry: farthest first.
    #[must_use]
    pub const fn transparent(layer: u8, pipeline: PipelineHandle, depth: u32) -> Self {
        Self::new(layer, pipeline, depth, DepthOrder::BackToFront)
    }

    /// Layer.
    #[must_use]
    pub const fn layer(&self) -> u8 {
        self.layer
    }

    /// Slot index of the pipeline.
    #[must_use]
    pub const fn pipeline_index(&self) -> u32 {
        self.pipeline
    }

    /// The key packed into one integer, ordered the same way.
    #[must_use]
    pub const fn to_bits(&self) -> u128 {
        ((self.layer as u128) << 64) | ((self.pipeline as u128) << 32) | self.depth as u128
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::{Handle, RawHandle};

    fn pipeline(index: u32) -> PipelineHandle {
        Handle::from_raw(RawHandle::new(index, 1))
    }

    fn descending(mut keys: Vec<DrawKey>) -> Vec<DrawKey> {
        keys.sort_by(|a, b| b.cmp(a));
        keys
    }

    #[test]
    fn test_layer_dominates() {
        let low = DrawKey::opaque(0, pipeline(9), 0);
        let high = DrawKey::opaque(1, pipeline(1), 1000);
        assert!(high > low);
    }

    #[test]
    fn test_opaque_runs_nearest_first() {
        let near = DrawKey::opaque(0, pipeline(1), 10);
        let far = DrawKey::opaque(0, pipeline(1), 500);
        assert_eq!(descending(vec![far, near]), vec![near, far]);
    }

    #[test]
    fn test_transparent_runs_farthest_first() {
        let near = DrawKey::transparent(0, pipeline(1), 10);
        let far = DrawKey::transparent(0, pipeline(1), 500);
        assert_eq!(descending(vec![near, far]), vec![far, near]);
    }

    #[test]
    fn test_same_pipeline_grouped() {
        let a1 = DrawKey::opaque(0, pipeline(2), 5);
        let b = DrawKey::opaque(0, pipeline(1), 1);
        let a2 = DrawKey::opaque(0, pipeline(2), 50);
        let sorted = descending(vec![a1, b, a2]);
        assert_eq!(sorted[0].pipeline_index(), sorted[1].pipeline_index());
        assert_eq!(sorted[2], b);
    }

    #[test]
    fn test_bits_preserve_order() {
        let keys = [
            DrawKey::opaque(0, pipeline(1), 3),
            DrawKey::transparent(2, pipeline(0), 7),
            DrawKey::opaque(1, pipeline(4), 0),
        ];
        for a in keys {
            for b in keys {
                assert_eq!(a.cmp(&b), a.to_bits().cmp(&b.to_bits()));
            }
        }
        assert_eq!(keys[1].layer(), 2);
    }
}
