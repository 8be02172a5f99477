//! # Render Context
//!
//! Owns everything the renderer shares between call sites: the resource
//! registry, the configuration buckets are created from, and the frame
//! statistics. It is created explicitly and passed by reference; nothing in
//! this crate is global.
//!
//! ```text
//!   init ──► register ──► [ create_bucket ─► record ─► submit ]* ─► end_frame ──► shutdown
//! ```

use std::path::Path;

use kiln_core::{CommandBucket, FlushStats};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::RenderBackend;
use crate::config::RenderConfig;
use crate::error::RenderResult;
use crate::resources::{ResourceCounts, ResourceRegistry};
use crate::stats::RenderStats;

/// Shared renderer state.
///
/// `RenderContext` is `Sync`: recording threads may look resources up
/// concurrently through [`resources`](Self::resources) while each fills its
/// own bucket. Registration takes the write lock.
pub struct RenderContext {
    config: RenderConfig,
    registry: RwLock<ResourceRegistry>,
    frame: Mutex<RenderStats>,
}

impl RenderContext {
    /// Creates a context from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidConfig`](crate::RenderError::InvalidConfig)
    /// if the configuration does not validate.
    pub fn init(config: RenderConfig) -> RenderResult<Self> {
        config.validate()?;
        let registry = ResourceRegistry::new(&config.pools);
        tracing::debug!(
            bucket_capacity = config.buckets.capacity,
            arena_bytes = config.buckets.arena_bytes,
            registry_bytes = registry.memory_footprint(),
            "render context initialized"
        );
        Ok(Self {
            config,
            registry: RwLock::new(registry),
            frame: Mutex::new(RenderStats::default()),
        })
    }

    /// Loads the configuration from a TOML file and creates a context.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`RenderConfig::from_toml_file`].
    pub fn from_config_file(path: impl AsRef<Path>) -> RenderResult<Self> {
        Self::init(RenderConfig::from_toml_file(path)?)
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Shared access to the registry for lookups.
    pub fn resources(&self) -> RwLockReadGuard<'_, ResourceRegistry> {
        self.registry.read()
    }

    /// Exclusive access to the registry for registration and release.
    pub fn resources_mut(&self) -> RwLockWriteGuard<'_, ResourceRegistry> {
        self.registry.write()
    }

    /// Creates a bucket sized from the configuration.
    ///
    /// Buckets allocate their storage here, so create them once and reuse
    /// them every frame.
    #[must_use]
    pub fn create_bucket<K, B: RenderBackend + ?Sized>(&self) -> CommandBucket<K, B> {
        CommandBucket::new(self.config.buckets.clone())
    }

    /// Sorts and flushes `bucket` into `backend`, and adds the flush to this
    /// frame's statistics.
    pub fn submit<K, B>(&self, bucket: &mut CommandBucket<K, B>, backend: &mut B) -> FlushStats
    where
        K: Ord + Send,
        B: RenderBackend + ?Sized,
    {
        bucket.sort();
        let flush = bucket.flush(backend);
        if flush.dropped > 0 {
            tracing::warn!(
                dropped = flush.dropped,
                arena_bytes = self.config.buckets.arena_bytes,
                "commands dropped this frame, consider a larger arena"
            );
        }
        self.frame.lock().record_flush(&flush);
        flush
    }

    /// Statistics of the frame in progress.
    #[must_use]
    pub fn stats(&self) -> RenderStats {
        *self.frame.lock()
    }

    /// Closes the current frame and returns its statistics.
    pub fn end_frame(&self) -> RenderStats {
        let mut frame = self.frame.lock();
        let finished = *frame;
        *frame = RenderStats {
            frame: finished.frame + 1,
            ..RenderStats::default()
        };
        tracing::trace!(
            frame = finished.frame,
            commands = finished.commands,
            packets = finished.packets,
            "frame ended"
        );
        finished
    }

    /// Tears the context down and reports resources still registered.
    ///
    /// Native objects are owned by the backend; anything reported here was
    /// never released and leaks there.
    pub fn shutdown(self) -> ResourceCounts {
        let leaked = self.registry.into_inner().live_counts();
        if leaked.total() > 0 {
            tracing::warn!(
                buffers = leaked.buffers,
                textures = leaked.textures,
                samplers = leaked.samplers,
                shaders = leaked.shaders,
                pipelines = leaked.pipelines,
                "render context shut down with live resources"
            );
        } else {
            tracing::debug!("render context shut down");
        }
        leaked
    }
}
