//! # Render Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file is a valid configuration:
//!
//! ```toml
//! [buckets]
//! capacity = 10000
//! arena_bytes = 1048576
//! sort_order = "descending"
//! parallel_sort_threshold = 4096
//!
//! [pools]
//! buffers = 4096
//! textures = 1024
//! samplers = 256
//! shaders = 256
//! pipelines = 256
//! ```

use std::path::Path;

use kiln_core::BucketConfig;
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

/// Bucket sizing, shared by every bucket the context creates.
pub type BucketSettings = BucketConfig;

/// Handle pool capacity per resource kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Buffer slots.
    pub buffers: usize,
    /// Texture slots.
    pub textures: usize,
    /// Sampler slots.
    pub samplers: usize,
    /// Shader slots.
    pub shaders: usize,
    /// Pipeline slots.
    pub pipelines: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            buffers: 4096,
            textures: 1024,
            samplers: 256,
            shaders: 256,
            pipelines: 256,
        }
    }
}

/// Top-level renderer configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Command bucket sizing.
    pub buckets: BucketSettings,
    /// Resource pool sizing.
    pub pools: PoolSettings,
}

impl RenderConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ConfigParse`] for malformed TOML and
    /// [`RenderError::InvalidConfig`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> RenderResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Io`] if the file cannot be read, otherwise the
    /// errors of [`from_toml_str`](Self::from_toml_str).
    pub fn from_toml_file(path: impl AsRef<Path>) -> RenderResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loading render config");
        Self::from_toml_str(&text)
    }

    /// Checks that every capacity is usable.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> RenderResult<()> {
        let buckets = &self.buckets;
        if buckets.capacity == 0 {
            return Err(invalid("buckets.capacity must be greater than zero"));
        }
        if u32::try_from(buckets.capacity).is_err() {
            return Err(invalid("buckets.capacity must fit in 32 bits"));
        }
        // Smallest useful packet: one handle-sized command.
        if buckets.arena_bytes < 8 {
            return Err(invalid("buckets.arena_bytes cannot hold a single command"));
        }

        let pools = [
            ("pools.buffers", self.pools.buffers),
            ("pools.textures", self.pools.textures),
            ("pools.samplers", self.pools.samplers),
            ("pools.shaders", self.pools.shaders),
            ("pools.pipelines", self.pools.pipelines),
        ];
        for (name, capacity) in pools {
            if capacity == 0 {
                return Err(invalid(&format!("{name} must be greater than zero")));
            }
            if capacity >= u32::MAX as usize {
                return Err(invalid(&format!("{name} must be below 2^32 - 1")));
            }
        }
        Ok(())
    }
}

fn invalid(message: &str) -> RenderError {
    RenderError::InvalidConfig(message.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::SortOrder;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = RenderConfig::from_toml_str("").unwrap();
        assert_eq!(config, RenderConfig::default());
        assert_eq!(config.buckets.capacity, 10_000);
        assert_eq!(config.buckets.arena_bytes, 1 << 20);
        assert_eq!(config.buckets.sort_order, SortOrder::Descending);
        assert_eq!(config.pools.textures, 1024);
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let config = RenderConfig::from_toml_str(
            r#"
            [buckets]
            capacity = 512
            sort_order = "ascending"

            [pools]
            pipelines = 32
            "#,
        )
        .unwrap();
        assert_eq!(config.buckets.capacity, 512);
        assert_eq!(config.buckets.sort_order, SortOrder::Ascending);
        assert_eq!(config.buckets.arena_bytes, 1 << 20);
        assert_eq!(config.pools.pipelines, 32);
        assert_eq!(config.pools.buffers, 4096);
    }

    #[test]
    fn test_serialized_defaults_parse_back() {
        let text = toml::to_string(&RenderConfig::default()).unwrap();
        assert_eq!(RenderConfig::from_toml_str(&text).unwrap(), RenderConfig::default());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = RenderConfig::from_toml_str("[buckets]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfig(_)));
        assert!(err.to_string().contains("buckets.capacity"));

        let err = RenderConfig::from_toml_str("[pools]\nsamplers = 0\n").unwrap_err();
        assert!(err.to_string().contains("pools.samplers"));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = RenderConfig::from_toml_str("[buckets\n").unwrap_err();
        assert!(matches!(err, RenderError::ConfigParse(_)));

        let err =
            RenderConfig::from_toml_str("[buckets]\nsort_order = \"sideways\"\n").unwrap_err();
        assert!(matches!(err, RenderError::ConfigParse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RenderConfig::from_toml_file("/nonexistent/kiln.toml").unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
        assert!(err.to_string().contains("kiln.toml"));
    }
}
