//! # KILN Render
//!
//! The renderer-facing layer on top of `kiln_core`:
//! - Typed GPU resource handles and the registry that issues them
//! - Bind tables packed into command aux bytes
//! - The render command set and the [`RenderBackend`] it replays into
//! - [`RenderContext`], the explicitly constructed owner of shared state
//!
//! ## Frame Flow
//!
//! ```rust,ignore
//! let context = RenderContext::from_config_file("kiln.toml")?;
//! let mut bucket: RenderBucket<MyBackend> = context.create_bucket();
//!
//! loop {
//!     let fill = |f: &mut BindTableFiller<'_>| {
//!         f.add_vb(vb, 0, 0, 32);
//!     };
//!     record_draw(&mut bucket, key, counts, fill, Draw::new(pipeline, 36));
//!     context.submit(&mut bucket, &mut backend);
//!     context.end_frame();
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod backend;
pub mod bind_table;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod key;
pub mod resources;
pub mod stats;

pub use backend::RenderBackend;
pub use bind_table::{BindTable, BindTableCounts, BindTableFiller, BindTableLayout, ShaderStages};
pub use commands::{
    record_draw, record_upload, BindResources, CopyBuffer, DispatchCompute, Draw, DrawIndexed,
    PipelineCommand, UpdateBuffer,
};
pub use config::{BucketSettings, PoolSettings, RenderConfig};
pub use context::RenderContext;
pub use error::{BindTableError, BindingCategory, RenderError, RenderResult};
pub use key::{DepthOrder, DrawKey};
pub use resources::{
    BufferHandle, NativeId, PipelineHandle, ResourceCounts, ResourceRegistry, SamplerHandle,
    ShaderHandle, TextureHandle,
};
pub use stats::RenderStats;

/// A command bucket keyed for draw ordering.
pub type RenderBucket<B> = kiln_core::CommandBucket<DrawKey, B>;
