//! # GPU Resource Registry
//!
//! The backend creates native objects; the registry hands out typed handles
//! for them. Call sites and commands only ever hold handles, and every access
//! goes through a generation check.

use kiln_core::{Handle, HandlePool, PooledResource};

use crate::config::PoolSettings;

/// Opaque id of a backend object. `NativeId::NONE` marks an empty record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NativeId(pub u64);

impl NativeId {
    /// No backend object.
    pub const NONE: Self = Self(0);
}

/// Backend object plus the description it was created from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceRecord<D> {
    /// Backend object id.
    pub native: NativeId,
    /// Creation parameters.
    pub desc: D,
}

impl<D: Default> PooledResource for ResourceRecord<D> {}

/// Buffer usage flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BufferUsage(pub u32);

impl BufferUsage {
    /// Vertex input.
    pub const VERTEX: Self = Self(1);
    /// Index input.
    pub const INDEX: Self = Self(1 << 1);
    /// Constant buffer.
    pub const CONSTANT: Self = Self(1 << 2);
    /// Shader storage (read or read-write).
    pub const STORAGE: Self = Self(1 << 3);
    /// Copy source or destination.
    pub const TRANSFER: Self = Self(1 << 4);

    /// Checks whether all flags of `other` are set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for BufferUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Buffer description.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes.
    pub size: u64,
    /// Allowed usages.
    pub usage: BufferUsage,
}

/// Texel formats the renderer understands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA, normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit BGRA, normalized (common swapchain format).
    Bgra8Unorm,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 32-bit float single channel.
    R32Float,
    /// 32-bit float depth.
    Depth32Float,
}

/// Texture description.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextureDesc {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// Texel format.
    pub format: TextureFormat,
}

/// Texture filtering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Linear interpolation.
    #[default]
    Linear,
}

/// Texture addressing outside `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    #[default]
    ClampToEdge,
    /// Repeat.
    Repeat,
    /// Repeat mirrored.
    MirrorRepeat,
}

/// Sampler description.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SamplerDesc {
    /// Filtering.
    pub filter: FilterMode,
    /// Addressing.
    pub address_mode: AddressMode,
}

/// Shader stage a shader module is compiled for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage.
    #[default]
    Vertex,
    /// Fragment stage.
    Fragment,
    /// Compute stage.
    Compute,
}

/// Shader description.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShaderDesc {
    /// Stage the module targets.
    pub stage: ShaderStage,
}

/// Pipeline description. Shader handles must be live at registration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PipelineDesc {
    /// Rasterization pipeline.
    Graphics {
        /// Vertex shader.
        vertex: ShaderHandle,
        /// Fragment shader.
        fragment: ShaderHandle,
    },
    /// Compute pipeline.
    Compute {
        /// Compute shader.
        shader: ShaderHandle,
    },
    /// Placeholder held by free slots.
    #[default]
    Unset,
}

/// A registered buffer.
pub type Buffer = ResourceRecord<BufferDesc>;
/// A registered texture.
pub type Texture = ResourceRecord<TextureDesc>;
/// A registered sampler.
pub type Sampler = ResourceRecord<SamplerDesc>;
/// A registered shader module.
pub type Shader = ResourceRecord<ShaderDesc>;
/// A registered pipeline.
pub type Pipeline = ResourceRecord<PipelineDesc>;

/// Handle to a buffer.
pub type BufferHandle = Handle<Buffer>;
/// Handle to a texture.
pub type TextureHandle = Handle<Texture>;
/// Handle to a sampler.
pub type SamplerHandle = Handle<Sampler>;
/// Handle to a shader module.
pub type ShaderHandle = Handle<Shader>;
/// Handle to a pipeline.
pub type PipelineHandle = Handle<Pipeline>;

/// Descriptions that have a pool in the [`ResourceRegistry`].
pub trait ResourceDesc: Default + Sized {
    /// Name used in logs.
    const KIND: &'static str;

    /// The registry pool for this kind.
    fn pool(registry: &ResourceRegistry) -> &HandlePool<ResourceRecord<Self>>;

    /// The registry pool for this kind, mutably.
    fn pool_mut(registry: &mut ResourceRegistry) -> &mut HandlePool<ResourceRecord<Self>>;
}

macro_rules! resource_desc {
    ($desc:ty, $field:ident, $kind:literal) => {
        impl ResourceDesc for $desc {
            const KIND: &'static str = $kind;

            fn pool(registry: &ResourceRegistry) -> &HandlePool<ResourceRecord<Self>> {
                &registry.$field
            }

            fn pool_mut(registry: &mut ResourceRegistry) -> &mut HandlePool<ResourceRecord<Self>> {
                &mut registry.$field
            }
        }
    };
}

resource_desc!(BufferDesc, buffers, "buffer");
resource_desc!(TextureDesc, textures, "texture");
resource_desc!(SamplerDesc, samplers, "sampler");
resource_desc!(ShaderDesc, shaders, "shader");
resource_desc!(PipelineDesc, pipelines, "pipeline");

/// Live resource counts per kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    /// Live buffers.
    pub buffers: usize,
    /// Live textures.
    pub textures: usize,
    /// Live samplers.
    pub samplers: usize,
    /// Live shaders.
    pub shaders: usize,
    /// Live pipelines.
    pub pipelines: usize,
}

impl ResourceCounts {
    /// Sum over all kinds.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.buffers + self.textures + self.samplers + self.shaders + self.pipelines
    }
}

/// One handle pool per resource kind.
///
/// Registration is expected at load time on one thread. Lookups may come
/// from many threads at once through a shared reference.
pub struct ResourceRegistry {
    buffers: HandlePool<Buffer>,
    textures: HandlePool<Texture>,
    samplers: HandlePool<Sampler>,
    shaders: HandlePool<Shader>,
    pipelines: HandlePool<Pipeline>,
}

impl ResourceRegistry {
    /// Creates all pools with the configured capacities.
    ///
    /// # Panics
    ///
    /// Panics if a capacity is zero; validate the config first.
    #[must_use]
    pub fn new(settings: &PoolSettings) -> Self {
        Self {
            buffers: HandlePool::new(settings.buffers),
            textures: HandlePool::new(settings.textures),
            samplers: HandlePool::new(settings.samplers),
            shaders: HandlePool::new(settings.shaders),
            pipelines: HandlePool::new(settings.pipelines),
        }
    }

    /// Registers a backend object. Returns `None` when the pool is full.
    pub fn register<D: ResourceDesc>(
        &mut self,
        native: NativeId,
        desc: D,
    ) -> Option<Handle<ResourceRecord<D>>> {
        let Some((handle, record)) = D::pool_mut(self).get_next_free_handle() else {
            tracing::warn!(kind = D::KIND, "resource pool full, registration refused");
            return None;
        };
        *record = ResourceRecord { native, desc };
        tracing::trace!(kind = D::KIND, handle = handle.raw().to_bits(), "resource registered");
        Some(handle)
    }

    /// Releases a handle and returns the backend object it referred to, so
    /// the caller can destroy it.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn release<D: ResourceDesc>(&mut self, handle: Handle<ResourceRecord<D>>) -> NativeId {
        let pool = D::pool_mut(self);
        let native = pool.look_up(handle).native;
        pool.free_handle(handle);
        native
    }

    /// Returns a live record.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn get<D: ResourceDesc>(&self, handle: Handle<ResourceRecord<D>>) -> &ResourceRecord<D> {
        D::pool(self).look_up(handle)
    }

    /// Checks whether a handle is live.
    #[must_use]
    pub fn contains<D: ResourceDesc>(&self, handle: Handle<ResourceRecord<D>>) -> bool {
        D::pool(self).is_valid(handle)
    }

    /// Registers a buffer.
    pub fn register_buffer(&mut self, native: NativeId, desc: BufferDesc) -> Option<BufferHandle> {
        self.register(native, desc)
    }

    /// Registers a texture.
    pub fn register_texture(
        &mut self,
        native: NativeId,
        desc: TextureDesc,
    ) -> Option<TextureHandle> {
        self.register(native, desc)
    }

    /// Registers a sampler.
    pub fn register_sampler(
        &mut self,
        native: NativeId,
        desc: SamplerDesc,
    ) -> Option<SamplerHandle> {
        self.register(native, desc)
    }

    /// Registers a shader module.
    pub fn register_shader(&mut self, native: NativeId, desc: ShaderDesc) -> Option<ShaderHandle> {
        self.register(native, desc)
    }

    /// Registers a pipeline.
    ///
    /// # Panics
    ///
    /// Panics if a referenced shader handle is stale, or its stage does not
    /// match its role in the pipeline.
    pub fn register_pipeline(
        &mut self,
        native: NativeId,
        desc: PipelineDesc,
    ) -> Option<PipelineHandle> {
        match desc {
            PipelineDesc::Graphics { vertex, fragment } => {
                self.expect_stage(vertex, ShaderStage::Vertex);
                self.expect_stage(fragment, ShaderStage::Fragment);
            }
            PipelineDesc::Compute { shader } => self.expect_stage(shader, ShaderStage::Compute),
            PipelineDesc::Unset => {}
        }
        self.register(native, desc)
    }

    /// Releases a buffer.
    pub fn release_buffer(&mut self, handle: BufferHandle) -> NativeId {
        self.release(handle)
    }

    /// Releases a texture.
    pub fn release_texture(&mut self, handle: TextureHandle) -> NativeId {
        self.release(handle)
    }

    /// Releases a sampler.
    pub fn release_sampler(&mut self, handle: SamplerHandle) -> NativeId {
        self.release(handle)
    }

    /// Releases a shader module.
    pub fn release_shader(&mut self, handle: ShaderHandle) -> NativeId {
        self.release(handle)
    }

    /// Releases a pipeline.
    pub fn release_pipeline(&mut self, handle: PipelineHandle) -> NativeId {
        self.release(handle)
    }

    /// Looks up a buffer.
    #[must_use]
    pub fn buffer(&self, handle: BufferHandle) -> &Buffer {
        self.get(handle)
    }

    /// Looks up a texture.
    #[must_use]
    pub fn texture(&self, handle: TextureHandle) -> &Texture {
        self.get(handle)
    }

    /// Looks up a sampler.
    #[must_use]
    pub fn sampler(&self, handle: SamplerHandle) -> &Sampler {
        self.get(handle)
    }

    /// Looks up a shader module.
    #[must_use]
    pub fn shader(&self, handle: ShaderHandle) -> &Shader {
        self.get(handle)
    }

    /// Looks up a pipeline.
    #[must_use]
    pub fn pipeline(&self, handle: PipelineHandle) -> &Pipeline {
        self.get(handle)
    }

    /// Live handles per kind.
    #[must_use]
    pub fn live_counts(&self) -> ResourceCounts {
        ResourceCounts {
            buffers: self.buffers.len(),
            textures: self.textures.len(),
            samplers: self.samplers.len(),
            shaders: self.shaders.len(),
            pipelines: self.pipelines.len(),
        }
    }

    /// Bytes owned by all pools.
    #[must_use]
    pub fn memory_footprint(&self) -> usize {
        self.buffers.get_memory_footprint()
            + self.textures.get_memory_footprint()
            + self.samplers.get_memory_footprint()
            + self.shaders.get_memory_footprint()
            + self.pipelines.get_memory_footprint()
    }

    fn expect_stage(&self, shader: ShaderHandle, stage: ShaderStage) {
        let actual = self.shader(shader).desc.stage;
        assert!(
            actual == stage,
            "pipeline expects a {stage:?} shader, {shader:?} is a {actual:?} shader"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ResourceRegistry {
        ResourceRegistry::new(&PoolSettings {
            buffers: 4,
            textures: 2,
            samplers: 2,
            shaders: 4,
            pipelines: 2,
        })
    }

    #[test]
    fn test_register_and_release_buffer() {
        let mut registry = registry();
        let desc = BufferDesc {
            size: 256,
            usage: BufferUsage::VERTEX | BufferUsage::TRANSFER,
        };
        let handle = registry.register_buffer(NativeId(11), desc).unwrap();

        assert_eq!(registry.buffer(handle).desc, desc);
        assert!(registry.buffer(handle).desc.usage.contains(BufferUsage::VERTEX));
        assert_eq!(registry.live_counts().buffers, 1);

        assert_eq!(registry.release_buffer(handle), NativeId(11));
        assert!(!registry.contains(handle));
        assert_eq!(registry.live_counts().total(), 0);
    }

    #[test]
    fn test_full_pool_refuses_registration() {
        let mut registry = registry();
        let desc = TextureDesc {
            width: 4,
            height: 4,
            mip_levels: 1,
            format: TextureFormat::Rgba8Unorm,
        };
        assert!(registry.register_texture(NativeId(1), desc).is_some());
        assert!(registry.register_texture(NativeId(2), desc).is_some());
        assert!(registry.register_texture(NativeId(3), desc).is_none());
    }

    #[test]
    fn test_graphics_pipeline_checks_shader_stages() {
        let mut registry = registry();
        let vertex = registry
            .register_shader(NativeId(1), ShaderDesc { stage: ShaderStage::Vertex })
            .unwrap();
        let fragment = registry
            .register_shader(NativeId(2), ShaderDesc { stage: ShaderStage::Fragment })
            .unwrap();

        let pipeline = registry
            .register_pipeline(NativeId(3), PipelineDesc::Graphics { vertex, fragment })
            .unwrap();
        assert_eq!(
            registry.pipeline(pipeline).desc,
            PipelineDesc::Graphics { vertex, fragment }
        );
    }

    #[test]
    #[should_panic(expected = "pipeline expects a Compute shader")]
    fn test_compute_pipeline_rejects_vertex_shader() {
        let mut registry = registry();
        let shader = registry
            .register_shader(NativeId(1), ShaderDesc { stage: ShaderStage::Vertex })
            .unwrap();
        let _ = registry.register_pipeline(NativeId(2), PipelineDesc::Compute { shader });
    }

    #[test]
    #[should_panic(expected = "stale handle")]
    fn test_released_sampler_lookup_panics() {
        let mut registry = registry();
        let sampler = registry
            .register_sampler(NativeId(5), SamplerDesc::default())
            .unwrap();
        let _ = registry.release_sampler(sampler);
        let _ = registry.register_sampler(NativeId(6), SamplerDesc::default());
        let _ = registry.sampler(sampler);
    }

    #[test]
    fn test_footprint_covers_all_pools() {
        let registry = registry();
        assert!(registry.memory_footprint() > 0);
    }
}
