//! # Render Commands
//!
//! The closed set of commands the renderer records. Each is plain data that
//! lives inline in a packet, and dispatches itself into a [`RenderBackend`].
//!
//! A draw is recorded as two chained packets under one key:
//!
//! ```text
//!   BindResources (aux: bind table) ──next──► Draw / DrawIndexed / DispatchCompute
//! ```

use bytemuck::{Pod, Zeroable};
use kiln_core::{Command, CommandBucket, Handle, PacketRef, RawHandle};

use crate::backend::RenderBackend;
use crate::bind_table::{BindTable, BindTableCounts, BindTableFiller, BindTableLayout};
use crate::resources::{BufferHandle, PipelineHandle};

/// Commands that run with a bound pipeline.
pub trait PipelineCommand {
    /// The pipeline the command runs with.
    fn pipeline(&self) -> PipelineHandle;
}

/// Binds a pipeline and the bind table stored in the aux bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct BindResources {
    pipeline: RawHandle,
}

impl BindResources {
    /// Creates the command.
    #[must_use]
    pub const fn new(pipeline: PipelineHandle) -> Self {
        Self {
            pipeline: pipeline.raw(),
        }
    }
}

impl PipelineCommand for BindResources {
    fn pipeline(&self) -> PipelineHandle {
        Handle::from_raw(self.pipeline)
    }
}

impl<B: RenderBackend + ?Sized> Command<B> for BindResources {
    fn dispatch(&self, aux: &[u8], backend: &mut B) {
        match BindTable::parse(aux) {
            Ok(table) => backend.bind_resources(self.pipeline(), &table),
            Err(err) => panic!("malformed bind table reached dispatch: {err}"),
        }
    }
}

/// Non-indexed draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Draw {
    pipeline: RawHandle,
    vertex_count: u32,
    instance_count: u32,
    first_vertex: u32,
    first_instance: u32,
}

impl Draw {
    /// Draws `vertex_count` vertices, one instance.
    #[must_use]
    pub const fn new(pipeline: PipelineHandle, vertex_count: u32) -> Self {
        Self {
            pipeline: pipeline.raw(),
            vertex_count,
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
        }
    }

    /// Sets the instance range.
    #[must_use]
    pub const fn instanced(mut self, instance_count: u32, first_instance: u32) -> Self {
        self.instance_count = instance_count;
        self.first_instance = first_instance;
        self
    }

    /// Sets the first vertex.
    #[must_use]
    pub const fn starting_at(mut self, first_vertex: u32) -> Self {
        self.first_vertex = first_vertex;
        self
    }

    /// Vertices per instance.
    #[must_use]
    pub const fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of instances.
    #[must_use]
    pub const fn instance_count(&self) -> u32 {
        self.instance_count
    }

    /// First vertex.
    #[must_use]
    pub const fn first_vertex(&self) -> u32 {
        self.first_vertex
    }

    /// First instance.
    #[must_use]
    pub const fn first_instance(&self) -> u32 {
        self.first_instance
    }
}

impl PipelineCommand for Draw {
    fn pipeline(&self) -> PipelineHandle {
        Handle::from_raw(self.pipeline)
    }
}

impl<B: RenderBackend + ?Sized> Command<B> for Draw {
    fn dispatch(&self, _aux: &[u8], backend: &mut B) {
        backend.draw(self);
    }
}

/// Indexed draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct DrawIndexed {
    pipeline: RawHandle,
    index_buffer: RawHandle,
    index_count: u32,
    instance_count: u32,
    first_index: u32,
    base_vertex: i32,
    first_instance: u32,
}

impl DrawIndexed {
    /// Draws `index_count` indices from `index_buffer`, one instance.
    #[must_use]
    pub const fn new(
        pipeline: PipelineHandle,
        index_buffer: BufferHandle,
        index_count: u32,
    ) -> Self {
        Self {
            pipeline: pipeline.raw(),
            index_buffer: index_buffer.raw(),
            index_count,
            instance_count: 1,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        }
    }

    /// Sets the instance range.
    #[must_use]
    pub const fn instanced(mut self, instance_count: u32, first_instance: u32) -> Self {
        self.instance_count = instance_count;
        self.first_instance = first_instance;
        self
    }

    /// Sets the first index and the value added to every index.
    #[must_use]
    pub const fn with_offsets(mut self, first_index: u32, base_vertex: i32) -> Self {
        self.first_index = first_index;
        self.base_vertex = base_vertex;
        self
    }

    /// The index buffer.
    #[must_use]
    pub const fn index_buffer(&self) -> BufferHandle {
        Handle::from_raw(self.index_buffer)
    }

    /// Indices per instance.
    #[must_use]
    pub const fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Number of instances.
    #[must_use]
    pub const fn instance_count(&self) -> u32 {
        self.instance_count
    }

    /// First index.
    #[must_use]
    pub const fn first_index(&self) -> u32 {
        self.first_index
    }

    /// Value added to every index.
    #[must_use]
    pub const fn base_vertex(&self) -> i32 {
        self.base_vertex
    }

    /// First instance.
    #[must_use]
    pub const fn first_instance(&self) -> u32 {
        self.first_instance
    }
}

impl PipelineCommand for DrawIndexed {
    fn pipeline(&self) -> PipelineHandle {
        Handle::from_raw(self.pipeline)
    }
}

impl<B: RenderBackend + ?Sized> Command<B> for DrawIndexed {
    fn dispatch(&self, _aux: &[u8], backend: &mut B) {
        backend.draw_indexed(self);
    }
}

/// Compute dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct DispatchCompute {
    pipeline: RawHandle,
    groups: [u32; 3],
}

impl DispatchCompute {
    /// Dispatches `x * y * z` workgroups.
    #[must_use]
    pub const fn new(pipeline: PipelineHandle, x: u32, y: u32, z: u32) -> Self {
        Self {
            pipeline: pipeline.raw(),
            groups: [x, y, z],
        }
    }

    /// Workgroup counts per axis.
    #[must_use]
    pub const fn groups(&self) -> [u32; 3] {
        self.groups
    }
}

impl PipelineCommand for DispatchCompute {
    fn pipeline(&self) -> PipelineHandle {
        Handle::from_raw(self.pipeline)
    }
}

impl<B: RenderBackend + ?Sized> Command<B> for DispatchCompute {
    fn dispatch(&self, _aux: &[u8], backend: &mut B) {
        backend.dispatch_compute(self);
    }
}

/// Buffer to buffer copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct CopyBuffer {
    source: RawHandle,
    destination: RawHandle,
    source_offset: u64,
    destination_offset: u64,
    size: u64,
}

impl CopyBuffer {
    /// Copies `size` bytes.
    #[must_use]
    pub const fn new(
        source: BufferHandle,
        source_offset: u64,
        destination: BufferHandle,
        destination_offset: u64,
        size: u64,
    ) -> Self {
        Self {
            source: source.raw(),
            destination: destination.raw(),
            source_offset,
            destination_offset,
            size,
        }
    }

    /// Buffer read from.
    #[must_use]
    pub const fn source(&self) -> BufferHandle {
        Handle::from_raw(self.source)
    }

    /// Buffer written to.
    #[must_use]
    pub const fn destination(&self) -> BufferHandle {
        Handle::from_raw(self.destination)
    }

    /// Read offset.
    #[must_use]
    pub const fn source_offset(&self) -> u64 {
        self.source_offset
    }

    /// Write offset.
    #[must_use]
    pub const fn destination_offset(&self) -> u64 {
        self.destination_offset
    }

    /// Bytes copied.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }
}

impl<B: RenderBackend + ?Sized> Command<B> for CopyBuffer {
    fn dispatch(&self, _aux: &[u8], backend: &mut B) {
        backend.copy_buffer(self);
    }
}

/// Writes the aux bytes into a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct UpdateBuffer {
    buffer: RawHandle,
    offset: u64,
}

impl UpdateBuffer {
    /// Creates the command. The data goes into the aux bytes.
    #[must_use]
    pub const fn new(buffer: BufferHandle, offset: u64) -> Self {
        Self {
            buffer: buffer.raw(),
            offset,
        }
    }

    /// Target buffer.
    #[must_use]
    pub const fn buffer(&self) -> BufferHandle {
        Handle::from_raw(self.buffer)
    }

    /// Write offset.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }
}

impl<B: RenderBackend + ?Sized> Command<B> for UpdateBuffer {
    fn dispatch(&self, aux: &[u8], backend: &mut B) {
        backend.update_buffer(self.buffer(), self.offset, aux);
    }
}

/// Records a bind table followed by `command` under one key.
///
/// `fill` writes the bindings declared in `counts`. `command` is usually a
/// [`Draw`], [`DrawIndexed`] or [`DispatchCompute`]; its pipeline is the one
/// bound.
///
/// Returns `None` when the arena has no room for both packets; nothing is
/// left in the bucket in that case.
///
/// # Panics
///
/// Panics if `fill` writes fewer or more bindings than declared, or writes
/// them out of order.
pub fn record_draw<K, B, C, F>(
    bucket: &mut CommandBucket<K, B>,
    key: K,
    counts: BindTableCounts,
    fill: F,
    command: C,
) -> Option<PacketRef>
where
    B: RenderBackend + ?Sized,
    C: Command<B> + PipelineCommand,
    F: FnOnce(&mut BindTableFiller<'_>),
{
    let aux_size = BindTableLayout::required_bytes(counts);
    let bind = bucket.add_command::<BindResources>(key, aux_size)?;
    let packet = bind.packet();
    let (bind, aux) = bind.into_parts();
    *bind = BindResources::new(command.pipeline());

    let mut filler = BindTableFiller::new(aux, counts);
    fill(&mut filler);
    filler.validate();

    let Some(mut recorded) = bucket.append_command::<C>(packet, 0) else {
        bucket.discard_last();
        return None;
    };
    recorded.set(command);
    Some(packet)
}

/// Records a buffer update carrying a copy of `data`.
///
/// Returns `None` when the arena has no room for it.
pub fn record_upload<K, B>(
    bucket: &mut CommandBucket<K, B>,
    key: K,
    buffer: BufferHandle,
    offset: u64,
    data: &[u8],
) -> Option<PacketRef>
where
    B: RenderBackend + ?Sized,
{
    let mut update = bucket.add_command::<UpdateBuffer>(key, data.len())?;
    update.set(UpdateBuffer::new(buffer, offset));
    update.aux_mut().copy_from_slice(data);
    Some(update.packet())
}
