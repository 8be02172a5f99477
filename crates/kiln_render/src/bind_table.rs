//! # Bind Tables
//!
//! A bind table is the list of resources a draw or dispatch needs, packed
//! into the aux bytes of a [`BindResources`](crate::commands::BindResources)
//! packet. There are no length prefixes: both sides derive every offset from
//! the header counts.
//!
//! ```text
//!   ┌────────┬────────────┬──────────────┬───────┬────────────┬──────────┐
//!   │ header │ vertex buf │ constant buf │ reads │ read-write │ samplers │
//!   └────────┴────────────┴──────────────┴───────┴────────────┴──────────┘
//! ```
//!
//! Records are copied in and out with `bytemuck`, so the aux bytes need no
//! particular alignment.

use std::mem;

use bytemuck::{Pod, Zeroable};
use kiln_core::{Handle, RawHandle};

use crate::error::{BindTableError, BindingCategory};
use crate::resources::{BufferHandle, SamplerHandle, TextureHandle};

/// Size of the encoded [`BindTableHeader`].
pub const HEADER_SIZE: usize = mem::size_of::<BindTableHeader>();

const RECORD_SIZES: [usize; 5] = [
    mem::size_of::<VertexBufferBinding>(),
    mem::size_of::<ConstantBufferBinding>(),
    mem::size_of::<ReadBinding>(),
    mem::size_of::<ReadWriteBinding>(),
    mem::size_of::<SamplerBinding>(),
];

/// Shader stages a binding is visible to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct ShaderStages(pub u32);

impl ShaderStages {
    /// Vertex stage.
    pub const VERTEX: Self = Self(1);
    /// Fragment stage.
    pub const FRAGMENT: Self = Self(1 << 1);
    /// Compute stage.
    pub const COMPUTE: Self = Self(1 << 2);
    /// Every stage.
    pub const ALL: Self = Self(0b111);

    /// Checks whether all stages of `other` are included.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ShaderStages {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Declared binding count per category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BindTableCounts {
    /// Vertex buffers.
    pub vertex_buffers: u16,
    /// Constant buffers.
    pub constant_buffers: u16,
    /// Read-only textures and buffers.
    pub reads: u16,
    /// Read-write textures and buffers.
    pub read_writes: u16,
    /// Samplers.
    pub samplers: u16,
}

impl BindTableCounts {
    /// Count declared for one category.
    #[inline]
    #[must_use]
    pub const fn get(&self, category: BindingCategory) -> u16 {
        match category {
            BindingCategory::VertexBuffer => self.vertex_buffers,
            BindingCategory::ConstantBuffer => self.constant_buffers,
            BindingCategory::Read => self.reads,
            BindingCategory::ReadWrite => self.read_writes,
            BindingCategory::Sampler => self.samplers,
        }
    }

    /// Total number of bindings.
    #[must_use]
    pub fn total(&self) -> usize {
        BindingCategory::ALL
            .iter()
            .map(|&category| usize::from(self.get(category)))
            .sum()
    }
}

/// Header at the start of every bind table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct BindTableHeader {
    /// Vertex buffer count.
    pub vertex_buffers: u16,
    /// Constant buffer count.
    pub constant_buffers: u16,
    /// Read binding count.
    pub reads: u16,
    /// Read-write binding count.
    pub read_writes: u16,
    /// Sampler count.
    pub samplers: u16,
    /// Non-zero once every declared binding was written.
    pub validated: u16,
}

impl BindTableHeader {
    fn new(counts: BindTableCounts, validated: bool) -> Self {
        Self {
            vertex_buffers: counts.vertex_buffers,
            constant_buffers: counts.constant_buffers,
            reads: counts.reads,
            read_writes: counts.read_writes,
            samplers: counts.samplers,
            validated: u16::from(validated),
        }
    }

    /// The declared counts.
    #[must_use]
    pub const fn counts(&self) -> BindTableCounts {
        BindTableCounts {
            vertex_buffers: self.vertex_buffers,
            constant_buffers: self.constant_buffers,
            reads: self.reads,
            read_writes: self.read_writes,
            samplers: self.samplers,
        }
    }

    /// Whether the filler validated the table.
    #[must_use]
    pub const fn is_validated(&self) -> bool {
        self.validated != 0
    }
}

/// Byte offsets of each category, derived from the counts alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindTableLayout {
    offsets: [usize; 5],
    len: usize,
}

impl BindTableLayout {
    /// Computes the layout for `counts`.
    #[must_use]
    pub fn new(counts: BindTableCounts) -> Self {
        let mut offsets = [0; 5];
        let mut cursor = HEADER_SIZE;
        for category in BindingCategory::ALL {
            let slot = category as usize;
            offsets[slot] = cursor;
            cursor += usize::from(counts.get(category)) * RECORD_SIZES[slot];
        }
        Self {
            offsets,
            len: cursor,
        }
    }

    /// Aux bytes to request for a table with `counts`.
    #[must_use]
    pub fn required_bytes(counts: BindTableCounts) -> usize {
        Self::new(counts).len
    }

    /// Offset of the first record of `category`.
    #[inline]
    #[must_use]
    pub const fn offset(&self, category: BindingCategory) -> usize {
        self.offsets[category as usize]
    }

    /// Total encoded size, header included.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Always false: the header is always present.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// What a read or read-write binding refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A texture.
    Texture,
    /// A buffer.
    Buffer,
}

/// A vertex buffer binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct VertexBufferBinding {
    buffer: RawHandle,
    slot: u32,
    offset: u32,
    stride: u32,
}

impl VertexBufferBinding {
    /// The bound buffer.
    #[must_use]
    pub const fn buffer(&self) -> BufferHandle {
        Handle::from_raw(self.buffer)
    }

    /// Input slot.
    #[must_use]
    pub const fn slot(&self) -> u32 {
        self.slot
    }

    /// Byte offset into the buffer.
    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Bytes between consecutive vertices.
    #[must_use]
    pub const fn stride(&self) -> u32 {
        self.stride
    }
}

/// A constant buffer binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ConstantBufferBinding {
    buffer: RawHandle,
    slot: u32,
    offset: u32,
    size: u32,
    stages: ShaderStages,
}

impl ConstantBufferBinding {
    /// The bound buffer.
    #[must_use]
    pub const fn buffer(&self) -> BufferHandle {
        Handle::from_raw(self.buffer)
    }

    /// Binding slot.
    #[must_use]
    pub const fn slot(&self) -> u32 {
        self.slot
    }

    /// Byte offset of the bound range.
    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Byte size of the bound range.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Stages that see the binding.
    #[must_use]
    pub const fn stages(&self) -> ShaderStages {
        self.stages
    }
}

const KIND_TEXTURE: u32 = 0;
const KIND_BUFFER: u32 = 1;

/// A texture or buffer binding, used for both the read and the read-write
/// categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ResourceBinding {
    resource: RawHandle,
    kind: u32,
    slot: u32,
    stages: ShaderStages,
}

impl ResourceBinding {
    fn texture_binding(texture: TextureHandle, slot: u32, stages: ShaderStages) -> Self {
        Self {
            resource: texture.raw(),
            kind: KIND_TEXTURE,
            slot,
            stages,
        }
    }

    fn buffer_binding(buffer: BufferHandle, slot: u32, stages: ShaderStages) -> Self {
        Self {
            resource: buffer.raw(),
            kind: KIND_BUFFER,
            slot,
            stages,
        }
    }

    /// Whether a texture or a buffer is bound.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        if self.kind == KIND_BUFFER {
            ResourceKind::Buffer
        } else {
            ResourceKind::Texture
        }
    }

    /// The bound texture, if this is a texture binding.
    #[must_use]
    pub const fn texture(&self) -> Option<TextureHandle> {
        match self.kind() {
            ResourceKind::Texture => Some(Handle::from_raw(self.resource)),
            ResourceKind::Buffer => None,
        }
    }

    /// The bound buffer, if this is a buffer binding.
    #[must_use]
    pub const fn buffer(&self) -> Option<BufferHandle> {
        match self.kind() {
            ResourceKind::Buffer => Some(Handle::from_raw(self.resource)),
            ResourceKind::Texture => None,
        }
    }

    /// Binding slot.
    #[must_use]
    pub const fn slot(&self) -> u32 {
        self.slot
    }

    /// Stages that see the binding.
    #[must_use]
    pub const fn stages(&self) -> ShaderStages {
        self.stages
    }
}

/// A read-only texture or buffer binding.
pub type ReadBinding = ResourceBinding;

/// A read-write texture or buffer binding.
pub type ReadWriteBinding = ResourceBinding;

/// A sampler binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct SamplerBinding {
    sampler: RawHandle,
    slot: u32,
    stages: ShaderStages,
}

impl SamplerBinding {
    /// The bound sampler.
    #[must_use]
    pub const fn sampler(&self) -> SamplerHandle {
        Handle::from_raw(self.sampler)
    }

    /// Binding slot.
    #[must_use]
    pub const fn slot(&self) -> u32 {
        self.slot
    }

    /// Stages that see the binding.
    #[must_use]
    pub const fn stages(&self) -> ShaderStages {
        self.stages
    }
}

/// Writes a bind table into aux bytes, one record per call.
///
/// Categories go in the fixed order vertex buffer, constant buffer, read,
/// read-write, sampler. Going back to an earlier category, or writing more
/// records than declared, panics. Writing fewer panics in
/// [`validate`](Self::validate); [`try_validate`](Self::try_validate)
/// reports it instead.
///
/// # Example
///
/// ```rust
/// use kiln_render::bind_table::{
///     BindTable, BindTableCounts, BindTableFiller, BindTableLayout, ShaderStages,
/// };
/// use kiln_render::resources::{BufferHandle, SamplerHandle};
///
/// let counts = BindTableCounts { constant_buffers: 1, samplers: 1, ..Default::default() };
/// let mut aux = vec![0u8; BindTableLayout::required_bytes(counts)];
///
/// let mut filler = BindTableFiller::new(&mut aux, counts);
/// filler
///     .add_cb(BufferHandle::INVALID, 0, 0, 256, ShaderStages::VERTEX)
///     .add_sampler(SamplerHandle::INVALID, 0, ShaderStages::FRAGMENT);
/// filler.validate();
///
/// let table = BindTable::parse(&aux).expect("valid table");
/// assert_eq!(table.constant_buffers().len(), 1);
/// ```
pub struct BindTableFiller<'a> {
    aux: &'a mut [u8],
    counts: BindTableCounts,
    layout: BindTableLayout,
    filled: [u16; 5],
    current: BindingCategory,
}

impl<'a> BindTableFiller<'a> {
    /// Writes the (unvalidated) header and prepares to accept records.
    ///
    /// # Panics
    ///
    /// Panics if `aux` is shorter than
    /// [`BindTableLayout::required_bytes`] for `counts`.
    pub fn new(aux: &'a mut [u8], counts: BindTableCounts) -> Self {
        let layout = BindTableLayout::new(counts);
        assert!(
            aux.len() >= layout.len(),
            "aux buffer of {} bytes cannot hold a bind table of {} bytes",
            aux.len(),
            layout.len()
        );
        let header = BindTableHeader::new(counts, false);
        aux[..HEADER_SIZE].copy_from_slice(bytemuck::bytes_of(&header));
        Self {
            aux,
            counts,
            layout,
            filled: [0; 5],
            current: BindingCategory::VertexBuffer,
        }
    }

    /// Adds a vertex buffer.
    pub fn add_vb(
        &mut self,
        buffer: BufferHandle,
        slot: u32,
        offset: u32,
        stride: u32,
    ) -> &mut Self {
        self.write(
            BindingCategory::VertexBuffer,
            &VertexBufferBinding {
                buffer: buffer.raw(),
                slot,
                offset,
                stride,
            },
        )
    }

    /// Adds a constant buffer range.
    pub fn add_cb(
        &mut self,
        buffer: BufferHandle,
        slot: u32,
        offset: u32,
        size: u32,
        stages: ShaderStages,
    ) -> &mut Self {
        self.write(
            BindingCategory::ConstantBuffer,
            &ConstantBufferBinding {
                buffer: buffer.raw(),
                slot,
                offset,
                size,
                stages,
            },
        )
    }

    /// Adds a read-only texture.
    pub fn add_read_tex(
        &mut self,
        texture: TextureHandle,
        slot: u32,
        stages: ShaderStages,
    ) -> &mut Self {
        let binding = ResourceBinding::texture_binding(texture, slot, stages);
        self.write(BindingCategory::Read, &binding)
    }

    /// Adds a read-only buffer.
    pub fn add_read_buf(
        &mut self,
        buffer: BufferHandle,
        slot: u32,
        stages: ShaderStages,
    ) -> &mut Self {
        let binding = ResourceBinding::buffer_binding(buffer, slot, stages);
        self.write(BindingCategory::Read, &binding)
    }

    /// Adds a read-write texture.
    pub fn add_rw_tex(
        &mut self,
        texture: TextureHandle,
        slot: u32,
        stages: ShaderStages,
    ) -> &mut Self {
        let binding = ResourceBinding::texture_binding(texture, slot, stages);
        self.write(BindingCategory::ReadWrite, &binding)
    }

    /// Adds a read-write buffer.
    pub fn add_rw_buf(
        &mut self,
        buffer: BufferHandle,
        slot: u32,
        stages: ShaderStages,
    ) -> &mut Self {
        let binding = ResourceBinding::buffer_binding(buffer, slot, stages);
        self.write(BindingCategory::ReadWrite, &binding)
    }

    /// Adds a sampler.
    pub fn add_sampler(
        &mut self,
        sampler: SamplerHandle,
        slot: u32,
        stages: ShaderStages,
    ) -> &mut Self {
        self.write(
            BindingCategory::Sampler,
            &SamplerBinding {
                sampler: sampler.raw(),
                slot,
                stages,
            },
        )
    }

    /// Records written so far in `category`.
    #[must_use]
    pub const fn filled(&self, category: BindingCategory) -> u16 {
        self.filled[category as usize]
    }

    /// Checks that every declared record was written and marks the table
    /// validated.
    ///
    /// # Panics
    ///
    /// Panics on the first category with fewer records than declared.
    pub fn validate(self) {
        if let Err(err) = self.try_validate() {
            panic!("{err}");
        }
    }

    /// Like [`validate`](Self::validate), but reports a short category.
    ///
    /// # Errors
    ///
    /// Returns [`BindTableError::Underfilled`] for the first short category.
    /// The header then stays unvalidated and [`BindTable::parse`] rejects it.
    pub fn try_validate(mut self) -> Result<(), BindTableError> {
        for category in BindingCategory::ALL {
            let declared = self.counts.get(category);
            let filled = self.filled[category as usize];
            if filled != declared {
                return Err(BindTableError::Underfilled {
                    category,
                    declared,
                    filled,
                });
            }
        }
        let header = BindTableHeader::new(self.counts, true);
        self.aux[..HEADER_SIZE].copy_from_slice(bytemuck::bytes_of(&header));
        Ok(())
    }

    fn write<R: Pod>(&mut self, category: BindingCategory, record: &R) -> &mut Self {
        assert!(
            category as usize >= self.current as usize,
            "bind table bindings must be written in order: {category} after {}",
            self.current
        );
        self.current = category;

        let slot = category as usize;
        let declared = self.counts.get(category);
        assert!(
            self.filled[slot] < declared,
            "bind table overflow: more than {declared} {category} bindings"
        );

        let size = mem::size_of::<R>();
        let start = self.layout.offset(category) + usize::from(self.filled[slot]) * size;
        self.aux[start..start + size].copy_from_slice(bytemuck::bytes_of(record));
        self.filled[slot] += 1;
        self
    }
}

/// Read-only view of an encoded, validated bind table.
#[derive(Clone, Copy, Debug)]
pub struct BindTable<'a> {
    bytes: &'a [u8],
    counts: BindTableCounts,
    layout: BindTableLayout,
}

impl<'a> BindTable<'a> {
    /// Decodes the table at the start of `aux`.
    ///
    /// # Errors
    ///
    /// Returns [`BindTableError::Truncated`] if `aux` is shorter than the
    /// header or the layout it declares, and [`BindTableError::NotValidated`]
    /// if the filler never validated it.
    pub fn parse(aux: &'a [u8]) -> Result<Self, BindTableError> {
        if aux.len() < HEADER_SIZE {
            return Err(BindTableError::Truncated {
                needed: HEADER_SIZE,
                available: aux.len(),
            });
        }
        let header: BindTableHeader = bytemuck::pod_read_unaligned(&aux[..HEADER_SIZE]);
        if !header.is_validated() {
            return Err(BindTableError::NotValidated);
        }

        let counts = header.counts();
        let layout = BindTableLayout::new(counts);
        if aux.len() < layout.len() {
            return Err(BindTableError::Truncated {
                needed: layout.len(),
                available: aux.len(),
            });
        }

        Ok(Self {
            bytes: &aux[..layout.len()],
            counts,
            layout,
        })
    }

    /// Declared counts.
    #[must_use]
    pub const fn counts(&self) -> BindTableCounts {
        self.counts
    }

    /// Encoded size in bytes.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        self.layout.len()
    }

    /// Vertex buffer bindings in write order.
    pub fn vertex_buffers(&self) -> impl ExactSizeIterator<Item = VertexBufferBinding> + 'a {
        self.records(BindingCategory::VertexBuffer)
    }

    /// Constant buffer bindings in write order.
    pub fn constant_buffers(&self) -> impl ExactSizeIterator<Item = ConstantBufferBinding> + 'a {
        self.records(BindingCategory::ConstantBuffer)
    }

    /// Read bindings in write order.
    pub fn reads(&self) -> impl ExactSizeIterator<Item = ReadBinding> + 'a {
        self.records(BindingCategory::Read)
    }

    /// Read-write bindings in write order.
    pub fn read_writes(&self) -> impl ExactSizeIterator<Item = ReadWriteBinding> + 'a {
        self.records(BindingCategory::ReadWrite)
    }

    /// Sampler bindings in write order.
    pub fn samplers(&self) -> impl ExactSizeIterator<Item = SamplerBinding> + 'a {
        self.records(BindingCategory::Sampler)
    }

    fn records<R: Pod>(
        &self,
        category: BindingCategory,
    ) -> impl ExactSizeIterator<Item = R> + 'a {
        let size = mem::size_of::<R>();
        let start = self.layout.offset(category);
        let end = start + usize::from(self.counts.get(category)) * size;
        let bytes: &'a [u8] = self.bytes;
        bytes[start..end].chunks_exact(size).map(bytemuck::pod_read_unaligned::<R>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(index: u32) -> BufferHandle {
        Handle::from_raw(RawHandle::new(index, 1))
    }

    fn texture(index: u32) -> TextureHandle {
        Handle::from_raw(RawHandle::new(index, 1))
    }

    fn sampler(index: u32) -> SamplerHandle {
        Handle::from_raw(RawHandle::new(index, 1))
    }

    fn full_counts() -> BindTableCounts {
        BindTableCounts {
            vertex_buffers: 2,
            constant_buffers: 1,
            reads: 2,
            read_writes: 1,
            samplers: 1,
        }
    }

    #[test]
    fn test_header_is_six_u16() {
        assert_eq!(HEADER_SIZE, 12);
    }

    #[test]
    fn test_layout_offsets_follow_counts() {
        let layout = BindTableLayout::new(full_counts());
        assert_eq!(layout.offset(BindingCategory::VertexBuffer), HEADER_SIZE);
        assert_eq!(
            layout.offset(BindingCategory::ConstantBuffer),
            HEADER_SIZE + 2 * mem::size_of::<VertexBufferBinding>()
        );
        assert_eq!(
            layout.len(),
            layout.offset(BindingCategory::Sampler) + mem::size_of::<SamplerBinding>()
        );
        assert_eq!(
            BindTableLayout::required_bytes(BindTableCounts::default()),
            HEADER_SIZE
        );
    }

    #[test]
    fn test_fill_validate_parse() {
        let counts = full_counts();
        let mut aux = vec![0u8; BindTableLayout::required_bytes(counts)];

        let mut filler = BindTableFiller::new(&mut aux, counts);
        filler
            .add_vb(buffer(1), 0, 0, 32)
            .add_vb(buffer(2), 1, 64, 16)
            .add_cb(buffer(3), 0, 0, 256, ShaderStages::VERTEX | ShaderStages::FRAGMENT)
            .add_read_tex(texture(4), 0, ShaderStages::FRAGMENT)
            .add_read_buf(buffer(5), 1, ShaderStages::ALL)
            .add_rw_buf(buffer(6), 0, ShaderStages::COMPUTE)
            .add_sampler(sampler(7), 0, ShaderStages::FRAGMENT);
        assert_eq!(filler.filled(BindingCategory::VertexBuffer), 2);
        filler.validate();

        let table = BindTable::parse(&aux).unwrap();
        assert_eq!(table.counts(), counts);
        assert_eq!(table.counts().total(), 7);

        let vbs: Vec<_> = table.vertex_buffers().collect();
        assert_eq!(vbs[0].buffer(), buffer(1));
        assert_eq!(vbs[1].offset(), 64);
        assert_eq!(vbs[1].stride(), 16);

        let cb = table.constant_buffers().next().unwrap();
        assert_eq!(cb.size(), 256);
        assert!(cb.stages().contains(ShaderStages::FRAGMENT));
        assert!(!cb.stages().contains(ShaderStages::COMPUTE));

        let reads: Vec<_> = table.reads().collect();
        assert_eq!(reads[0].kind(), ResourceKind::Texture);
        assert_eq!(reads[0].texture(), Some(texture(4)));
        assert_eq!(reads[0].buffer(), None);
        assert_eq!(reads[1].buffer(), Some(buffer(5)));

        let rw = table.read_writes().next().unwrap();
        assert_eq!(rw.kind(), ResourceKind::Buffer);
        assert_eq!(table.samplers().next().unwrap().sampler(), sampler(7));
    }

    #[test]
    fn test_categories_may_be_skipped() {
        let counts = BindTableCounts {
            samplers: 1,
            ..BindTableCounts::default()
        };
        let mut aux = vec![0u8; BindTableLayout::required_bytes(counts)];
        let mut filler = BindTableFiller::new(&mut aux, counts);
        filler.add_sampler(sampler(1), 3, ShaderStages::FRAGMENT);
        filler.validate();

        let table = BindTable::parse(&aux).unwrap();
        assert_eq!(table.vertex_buffers().len(), 0);
        assert_eq!(table.samplers().next().unwrap().slot(), 3);
    }

    #[test]
    #[should_panic(expected = "bind table underfilled: 0 of 1 sampler bindings written")]
    fn test_underfilled_table_panics_at_validate() {
        let counts = BindTableCounts {
            vertex_buffers: 1,
            samplers: 1,
            ..BindTableCounts::default()
        };
        let mut aux = vec![0u8; BindTableLayout::required_bytes(counts)];
        let mut filler = BindTableFiller::new(&mut aux, counts);
        filler.add_vb(buffer(1), 0, 0, 32);
        filler.validate();
    }

    #[test]
    fn test_try_validate_reports_short_category() {
        let counts = full_counts();
        let mut aux = vec![0u8; BindTableLayout::required_bytes(counts)];
        let mut filler = BindTableFiller::new(&mut aux, counts);
        filler.add_vb(buffer(1), 0, 0, 32);

        assert_eq!(
            filler.try_validate(),
            Err(BindTableError::Underfilled {
                category: BindingCategory::VertexBuffer,
                declared: 2,
                filled: 1,
            })
        );
        assert_eq!(BindTable::parse(&aux).unwrap_err(), BindTableError::NotValidated);
    }

    #[test]
    #[should_panic(expected = "bind table overflow")]
    fn test_extra_vertex_buffer_panics() {
        let counts = BindTableCounts {
            vertex_buffers: 1,
            ..BindTableCounts::default()
        };
        let mut aux = vec![0u8; BindTableLayout::required_bytes(counts)];
        let mut filler = BindTableFiller::new(&mut aux, counts);
        filler.add_vb(buffer(1), 0, 0, 32).add_vb(buffer(2), 1, 0, 32);
    }

    #[test]
    #[should_panic(expected = "must be written in order")]
    fn test_out_of_order_write_panics() {
        let counts = full_counts();
        let mut aux = vec![0u8; BindTableLayout::required_bytes(counts)];
        let mut filler = BindTableFiller::new(&mut aux, counts);
        filler.add_sampler(sampler(1), 0, ShaderStages::ALL);
        filler.add_vb(buffer(1), 0, 0, 32);
    }

    #[test]
    #[should_panic(expected = "cannot hold a bind table")]
    fn test_short_aux_panics() {
        let mut aux = vec![0u8; HEADER_SIZE];
        let _ = BindTableFiller::new(&mut aux, full_counts());
    }

    #[test]
    fn test_truncated_table_is_rejected() {
        assert_eq!(
            BindTable::parse(&[0u8; 4]).unwrap_err(),
            BindTableError::Truncated {
                needed: HEADER_SIZE,
                available: 4
            }
        );

        let counts = BindTableCounts {
            samplers: 1,
            ..BindTableCounts::default()
        };
        let mut aux = vec![0u8; BindTableLayout::required_bytes(counts)];
        let mut filler = BindTableFiller::new(&mut aux, counts);
        filler.add_sampler(sampler(1), 0, ShaderStages::ALL);
        filler.validate();

        let cut = &aux[..aux.len() - 1];
        assert!(matches!(
            BindTable::parse(cut),
            Err(BindTableError::Truncated { .. })
        ));
    }

    #[test]
    fn test_parse_works_at_odd_offsets() {
        let counts = BindTableCounts {
            vertex_buffers: 1,
            ..BindTableCounts::default()
        };
        let mut aux = vec![0u8; BindTableLayout::required_bytes(counts) + 1];
        let mut filler = BindTableFiller::new(&mut aux[1..], counts);
        filler.add_vb(buffer(9), 2, 4, 12);
        filler.validate();

        let table = BindTable::parse(&aux[1..]).unwrap();
        assert_eq!(table.vertex_buffers().next().unwrap().buffer(), buffer(9));
    }
}
