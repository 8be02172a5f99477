//! The graphics backend seen from the command layer.

use crate::bind_table::BindTable;
use crate::commands::{CopyBuffer, DispatchCompute, Draw, DrawIndexed};
use crate::resources::{BufferHandle, PipelineHandle};

/// Receives replayed commands during a bucket flush.
///
/// Implemented by the surrounding renderer on top of a native graphics API.
/// Every call happens on the thread that flushes the bucket, in sorted order.
/// Handles are passed through as recorded; resolving them to native objects
/// (usually via [`ResourceRegistry`](crate::ResourceRegistry)) is up to the
/// implementation.
pub trait RenderBackend {
    /// Binds `pipeline` and the resources in `table`.
    fn bind_resources(&mut self, pipeline: PipelineHandle, table: &BindTable<'_>);

    /// Issues a non-indexed draw.
    fn draw(&mut self, draw: &Draw);

    /// Issues an indexed draw.
    fn draw_indexed(&mut self, draw: &DrawIndexed);

    /// Issues a compute dispatch.
    fn dispatch_compute(&mut self, dispatch: &DispatchCompute);

    /// Copies between two buffers.
    fn copy_buffer(&mut self, copy: &CopyBuffer);

    /// Writes `data` into `buffer` at `offset`.
    fn update_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);
}
