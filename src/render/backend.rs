//! The rendering capability the scene components draw through
//!
//! Components never talk to a GPU API directly. They allocate buffers and
//! targets through [`RenderBackend`], upload row bytes into them and describe
//! each frame as a list of [`DrawPass`]es. Two backends implement the trait:
//! [`HeadlessBackend`](super::HeadlessBackend) (CPU, always built) and
//! `gpu::WgpuBackend` (behind the `gpu` feature).

use std::ops::Range;

use bytemuck::Pod;
use thiserror::Error;

use super::types::CameraUniforms;

/// Handle to a buffer owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) usize);

/// Handle to an off-screen render target owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub(crate) usize);

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Per-instance vertex stream
    Instance,
    /// Per-vertex stream
    Vertex,
    /// Uniform block
    Uniform,
}

/// Buffer allocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    pub label: &'static str,
    pub usage: BufferUsage,
    /// Size in bytes, fixed for the buffer's lifetime
    pub size: u64,
}

impl BufferDesc {
    /// Descriptor for `rows` rows of `T`
    pub fn rows<T: Pod>(label: &'static str, usage: BufferUsage, rows: usize) -> Self {
        Self {
            label,
            usage,
            size: (rows * std::mem::size_of::<T>()) as u64,
        }
    }
}

/// Pixel format of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// sRGB colour output for display
    Color,
    /// Linear 8-bit RGBA so encoded pick ids survive readback exactly
    Picking,
}

/// Unit mesh used by a node draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshKind {
    Leaf,
    Hub,
}

/// One draw call inside a render pass.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawPass {
    /// Line list over a position stream and a parallel colour stream
    Edges {
        positions: BufferId,
        colors: BufferId,
        vertices: u32,
    },
    /// Instanced unit meshes
    Nodes {
        mesh: MeshKind,
        transforms: BufferId,
        attributes: BufferId,
        instances: Range<u32>,
    },
    /// Instanced leaf meshes writing their packed pick id as colour
    Picking {
        transforms: BufferId,
        pick_ids: BufferId,
        instances: u32,
    },
    /// Flow-field particle billboards
    Particles {
        particles: BufferId,
        uniforms: BufferId,
        count: u32,
    },
}

/// Errors raised by a [`RenderBackend`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferId),

    #[error("unknown render target {0:?}")]
    UnknownTarget(TargetId),

    #[error("write of {len} bytes at offset {offset} overflows buffer `{label}` ({size} bytes)")]
    WriteOutOfRange {
        label: &'static str,
        offset: u64,
        len: usize,
        size: u64,
    },

    #[error("read of {width}x{height} at ({x}, {y}) outside {target_width}x{target_height} target")]
    ReadOutOfRange {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        target_width: u32,
        target_height: u32,
    },

    #[error("allocation of `{label}` failed: {reason}")]
    Allocation { label: &'static str, reason: String },

    #[error("GPU device unavailable: {0}")]
    Device(String),

    #[error("pixel readback failed: {0}")]
    Readback(String),
}

/// Rendering capability consumed by the scene components.
pub trait RenderBackend {
    /// Allocate a zero-filled buffer
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferId, BackendError>;

    /// Copy `data` into `buffer` starting at byte `offset`
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8])
    -> Result<(), BackendError>;

    /// Allocate an off-screen target of `width` x `height` pixels
    fn create_target(
        &mut self,
        width: u32,
        height: u32,
        kind: TargetKind,
    ) -> Result<TargetId, BackendError>;

    /// Release `target`; its id is never handed out again
    fn destroy_target(&mut self, target: TargetId) -> Result<(), BackendError>;

    /// Clear `target` and run `passes` in order with one set of camera matrices
    fn render_to_target(
        &mut self,
        target: TargetId,
        camera: &CameraUniforms,
        clear: [f32; 4],
        passes: &[DrawPass],
    ) -> Result<(), BackendError>;

    /// Read back RGBA8 pixels, row-major, top row first
    fn read_pixels(
        &mut self,
        target: TargetId,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, BackendError>;
}

/// Write `rows` into a buffer of `T` rows, starting at row `first`.
pub fn write_rows<T: Pod>(
    backend: &mut dyn RenderBackend,
    buffer: BufferId,
    first: u32,
    rows: &[T],
) -> Result<(), BackendError> {
    let offset = first as u64 * std::mem::size_of::<T>() as u64;
    backend.write_buffer(buffer, offset, bytemuck::cast_slice(rows))
}
