//! Core Video Driver abstraction.
//!
//! The frame pipeline never talks to a graphics API directly. Everything it
//! needs from the GPU side goes through [`VideoDriver`]: buffer and texture
//! lifetime, uploads, resource binding, compute dispatch, draws and present.

use crate::backend::types::*;
use thiserror::Error;

/// Video Driver error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("Buffer write out of range: {0}")]
    WriteOutOfRange(String),
    #[error("Unknown resource handle: {0}")]
    InvalidHandle(String),
    #[error("Failed to present: {0}")]
    PresentFailed(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a GPU texture (render target or depth map)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a compute or render pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub(crate) u64);

impl BufferHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl TextureHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl PipelineHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Operations the frame pipeline consumes from the graphics API.
///
/// The trait is object safe so the renderer can hold any driver behind
/// `&mut dyn VideoDriver`.
pub trait VideoDriver {
    /// Human readable driver name
    fn name(&self) -> &str;

    /// Minimum offset alignment for individually bound uniform ranges.
    ///
    /// Differs between APIs and devices (commonly 16 or 256 bytes), so padded
    /// tables query it at runtime instead of baking in a constant.
    fn min_uniform_alignment(&self) -> u64;

    // Resource creation

    /// Create a buffer
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> DriverResult<BufferHandle>;

    /// Destroy a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Upload bytes into a buffer at the given offset
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> DriverResult<()>;

    /// Create a texture
    fn create_texture(&mut self, desc: &TextureDescriptor) -> DriverResult<TextureHandle>;

    /// Destroy a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Create a compute pipeline
    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> DriverResult<PipelineHandle>;

    // Binding

    /// Bind a buffer range to a pipeline binding slot
    fn bind_buffer(&mut self, pipeline: PipelineHandle, binding: u32, buffer: BufferHandle, range: BufferRange);

    // Commands

    /// Begin a render pass
    fn begin_pass(&mut self, desc: &PassDescriptor);

    /// End the current render pass
    fn end_pass(&mut self);

    /// Dispatch compute work
    fn dispatch_compute(&mut self, pipeline: PipelineHandle, x: u32, y: u32, z: u32);

    /// Issue one draw call
    fn draw(&mut self, draw: &DrawCommand);

    /// Present the main color target
    fn present(&mut self) -> DriverResult<()>;
}
