//! Descriptors and command types shared by all Video Drivers

use bitflags::bitflags;
use glam::Vec4;

use super::traits::{BufferHandle, TextureHandle};

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be bound as a uniform buffer.
        const UNIFORM = 1 << 0;
        /// Buffer can be bound as a storage buffer.
        const STORAGE = 1 << 1;
        /// Buffer can be copied to.
        const COPY_DST = 1 << 2;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 3;
    }
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be sampled in shaders.
        const TEXTURE_BINDING = 1 << 0;
        /// Texture can be used as a render attachment.
        const RENDER_ATTACHMENT = 1 << 1;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8UnormSrgb,
    Rgba16Float,
    Depth32Float,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8UnormSrgb | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float => 8,
        }
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Texture descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Render attachment that can also be sampled (shadow maps, scene color).
    pub fn render_target(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: Some(label.into()),
            width,
            height,
            format,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        }
    }
}

/// Compute pipeline descriptor
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor {
    pub label: Option<String>,
    pub shader: String,
    pub entry_point: String,
}

/// A byte range inside a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRange {
    pub offset: u64,
    pub size: u64,
}

impl BufferRange {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Range covering `size` bytes from the start of the buffer
    pub fn whole(size: u64) -> Self {
        Self { offset: 0, size }
    }
}

/// How an attachment is initialised at the start of a pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<T> {
    Clear(T),
    Load,
}

/// Render pass descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct PassDescriptor {
    pub label: Option<String>,
    pub color: Option<(TextureHandle, LoadOp<Vec4>)>,
    pub depth: Option<(TextureHandle, LoadOp<f32>)>,
}

impl PassDescriptor {
    /// Depth-only pass that clears to the far plane (shadow views)
    pub fn depth_only(label: impl Into<String>, depth: TextureHandle) -> Self {
        Self {
            label: Some(label.into()),
            color: None,
            depth: Some((depth, LoadOp::Clear(1.0))),
        }
    }

    /// Color + depth pass clearing both attachments (main view)
    pub fn color_depth(
        label: impl Into<String>,
        color: TextureHandle,
        clear_color: Vec4,
        depth: TextureHandle,
    ) -> Self {
        Self {
            label: Some(label.into()),
            color: Some((color, LoadOp::Clear(clear_color))),
            depth: Some((depth, LoadOp::Clear(1.0))),
        }
    }
}

/// Identifies a mesh primitive owned by the asset layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u32);

/// One draw call: a mesh primitive, with its instance and material blocks
/// addressed through padded byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCommand {
    pub mesh: MeshHandle,
    pub view: u32,
    pub instance_buffer: BufferHandle,
    pub instance_offset: u64,
    pub material_buffer: BufferHandle,
    pub material_offset: u64,
    pub vertex_count: u32,
}
