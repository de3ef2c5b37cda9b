//! Recording Video Driver for testing and headless runs.
//!
//! This driver doesn't talk to a GPU. It hands out handles, keeps the
//! contents of every buffer in memory and appends each command to a
//! [`CommandLog`] that can be inspected while the driver is borrowed by the
//! renderer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::traits::*;
use super::types::*;

/// A single command observed by the [`RecordingDriver`].
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCommand {
    CreateBuffer { buffer: BufferHandle, size: u64, label: Option<String> },
    DestroyBuffer(BufferHandle),
    WriteBuffer { buffer: BufferHandle, offset: u64, len: u64 },
    CreateTexture { texture: TextureHandle, width: u32, height: u32, format: TextureFormat },
    DestroyTexture(TextureHandle),
    CreatePipeline { pipeline: PipelineHandle, label: Option<String> },
    BindBuffer { pipeline: PipelineHandle, binding: u32, buffer: BufferHandle, range: BufferRange },
    BeginPass(PassDescriptor),
    EndPass,
    Dispatch { pipeline: PipelineHandle, x: u32, y: u32, z: u32 },
    Draw(DrawCommand),
    Present,
}

/// Shared, cloneable view of the commands recorded so far.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    commands: Arc<Mutex<Vec<DriverCommand>>>,
}

impl CommandLog {
    fn push(&self, command: DriverCommand) {
        self.commands.lock().push(command);
    }

    /// Snapshot of every recorded command, oldest first.
    pub fn commands(&self) -> Vec<DriverCommand> {
        self.commands.lock().clone()
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    /// Returns true when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.commands.lock().clear();
    }

    /// Count the commands matching a predicate.
    pub fn count(&self, predicate: impl Fn(&DriverCommand) -> bool) -> usize {
        self.commands.lock().iter().filter(|&c| predicate(c)).count()
    }
}

/// In-memory Video Driver.
#[derive(Debug)]
pub struct RecordingDriver {
    next_id: u64,
    uniform_alignment: u64,
    max_buffer_size: Option<u64>,
    buffers: HashMap<u64, Vec<u8>>,
    textures: HashMap<u64, TextureDescriptor>,
    log: CommandLog,
}

impl Default for RecordingDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDriver {
    /// Default uniform offset alignment, the common desktop value.
    pub const DEFAULT_UNIFORM_ALIGNMENT: u64 = 256;

    /// Create a new recording driver.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            uniform_alignment: Self::DEFAULT_UNIFORM_ALIGNMENT,
            max_buffer_size: None,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            log: CommandLog::default(),
        }
    }

    /// Report a different minimum uniform alignment.
    pub fn with_uniform_alignment(mut self, alignment: u64) -> Self {
        self.uniform_alignment = alignment;
        self
    }

    /// Fail every buffer allocation larger than `size` bytes.
    pub fn with_max_buffer_size(mut self, size: u64) -> Self {
        self.max_buffer_size = Some(size);
        self
    }

    /// Change the allocation limit after construction (simulates memory pressure).
    pub fn set_max_buffer_size(&mut self, size: Option<u64>) {
        self.max_buffer_size = size;
    }

    /// Handle to the command log.
    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Current contents of a live buffer.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(Vec::as_slice)
    }

    /// Descriptor of a live texture.
    pub fn texture(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    /// Number of buffers that have been created and not destroyed.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Number of textures that have been created and not destroyed.
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl VideoDriver for RecordingDriver {
    fn name(&self) -> &str {
        "Recording"
    }

    fn min_uniform_alignment(&self) -> u64 {
        self.uniform_alignment
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> DriverResult<BufferHandle> {
        if let Some(limit) = self.max_buffer_size {
            if desc.size > limit {
                return Err(DriverError::BufferCreationFailed(format!(
                    "{:?}: {} bytes exceeds limit of {} bytes",
                    desc.label, desc.size, limit
                )));
            }
        }

        let buffer = BufferHandle(self.allocate_id());
        log::trace!(
            "RecordingDriver: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );
        self.buffers.insert(buffer.0, vec![0; desc.size as usize]);
        self.log.push(DriverCommand::CreateBuffer {
            buffer,
            size: desc.size,
            label: desc.label.clone(),
        });
        Ok(buffer)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        log::trace!("RecordingDriver: destroying buffer {}", buffer.0);
        self.buffers.remove(&buffer.0);
        self.log.push(DriverCommand::DestroyBuffer(buffer));
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> DriverResult<()> {
        let contents = self
            .buffers
            .get_mut(&buffer.0)
            .ok_or_else(|| DriverError::InvalidHandle(format!("buffer {}", buffer.0)))?;

        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            return Err(DriverError::WriteOutOfRange(format!(
                "buffer {}: write {}..{} past size {}",
                buffer.0,
                start,
                end,
                contents.len()
            )));
        }

        contents[start..end].copy_from_slice(data);
        self.log.push(DriverCommand::WriteBuffer {
            buffer,
            offset,
            len: data.len() as u64,
        });
        Ok(())
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> DriverResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(DriverError::TextureCreationFailed(format!(
                "{:?}: zero sized texture {}x{}",
                desc.label, desc.width, desc.height
            )));
        }

        let texture = TextureHandle(self.allocate_id());
        log::trace!(
            "RecordingDriver: creating texture {:?} ({}x{} {:?})",
            desc.label,
            desc.width,
            desc.height,
            desc.format
        );
        self.textures.insert(texture.0, desc.clone());
        self.log.push(DriverCommand::CreateTexture {
            texture,
            width: desc.width,
            height: desc.height,
            format: desc.format,
        });
        Ok(texture)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        log::trace!("RecordingDriver: destroying texture {}", texture.0);
        self.textures.remove(&texture.0);
        self.log.push(DriverCommand::DestroyTexture(texture));
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> DriverResult<PipelineHandle> {
        if desc.shader.is_empty() {
            return Err(DriverError::PipelineCreationFailed(format!(
                "{:?}: empty shader source",
                desc.label
            )));
        }

        let pipeline = PipelineHandle(self.allocate_id());
        log::trace!("RecordingDriver: creating compute pipeline {:?}", desc.label);
        self.log.push(DriverCommand::CreatePipeline {
            pipeline,
            label: desc.label.clone(),
        });
        Ok(pipeline)
    }

    fn bind_buffer(&mut self, pipeline: PipelineHandle, binding: u32, buffer: BufferHandle, range: BufferRange) {
        self.log.push(DriverCommand::BindBuffer {
            pipeline,
            binding,
            buffer,
            range,
        });
    }

    fn begin_pass(&mut self, desc: &PassDescriptor) {
        self.log.push(DriverCommand::BeginPass(desc.clone()));
    }

    fn end_pass(&mut self) {
        self.log.push(DriverCommand::EndPass);
    }

    fn dispatch_compute(&mut self, pipeline: PipelineHandle, x: u32, y: u32, z: u32) {
        self.log.push(DriverCommand::Dispatch { pipeline, x, y, z });
    }

    fn draw(&mut self, draw: &DrawCommand) {
        self.log.push(DriverCommand::Draw(*draw));
    }

    fn present(&mut self) -> DriverResult<()> {
        self.log.push(DriverCommand::Present);
        Ok(())
    }
}
