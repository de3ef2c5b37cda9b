//! Frame consumption: upload, culling dispatch and per-view draws.

use glam::Vec4;

use super::light_culling::LightCullingPass;
use super::CullingMode;
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{RendererError, Result};
use crate::frame::{padded_stride, BufferWriter, Frame, FramePool, FrameUniforms, View, ViewUniforms, MAX_SHADOWS};
use crate::scene::{GpuLight, GpuMaterial, TransformBlock};
use crate::RendererConfig;

/// Drawn at the end of the main view, after scene geometry (text, UI).
pub trait Overlay: Send {
    fn render(&mut self, driver: &mut dyn VideoDriver, frame: &Frame);
}

/// GPU buffers owned by one frame slot
#[derive(Debug, Clone, Copy)]
struct SlotBuffers {
    instances: BufferHandle,
    materials: BufferHandle,
    lights: BufferHandle,
    lights_size: u64,
    views: BufferHandle,
    uniforms: BufferHandle,
}

/// Consumes finalized frames.
///
/// Each pool slot has its own set of GPU buffers, so uploading frame N+1
/// never touches data the GPU may still read for frame N.
pub struct FrameRenderer {
    alignment: u64,
    config: RendererConfig,
    slots: Vec<SlotBuffers>,
    shadow_maps: Vec<TextureHandle>,
    color_target: TextureHandle,
    depth_target: TextureHandle,
    width: u32,
    height: u32,
    light_culling: LightCullingPass,
    view_uniforms: BufferWriter<ViewUniforms>,
    overlay: Option<Box<dyn Overlay>>,
    clear_color: Vec4,
    frames_rendered: u64,
}

impl std::fmt::Debug for FrameRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRenderer")
            .field("alignment", &self.alignment)
            .field("slots", &self.slots.len())
            .field("size", &(self.width, self.height))
            .field("culling", &self.light_culling.mode())
            .field("frames_rendered", &self.frames_rendered)
            .finish()
    }
}

impl FrameRenderer {
    /// Allocate per-slot buffers, shadow maps, render targets and the light
    /// culling pass.
    pub fn new(driver: &mut dyn VideoDriver, config: &RendererConfig) -> Result<Self> {
        config.validate()?;
        let alignment = driver.min_uniform_alignment();
        if alignment == 0 || !alignment.is_power_of_two() {
            return Err(RendererError::InvalidParameter(format!(
                "{}: uniform alignment must be a power of 2, got {alignment}",
                driver.name()
            )));
        }

        let mut slots = Vec::with_capacity(config.frames_in_flight);
        for slot in 0..config.frames_in_flight {
            slots.push(Self::create_slot_buffers(driver, config, alignment, slot)?);
        }

        let shadow_maps = (0..MAX_SHADOWS)
            .map(|i| {
                driver.create_texture(&TextureDescriptor::render_target(
                    format!("Shadow Map {i}"),
                    config.shadow_map_size,
                    config.shadow_map_size,
                    TextureFormat::Depth32Float,
                ))
            })
            .collect::<DriverResult<Vec<_>>>()?;

        let (color_target, depth_target) = Self::create_targets(driver, config.width, config.height)?;

        let mut light_culling = LightCullingPass::new(config.tile_size, config.max_lights_per_tile);
        light_culling.initialize(driver, config.width, config.height)?;

        log::info!(
            "FrameRenderer: {} on {} slots, {}x{}, uniform alignment {}",
            driver.name(),
            slots.len(),
            config.width,
            config.height,
            alignment
        );

        Ok(Self {
            alignment,
            config: config.clone(),
            slots,
            shadow_maps,
            color_target,
            depth_target,
            width: config.width,
            height: config.height,
            light_culling,
            view_uniforms: BufferWriter::padded("view uniforms", config.max_views as u32, alignment)?,
            overlay: None,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            frames_rendered: 0,
        })
    }

    fn create_slot_buffers(
        driver: &mut dyn VideoDriver,
        config: &RendererConfig,
        alignment: u64,
        slot: usize,
    ) -> Result<SlotBuffers> {
        let uniform = BufferUsage::UNIFORM | BufferUsage::COPY_DST;
        let storage = BufferUsage::STORAGE | BufferUsage::COPY_DST;
        let mut create = |name: &str, size: u64, usage: BufferUsage| {
            driver.create_buffer(&BufferDescriptor::new(size, usage).with_label(format!("{name} [{slot}]")))
        };

        let lights_size = std::mem::size_of::<GpuLight>() as u64 * config.max_lights as u64;
        Ok(SlotBuffers {
            instances: create(
                "Instances",
                padded_stride::<TransformBlock>(alignment) * config.max_instances as u64,
                uniform,
            )?,
            materials: create(
                "Materials",
                padded_stride::<GpuMaterial>(alignment) * config.max_materials as u64,
                uniform,
            )?,
            lights: create("Lights", lights_size, storage)?,
            lights_size,
            views: create(
                "Views",
                padded_stride::<ViewUniforms>(alignment) * config.max_views as u64,
                uniform,
            )?,
            uniforms: create("Frame Uniforms", std::mem::size_of::<FrameUniforms>() as u64, uniform)?,
        })
    }

    fn create_targets(driver: &mut dyn VideoDriver, width: u32, height: u32) -> Result<(TextureHandle, TextureHandle)> {
        let color = driver.create_texture(&TextureDescriptor::render_target(
            "Main Color",
            width,
            height,
            TextureFormat::Rgba16Float,
        ))?;
        let depth = driver.create_texture(&TextureDescriptor::render_target(
            "Main Depth",
            width,
            height,
            TextureFormat::Depth32Float,
        ));
        match depth {
            Ok(depth) => Ok((color, depth)),
            Err(err) => {
                driver.destroy_texture(color);
                Err(err.into())
            }
        }
    }

    /// A frame pool whose tables match this renderer's alignment.
    pub fn create_pool(&self) -> Result<FramePool> {
        FramePool::new(&self.config, self.alignment)
    }

    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn culling_mode(&self) -> CullingMode {
        self.light_culling.mode()
    }

    pub fn light_culling(&self) -> &LightCullingPass {
        &self.light_culling
    }

    /// Register a pipeline that reads the tile light lists.
    pub fn register_tile_consumer(&mut self, driver: &mut dyn VideoDriver, pipeline: PipelineHandle, binding: u32) {
        self.light_culling.register_consumer(driver, pipeline, binding);
    }

    pub fn set_overlay(&mut self, overlay: Box<dyn Overlay>) {
        self.overlay = Some(overlay);
    }

    pub fn set_clear_color(&mut self, color: Vec4) {
        self.clear_color = color;
    }

    pub fn shadow_maps(&self) -> &[TextureHandle] {
        &self.shadow_maps
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Recreate the main render targets and the tile buffer.
    ///
    /// Target creation failure is returned; tile buffer failure switches
    /// light culling off until a later resize succeeds.
    pub fn resize(&mut self, driver: &mut dyn VideoDriver, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(RendererError::InvalidParameter(format!(
                "cannot resize to {width}x{height}"
            )));
        }
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }

        driver.destroy_texture(self.color_target);
        driver.destroy_texture(self.depth_target);
        let (color, depth) = Self::create_targets(driver, width, height)?;
        self.color_target = color;
        self.depth_target = depth;
        self.width = width;
        self.height = height;

        let mode = self.light_culling.resize(driver, width, height);
        log::info!("FrameRenderer: resized to {width}x{height}, culling {mode:?}");
        Ok(())
    }

    /// Upload a finalized frame into its slot's GPU buffers.
    ///
    /// On a driver error the frame is retired before the error is returned,
    /// so the caller can still release it and move on to the next one.
    ///
    /// # Panics
    ///
    /// Panics if the frame is not `Finalized`, including a second apply.
    pub fn apply(&mut self, driver: &mut dyn VideoDriver, frame: &mut Frame) -> Result<()> {
        frame.mark_applied();
        if let Err(err) = self.upload_frame(driver, frame) {
            log::warn!("FrameRenderer: upload of slot {} failed: {err}", frame.slot());
            frame.retire();
            return Err(err);
        }
        Ok(())
    }

    fn upload_frame(&mut self, driver: &mut dyn VideoDriver, frame: &Frame) -> Result<()> {
        let slot = self.slots[frame.slot()];

        upload(driver, slot.instances, frame.instances().as_bytes())?;
        upload(driver, slot.materials, frame.materials().as_bytes())?;
        upload(driver, slot.lights, frame.lights().as_bytes())?;

        self.view_uniforms.reset();
        for view in frame.views().views() {
            self.view_uniforms.write(&ViewUniforms {
                light_count: frame.uniforms().light_count,
                ..view.uniforms()
            });
        }
        upload(driver, slot.views, self.view_uniforms.as_bytes())?;

        let tiles = self.light_culling.tiles();
        let uniforms = FrameUniforms {
            screen_size: [self.width, self.height],
            tile_count: [tiles.0, tiles.1],
            tile_size: self.light_culling.uniform_tile_size(),
            ..*frame.uniforms()
        };
        upload(driver, slot.uniforms, bytemuck::bytes_of(&uniforms))?;
        Ok(())
    }

    /// Record every pass of an applied frame, present, and retire it.
    ///
    /// Shadow views come first in the order they were added, each into its
    /// own depth map. The main view then clears color and depth, dispatches
    /// light culling, draws its list and finally the overlay.
    ///
    /// The frame is retired even when presenting fails.
    ///
    /// # Panics
    ///
    /// Panics if the frame is not `Applied`.
    pub fn render(&mut self, driver: &mut dyn VideoDriver, frame: &mut Frame) -> Result<()> {
        frame.begin_render();
        let slot = self.slots[frame.slot()];

        for (shadow_map, view) in self.shadow_maps.iter().zip(frame.views().shadow_views()) {
            driver.begin_pass(&PassDescriptor::depth_only(format!("Shadow View {}", view.id()), *shadow_map));
            draw_view(driver, frame, view, &slot);
            driver.end_pass();
        }

        if let Some(main) = frame.views().main_view() {
            driver.begin_pass(&PassDescriptor::color_depth(
                "Main View",
                self.color_target,
                self.clear_color,
                self.depth_target,
            ));
            self.light_culling.bind_frame(
                driver,
                slot.uniforms,
                std::mem::size_of::<FrameUniforms>() as u64,
                slot.lights,
                slot.lights_size,
            );
            self.light_culling.dispatch(driver);
            draw_view(driver, frame, main, &slot);
            if let Some(overlay) = self.overlay.as_mut() {
                overlay.render(driver, frame);
            }
            driver.end_pass();
        }

        let presented = driver.present();
        frame.retire();
        presented?;
        self.frames_rendered += 1;
        Ok(())
    }

    /// Apply and render every published frame, oldest first.
    ///
    /// Returns the number of frames rendered. A frame whose upload or present
    /// fails is still released; the error is returned and the frames behind
    /// it stay published for the next call.
    pub fn render_pending(&mut self, driver: &mut dyn VideoDriver, pool: &mut FramePool) -> Result<usize> {
        let mut rendered = 0;
        while let Some(frame) = pool.acquire_frame() {
            let result = match self.apply(driver, frame) {
                Ok(()) => self.render(driver, frame),
                Err(err) => Err(err),
            };
            pool.release_frame();
            result?;
            rendered += 1;
        }
        Ok(rendered)
    }

    /// Release every GPU object owned by the renderer.
    pub fn destroy(mut self, driver: &mut dyn VideoDriver) {
        for slot in self.slots.drain(..) {
            driver.destroy_buffer(slot.instances);
            driver.destroy_buffer(slot.materials);
            driver.destroy_buffer(slot.lights);
            driver.destroy_buffer(slot.views);
            driver.destroy_buffer(slot.uniforms);
        }
        for texture in self.shadow_maps.drain(..) {
            driver.destroy_texture(texture);
        }
        driver.destroy_texture(self.color_target);
        driver.destroy_texture(self.depth_target);
        self.light_culling.destroy(driver);
    }
}

fn upload(driver: &mut dyn VideoDriver, buffer: BufferHandle, bytes: &[u8]) -> Result<()> {
    if !bytes.is_empty() {
        driver.write_buffer(buffer, 0, bytes)?;
    }
    Ok(())
}

/// One draw per primitive; opaque run first, then the transparent run.
fn draw_view(driver: &mut dyn VideoDriver, frame: &Frame, view: &View, slot: &SlotBuffers) {
    for &index in view.list().as_slice() {
        let instance_offset = frame.instances().offset_of(index);
        for primitive in frame.primitives(index) {
            driver.draw(&DrawCommand {
                mesh: primitive.mesh,
                view: view.id(),
                instance_buffer: slot.instances,
                instance_offset,
                material_buffer: slot.materials,
                material_offset: frame.materials().offset_of(primitive.material),
                vertex_count: primitive.vertex_count,
            });
        }
    }
}
