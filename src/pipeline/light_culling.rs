//! Light culling compute pass for Forward+
//!
//! The screen is split into square tiles. For each tile the compute shader
//! writes the indices of the lights that can affect it into a fixed-size
//! slot of the tile buffer:
//!
//! ```text
//! tile buffer: [tile 0: max_lights_per_tile u32][tile 1: ...]...
//!              each slot is terminated by TILE_LIST_END when not full
//! ```
//!
//! The tile buffer depends on the output resolution. After a resize it is
//! reallocated and rebound to every pipeline registered as a consumer. If the
//! driver cannot allocate it, the pass switches to [`CullingMode::Disabled`]
//! and the frame uniforms advertise a tile size of 0, which shaders treat as
//! "every light affects every tile".

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::Result;

/// Default tile edge in pixels
pub const DEFAULT_TILE_SIZE: u32 = 32;

/// Default per-tile light list length
pub const DEFAULT_MAX_LIGHTS_PER_TILE: u32 = 64;

/// Marks the end of a tile's light list
pub const TILE_LIST_END: u32 = u32::MAX;

/// Binding slots of the culling pipeline
pub const FRAME_UNIFORMS_BINDING: u32 = 0;
pub const LIGHTS_BINDING: u32 = 1;
pub const TILE_LIGHTS_BINDING: u32 = 2;

/// Whether per-tile light lists are produced this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullingMode {
    #[default]
    Tiled,
    /// No tile buffer; every light is applied to every tile
    Disabled,
}

/// Light culling compute pass
#[derive(Debug)]
pub struct LightCullingPass {
    tile_size: u32,
    max_lights_per_tile: u32,
    pipeline: Option<PipelineHandle>,
    tile_buffer: Option<BufferHandle>,
    tile_buffer_size: u64,
    tile_count: (u32, u32),
    /// Pipelines reading the tile buffer, with their binding slot
    consumers: Vec<(PipelineHandle, u32)>,
    mode: CullingMode,
}

impl LightCullingPass {
    pub fn new(tile_size: u32, max_lights_per_tile: u32) -> Self {
        Self {
            tile_size,
            max_lights_per_tile,
            pipeline: None,
            tile_buffer: None,
            tile_buffer_size: 0,
            tile_count: (0, 0),
            consumers: Vec::new(),
            mode: CullingMode::Disabled,
        }
    }

    pub fn tile_count(screen_width: u32, screen_height: u32, tile_size: u32) -> (u32, u32) {
        let tiles_x = screen_width.div_ceil(tile_size);
        let tiles_y = screen_height.div_ceil(tile_size);
        (tiles_x, tiles_y)
    }

    /// Bytes needed for the tile light lists of a `tiles` grid
    pub fn tile_buffer_size(tiles: (u32, u32), max_lights_per_tile: u32) -> u64 {
        tiles.0 as u64 * tiles.1 as u64 * max_lights_per_tile as u64 * std::mem::size_of::<u32>() as u64
    }

    /// Create the compute pipeline and the tile buffer for the initial size.
    ///
    /// Pipeline creation failure is returned to the caller; tile buffer
    /// failure only degrades to [`CullingMode::Disabled`].
    pub fn initialize(&mut self, driver: &mut dyn VideoDriver, width: u32, height: u32) -> Result<()> {
        let pipeline = driver.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("Light Culling".into()),
            shader: self.shader_source(),
            entry_point: "main".into(),
        })?;
        self.pipeline = Some(pipeline);
        self.consumers.push((pipeline, TILE_LIGHTS_BINDING));
        self.resize(driver, width, height);
        Ok(())
    }

    /// Shader source matching this pass's tile list stride
    pub fn shader_source(&self) -> String {
        light_culling_shader(self.max_lights_per_tile)
    }

    /// Register a pipeline that reads the tile buffer at `binding`.
    ///
    /// It is bound immediately if the buffer exists and rebound after every
    /// reallocation.
    pub fn register_consumer(&mut self, driver: &mut dyn VideoDriver, pipeline: PipelineHandle, binding: u32) {
        self.consumers.push((pipeline, binding));
        if let Some(buffer) = self.tile_buffer {
            driver.bind_buffer(pipeline, binding, buffer, BufferRange::whole(self.tile_buffer_size));
        }
    }

    /// Reallocate the tile buffer if the tile grid changed.
    pub fn resize(&mut self, driver: &mut dyn VideoDriver, width: u32, height: u32) -> CullingMode {
        let tiles = Self::tile_count(width, height, self.tile_size);
        if tiles == self.tile_count && self.tile_buffer.is_some() {
            return self.mode;
        }

        if let Some(old) = self.tile_buffer.take() {
            driver.destroy_buffer(old);
        }
        self.tile_count = tiles;

        let size = Self::tile_buffer_size(tiles, self.max_lights_per_tile);
        let desc = BufferDescriptor::new(size, BufferUsage::STORAGE).with_label("Tile Light Buffer");
        match driver.create_buffer(&desc) {
            Ok(buffer) => {
                for &(pipeline, binding) in &self.consumers {
                    driver.bind_buffer(pipeline, binding, buffer, BufferRange::whole(size));
                }
                self.tile_buffer = Some(buffer);
                self.tile_buffer_size = size;
                self.mode = CullingMode::Tiled;
                log::info!(
                    "Light culling: {}x{} tiles of {} px, {} bytes",
                    tiles.0,
                    tiles.1,
                    self.tile_size,
                    size
                );
            }
            Err(err) => {
                log::warn!("Light culling disabled, tile buffer allocation failed: {err}");
                self.tile_buffer_size = 0;
                self.mode = CullingMode::Disabled;
            }
        }
        self.mode
    }

    /// Bind this frame's uniforms and light table to the culling pipeline.
    pub fn bind_frame(
        &self,
        driver: &mut dyn VideoDriver,
        uniforms: BufferHandle,
        uniforms_size: u64,
        lights: BufferHandle,
        lights_size: u64,
    ) {
        let Some(pipeline) = self.pipeline else {
            return;
        };
        driver.bind_buffer(pipeline, FRAME_UNIFORMS_BINDING, uniforms, BufferRange::whole(uniforms_size));
        driver.bind_buffer(pipeline, LIGHTS_BINDING, lights, BufferRange::whole(lights_size));
    }

    /// Dispatch one workgroup per tile. Returns `false` when culling is disabled.
    pub fn dispatch(&self, driver: &mut dyn VideoDriver) -> bool {
        match (self.mode, self.pipeline) {
            (CullingMode::Tiled, Some(pipeline)) => {
                driver.dispatch_compute(pipeline, self.tile_count.0, self.tile_count.1, 1);
                true
            }
            _ => false,
        }
    }

    pub fn mode(&self) -> CullingMode {
        self.mode
    }

    pub fn tiles(&self) -> (u32, u32) {
        self.tile_count
    }

    /// Tile size advertised to shaders; 0 when culling is disabled
    pub fn uniform_tile_size(&self) -> u32 {
        match self.mode {
            CullingMode::Tiled => self.tile_size,
            CullingMode::Disabled => 0,
        }
    }

    pub fn tile_buffer(&self) -> Option<BufferHandle> {
        self.tile_buffer
    }

    pub fn destroy(&mut self, driver: &mut dyn VideoDriver) {
        if let Some(buffer) = self.tile_buffer.take() {
            driver.destroy_buffer(buffer);
        }
        self.consumers.clear();
        self.pipeline = None;
        self.mode = CullingMode::Disabled;
    }
}

/// WGSL source of the culling pipeline for a per-tile list of
/// `max_lights_per_tile` entries. The list stride must match the one used to
/// size the tile buffer.
pub fn light_culling_shader(max_lights_per_tile: u32) -> String {
    LIGHT_CULLING_SHADER_TEMPLATE.replace("{MAX_LIGHTS_PER_TILE}", &max_lights_per_tile.to_string())
}

const LIGHT_CULLING_SHADER_TEMPLATE: &str = r#"
struct FrameUniforms {
    proj_view: mat4x4<f32>,
    shadow_proj_view: array<mat4x4<f32>, 8>,
    frustum_corners: array<vec4<f32>, 6>,
    view_position: vec4<f32>,
    screen_size: vec2<u32>,
    tile_count: vec2<u32>,
    tile_size: u32,
    light_count: u32,
    shadow_count: u32,
    _padding: u32,
}

struct Light {
    position: vec4<f32>,
    direction: vec4<f32>,
    color_intensity: vec4<f32>,
    params: vec4<f32>,
    shadow_views: vec4<i32>,
    kind: vec4<u32>,
}

const MAX_LIGHTS_PER_TILE: u32 = {MAX_LIGHTS_PER_TILE}u;
const TILE_LIST_END: u32 = 0xffffffffu;
const LIGHT_AMBIENT: u32 = 0u;
const LIGHT_DIRECTIONAL: u32 = 1u;

@group(0) @binding(0) var<uniform> frame: FrameUniforms;
@group(0) @binding(1) var<storage, read> lights: array<Light>;
@group(0) @binding(2) var<storage, read_write> tile_lights: array<u32>;

var<workgroup> visible_count: atomic<u32>;
var<workgroup> visible_indices: array<u32, {MAX_LIGHTS_PER_TILE}>;

// Screen-space circle of a light sphere, xy = center in pixels, z = radius in pixels.
// Returns z < 0 when the camera is inside the sphere.
fn light_footprint(center: vec3<f32>, radius: f32) -> vec3<f32> {
    let clip = frame.proj_view * vec4<f32>(center, 1.0);
    if clip.w <= radius {
        return vec3<f32>(0.0, 0.0, -1.0);
    }
    let ndc = clip.xy / clip.w;
    let screen = vec2<f32>(frame.screen_size);
    let pixel = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5) * screen;
    return vec3<f32>(pixel, radius / clip.w * screen.y);
}

fn affects_tile(light: Light, tile_min: vec2<f32>, tile_max: vec2<f32>) -> bool {
    let kind = light.kind.x;
    if kind == LIGHT_AMBIENT || kind == LIGHT_DIRECTIONAL {
        return true;
    }
    let footprint = light_footprint(light.position.xyz, light.position.w);
    if footprint.z < 0.0 {
        return true;
    }
    let closest = clamp(footprint.xy, tile_min, tile_max);
    let offset = footprint.xy - closest;
    return dot(offset, offset) <= footprint.z * footprint.z;
}

@compute @workgroup_size(16, 16, 1)
fn main(
    @builtin(local_invocation_id) local_id: vec3<u32>,
    @builtin(workgroup_id) workgroup_id: vec3<u32>,
) {
    let tile_id = workgroup_id.x + workgroup_id.y * frame.tile_count.x;
    let local_idx = local_id.x + local_id.y * 16u;

    if local_idx == 0u {
        atomicStore(&visible_count, 0u);
    }
    workgroupBarrier();

    let tile_min = vec2<f32>(workgroup_id.xy * frame.tile_size);
    let tile_max = tile_min + vec2<f32>(f32(frame.tile_size));

    for (var i = local_idx; i < frame.light_count; i = i + 256u) {
        if affects_tile(lights[i], tile_min, tile_max) {
            let slot = atomicAdd(&visible_count, 1u);
            if slot < MAX_LIGHTS_PER_TILE {
                visible_indices[slot] = i;
            }
        }
    }
    workgroupBarrier();

    if local_idx == 0u {
        let count = min(atomicLoad(&visible_count), MAX_LIGHTS_PER_TILE);
        let base = tile_id * MAX_LIGHTS_PER_TILE;
        for (var i = 0u; i < count; i = i + 1u) {
            tile_lights[base + i] = visible_indices[i];
        }
        if count < MAX_LIGHTS_PER_TILE {
            tile_lights[base + count] = TILE_LIST_END;
        }
    }
}
"#;
