//! Frame Pipeline - multi-buffered frame production for a Forward+ renderer
//!
//! The pipeline turns a scene graph of instances, materials and lights into
//! GPU-ready tables and per-view draw lists while the GPU consumes an earlier
//! frame.
//!
//! # Features
//! - Ring of frames with bounded, non-blocking look-ahead ([`FramePool`])
//! - Multi-view culling with one bounding-sphere test per view and bitmask
//!   list assignment (main camera plus shadow views)
//! - Shadow caster ranking and cascaded shadow cameras for directional lights
//! - Uniform tables padded to the driver's runtime alignment
//! - Tiled light culling with an explicit fallback when the tile buffer
//!   cannot be allocated
//! - Backend independent: everything goes through the [`VideoDriver`] trait
//!
//! # Frame loop
//!
//! ```ignore
//! let mut renderer = FrameRenderer::new(&mut driver, &config)?;
//! let mut pool = renderer.create_pool()?;
//! let builder = FrameBuilder::new(&config);
//!
//! loop {
//!     // Producer: skipped when every slot is still waiting for the GPU
//!     builder.produce(&mut pool, &scene, &camera);
//!     // Consumer: upload, cull, draw and present what was published
//!     renderer.render_pending(&mut driver, &mut pool)?;
//! }
//! ```

pub mod backend;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod scene;
pub mod shadow;

pub use backend::{DriverError, VideoDriver};
#[cfg(feature = "recording")]
pub use backend::RecordingDriver;
pub use error::{RendererError, Result};
pub use frame::{Frame, FramePool, FrameState, FrameStats};
pub use pipeline::{CullingMode, FrameBuilder, FrameRenderer, LightCullingPass, Overlay};
pub use shadow::CascadeSplits;

use frame::MAX_VIEW_BITS;
use shadow::MAX_CASCADES;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration for the frame pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Number of frame slots (K)
    pub frames_in_flight: usize,
    pub max_instances: u32,
    pub max_materials: u32,
    pub max_lights: u32,
    /// Main view plus shadow views; bounded by the view bitmask width
    pub max_views: usize,
    /// Edge of each shadow depth map
    pub shadow_map_size: u32,
    /// Tile size for Forward+ light culling (in pixels)
    pub tile_size: u32,
    pub max_lights_per_tile: u32,
    /// Cascades per directional light
    pub cascade_count: usize,
    pub cascade_splits: CascadeSplits,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frames_in_flight: 3,
            max_instances: 4096,
            max_materials: 1024,
            max_lights: 256,
            max_views: 9,
            shadow_map_size: 2048,
            tile_size: pipeline::DEFAULT_TILE_SIZE,
            max_lights_per_tile: pipeline::DEFAULT_MAX_LIGHTS_PER_TILE,
            cascade_count: MAX_CASCADES,
            cascade_splits: CascadeSplits::default(),
        }
    }
}

impl RendererConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(RendererError::InvalidConfig(msg));

        if self.frames_in_flight < 2 {
            return invalid(format!(
                "frames_in_flight must be at least 2, got {}",
                self.frames_in_flight
            ));
        }
        if self.max_views == 0 || self.max_views > MAX_VIEW_BITS {
            return invalid(format!(
                "max_views must be in 1..={MAX_VIEW_BITS}, got {}",
                self.max_views
            ));
        }
        if self.max_instances == 0 || self.max_materials == 0 || self.max_lights == 0 {
            return invalid("table capacities must be non-zero".to_string());
        }
        if self.width == 0 || self.height == 0 {
            return invalid(format!("zero sized output {}x{}", self.width, self.height));
        }
        if self.tile_size == 0 || self.max_lights_per_tile == 0 {
            return invalid("tile_size and max_lights_per_tile must be non-zero".to_string());
        }
        if self.shadow_map_size == 0 {
            return invalid("shadow_map_size must be non-zero".to_string());
        }
        if !(1..=MAX_CASCADES).contains(&self.cascade_count) {
            return invalid(format!(
                "cascade_count must be in 1..={MAX_CASCADES}, got {}",
                self.cascade_count
            ));
        }
        self.cascade_splits.validate()
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    pub fn with_max_instances(mut self, max: u32) -> Self {
        self.max_instances = max;
        self
    }

    pub fn with_max_materials(mut self, max: u32) -> Self {
        self.max_materials = max;
        self
    }

    pub fn with_max_lights(mut self, max: u32) -> Self {
        self.max_lights = max;
        self
    }

    pub fn with_max_views(mut self, max: usize) -> Self {
        self.max_views = max;
        self
    }

    pub fn with_shadow_map_size(mut self, size: u32) -> Self {
        self.shadow_map_size = size;
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_cascades(mut self, count: usize, splits: CascadeSplits) -> Self {
        self.cascade_count = count;
        self.cascade_splits = splits;
        self
    }
}

/// Install an `env_logger` backend if none is set yet.
///
/// Intended for binaries and tests; libraries embedding the pipeline
/// should configure logging themselves.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}

static_assertions::assert_impl_all!(RendererConfig: Send, Sync);
static_assertions::assert_impl_all!(Frame: Send, Sync);
static_assertions::assert_impl_all!(FramePool: Send, Sync);
static_assertions::assert_impl_all!(FrameRenderer: Send);
