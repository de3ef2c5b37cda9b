//! Forward+ frame pipeline
//!
//! Producer and consumer halves of the frame loop:
//! 1. [`FrameBuilder`] - fills a frame from the scene (views, lights,
//!    materials, instance lists)
//! 2. [`FrameRenderer`] - uploads a finalized frame, then records the shadow
//!    views, the light culling dispatch and the main view
//! 3. [`LightCullingPass`] - compute pass binning lights into screen tiles

pub mod builder;
pub mod light_culling;
pub mod renderer;

pub use builder::FrameBuilder;
pub use light_culling::{
    light_culling_shader, CullingMode, LightCullingPass, DEFAULT_MAX_LIGHTS_PER_TILE, DEFAULT_TILE_SIZE,
    TILE_LIST_END,
};
pub use renderer::{FrameRenderer, Overlay};
