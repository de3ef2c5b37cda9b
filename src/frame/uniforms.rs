//! Uniform block layouts shared with the shaders.
//!
//! Field order and padding below are part of the shader interface. The
//! `const_assert_eq!` checks pin every offset so a reordering fails to build
//! instead of silently corrupting GPU reads.
//!
//! ```wgsl
//! struct FrameUniforms {
//!     proj_view: mat4x4<f32>,                      //   0
//!     shadow_proj_view: array<mat4x4<f32>, 8>,     //  64
//!     frustum_corners: array<vec4<f32>, 6>,        // 576
//!     view_position: vec4<f32>,                    // 672
//!     screen_size: vec2<u32>,                      // 688
//!     tile_count: vec2<u32>,                       // 696
//!     tile_size: u32,                              // 704
//!     light_count: u32,                            // 708
//!     shadow_count: u32,                           // 712
//!     _padding: u32,                               // 716
//! }                                                // 720
//! ```

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use static_assertions::const_assert_eq;
use std::mem::{offset_of, size_of};

use crate::scene::Camera;

/// Shadow projection-view matrices carried by [`FrameUniforms`].
pub const MAX_SHADOWS: usize = 8;

/// Per-frame uniform block read by every shader stage
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Main view projection-view matrix
    pub proj_view: Mat4,
    /// Shadow view matrices in shadow-view order; unused entries are identity
    pub shadow_proj_view: [Mat4; MAX_SHADOWS],
    /// Main view frustum corners: near TL, TR, BL then far TL, TR, BL (w = 1)
    pub frustum_corners: [Vec4; 6],
    /// xyz = main view position, w = 1
    pub view_position: Vec4,
    pub screen_size: [u32; 2],
    pub tile_count: [u32; 2],
    /// Tile edge in pixels; 0 means culling is disabled and every tile sees every light
    pub tile_size: u32,
    pub light_count: u32,
    pub shadow_count: u32,
    pub _padding: u32,
}

const_assert_eq!(size_of::<FrameUniforms>(), 720);
const_assert_eq!(offset_of!(FrameUniforms, proj_view), 0);
const_assert_eq!(offset_of!(FrameUniforms, shadow_proj_view), 64);
const_assert_eq!(offset_of!(FrameUniforms, frustum_corners), 576);
const_assert_eq!(offset_of!(FrameUniforms, view_position), 672);
const_assert_eq!(offset_of!(FrameUniforms, screen_size), 688);
const_assert_eq!(offset_of!(FrameUniforms, tile_count), 696);
const_assert_eq!(offset_of!(FrameUniforms, tile_size), 704);
const_assert_eq!(offset_of!(FrameUniforms, light_count), 708);
const_assert_eq!(offset_of!(FrameUniforms, shadow_count), 712);

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            proj_view: Mat4::IDENTITY,
            shadow_proj_view: [Mat4::IDENTITY; MAX_SHADOWS],
            frustum_corners: [Vec4::W; 6],
            view_position: Vec4::W,
            screen_size: [0; 2],
            tile_count: [0; 2],
            tile_size: 0,
            light_count: 0,
            shadow_count: 0,
            _padding: 0,
        }
    }
}

/// Per-view uniform block, one padded element per view
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ViewUniforms {
    pub proj_view: Mat4,
    /// xyz = view position, w = 1
    pub view_position: Vec4,
    pub frustum_corners: [Vec4; 6],
    pub view_id: u32,
    /// Camera flags bits (ortho, point, shadow caster)
    pub flags: u32,
    pub opaque_count: u32,
    pub transparent_count: u32,
    /// Entries of the frame's light table visible to this view's shading
    pub light_count: u32,
    pub _padding: [u32; 3],
}

const_assert_eq!(size_of::<ViewUniforms>(), 208);
const_assert_eq!(offset_of!(ViewUniforms, view_position), 64);
const_assert_eq!(offset_of!(ViewUniforms, frustum_corners), 80);
const_assert_eq!(offset_of!(ViewUniforms, view_id), 176);
const_assert_eq!(offset_of!(ViewUniforms, light_count), 192);

impl ViewUniforms {
    /// Snapshot the camera's matrices and frustum corners.
    pub fn from_camera(camera: &Camera) -> Self {
        let corners = camera.frustum().corners;
        Self {
            proj_view: camera.view_projection_matrix(),
            view_position: camera.position().extend(1.0),
            frustum_corners: corners.map(|c| c.extend(1.0)),
            view_id: camera.view_id(),
            flags: camera.flags().bits(),
            opaque_count: 0,
            transparent_count: 0,
            light_count: 0,
            _padding: [0; 3],
        }
    }
}
