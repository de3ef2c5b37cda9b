//! Light types for the scene

use bytemuck::{Pod, Zeroable};
use glam::{IVec4, UVec4, Vec3, Vec4};

/// Shadow view slot value meaning "no shadow view"
pub const NO_SHADOW_VIEW: i32 = -1;

/// Shadow views a single light can reference (cascades or faces)
pub const MAX_LIGHT_SHADOW_VIEWS: usize = 4;

/// Light variant with the parameters specific to each kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Ambient,
    Directional {
        direction: Vec3,
    },
    Point {
        position: Vec3,
        interior_radius: f32,
        falloff_radius: f32,
    },
    Spot {
        position: Vec3,
        direction: Vec3,
        length: f32,
        /// radians
        half_angle: f32,
    },
}

impl LightKind {
    /// Type tag written to the GPU light table
    pub fn code(&self) -> u32 {
        match self {
            LightKind::Ambient => 0,
            LightKind::Directional { .. } => 1,
            LightKind::Point { .. } => 2,
            LightKind::Spot { .. } => 3,
        }
    }
}

/// A light rebuilt from the scene every frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    pub shadow_views: [i32; MAX_LIGHT_SHADOW_VIEWS],
}

impl Light {
    pub fn new(kind: LightKind, color: Vec3, intensity: f32) -> Self {
        Self {
            kind,
            color,
            intensity,
            shadow_views: [NO_SHADOW_VIEW; MAX_LIGHT_SHADOW_VIEWS],
        }
    }

    pub fn ambient(color: Vec3, intensity: f32) -> Self {
        Self::new(LightKind::Ambient, color, intensity)
    }

    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self::new(
            LightKind::Directional {
                direction: direction.normalize(),
            },
            color,
            intensity,
        )
    }

    pub fn point(position: Vec3, interior_radius: f32, falloff_radius: f32, color: Vec3, intensity: f32) -> Self {
        Self::new(
            LightKind::Point {
                position,
                interior_radius,
                falloff_radius,
            },
            color,
            intensity,
        )
    }

    pub fn spot(position: Vec3, direction: Vec3, length: f32, half_angle: f32, color: Vec3, intensity: f32) -> Self {
        Self::new(
            LightKind::Spot {
                position,
                direction: direction.normalize(),
                length,
                half_angle,
            },
            color,
            intensity,
        )
    }

    /// World position for positional lights
    pub fn position(&self) -> Option<Vec3> {
        match self.kind {
            LightKind::Point { position, .. } | LightKind::Spot { position, .. } => Some(position),
            LightKind::Ambient | LightKind::Directional { .. } => None,
        }
    }

    /// Distance beyond which the light contributes nothing
    pub fn range(&self) -> f32 {
        match self.kind {
            LightKind::Point {
                interior_radius,
                falloff_radius,
                ..
            } => interior_radius + falloff_radius,
            LightKind::Spot { length, .. } => length,
            LightKind::Ambient | LightKind::Directional { .. } => f32::INFINITY,
        }
    }

    /// Number of shadow views assigned so far
    pub fn shadow_view_count(&self) -> usize {
        self.shadow_views.iter().filter(|&&v| v != NO_SHADOW_VIEW).count()
    }

    /// Convert to GPU data format
    pub fn to_gpu_data(&self) -> GpuLight {
        let (position, direction, params) = match self.kind {
            LightKind::Ambient => (Vec4::ZERO, Vec4::ZERO, Vec4::ZERO),
            LightKind::Directional { direction } => (
                Vec4::new(0.0, 0.0, 0.0, f32::MAX),
                direction.extend(1.0),
                Vec4::ZERO,
            ),
            LightKind::Point {
                position,
                interior_radius,
                falloff_radius,
            } => (
                position.extend(interior_radius + falloff_radius),
                Vec4::ZERO,
                Vec4::new(interior_radius, falloff_radius, 0.0, 0.0),
            ),
            LightKind::Spot {
                position,
                direction,
                length,
                half_angle,
            } => (
                position.extend(length),
                direction.extend(half_angle.cos()),
                Vec4::new(0.0, 0.0, length, half_angle),
            ),
        };

        GpuLight {
            position,
            direction,
            color_intensity: self.color.extend(self.intensity),
            params,
            shadow_views: IVec4::from_array(self.shadow_views),
            kind: UVec4::new(self.kind.code(), 0, 0, 0),
        }
    }
}

/// GPU-friendly light data, consumed as a storage array (unpadded)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    /// xyz = position, w = range
    pub position: Vec4,
    /// xyz = direction, w = cos(half angle) for spots
    pub direction: Vec4,
    /// xyz = color, w = intensity
    pub color_intensity: Vec4,
    /// x = interior radius, y = falloff radius, z = spot length, w = spot half angle
    pub params: Vec4,
    /// Shadow view indices, -1 = none
    pub shadow_views: IVec4,
    /// x = light kind (0 = ambient, 1 = directional, 2 = point, 3 = spot)
    pub kind: UVec4,
}

static_assertions::const_assert_eq!(std::mem::size_of::<GpuLight>(), 96);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_range() {
        let light = Light::point(Vec3::ZERO, 2.0, 8.0, Vec3::ONE, 1.0);
        assert_eq!(light.range(), 10.0);
        assert_eq!(light.to_gpu_data().position.w, 10.0);
        assert_eq!(light.to_gpu_data().kind.x, 2);
    }

    #[test]
    fn test_spot_encoding() {
        let light = Light::spot(Vec3::Y, Vec3::NEG_Y, 5.0, 0.5, Vec3::ONE, 3.0);
        let gpu = light.to_gpu_data();

        assert_eq!(gpu.kind.x, 3);
        assert_eq!(gpu.direction.truncate(), Vec3::NEG_Y);
        assert!((gpu.direction.w - 0.5f32.cos()).abs() < 1.0e-6);
        assert_eq!(gpu.color_intensity.w, 3.0);
    }

    #[test]
    fn test_shadow_views_default_to_none() {
        let mut light = Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0);
        assert_eq!(light.shadow_view_count(), 0);
        assert_eq!(light.to_gpu_data().shadow_views, IVec4::splat(NO_SHADOW_VIEW));

        light.shadow_views[0] = 1;
        light.shadow_views[1] = 2;
        assert_eq!(light.shadow_view_count(), 2);
        assert_eq!(light.to_gpu_data().shadow_views, IVec4::new(1, 2, -1, -1));
    }
}
