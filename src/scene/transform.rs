//! Transforms and bounding volumes

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3, Vec4};

/// Local transform of a scene node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    pub fn from_position_scale(position: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            scale,
            ..Default::default()
        }
    }

    /// Get the model matrix for this transform
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Per-instance transform block as laid out in the instance uniform table
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TransformBlock {
    pub model: Mat4,
    pub normal_matrix: Mat4,
}

impl TransformBlock {
    /// Build the block for a world matrix; the normal matrix is its inverse transpose.
    pub fn from_world(world: Mat4) -> Self {
        Self {
            model: world,
            normal_matrix: world.inverse().transpose(),
        }
    }
}

impl Default for TransformBlock {
    fn default() -> Self {
        Self::from_world(Mat4::IDENTITY)
    }
}

/// Bounding sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere enclosing this one after `matrix` is applied.
    ///
    /// Non-uniform scale is handled by taking the largest axis scale.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let center = matrix.transform_point3(self.center);
        let scale = matrix
            .x_axis
            .truncate()
            .length()
            .max(matrix.y_axis.truncate().length())
            .max(matrix.z_axis.truncate().length());
        Self {
            center,
            radius: self.radius * scale,
        }
    }

    /// xyz = center, w = radius
    pub fn to_vec4(&self) -> Vec4 {
        self.center.extend(self.radius)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// Inverted box that any point expands
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut aabb = Self::EMPTY;
        for point in points {
            aabb.expand(point);
        }
        aabb
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn expand_sphere(&mut self, sphere: &BoundingSphere) {
        self.expand(sphere.center - Vec3::splat(sphere.radius));
        self.expand(sphere.center + Vec3::splat(sphere.radius));
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_matrix() {
        let t = Transform::from_position_scale(Vec3::new(1.0, 2.0, 3.0), Vec3::splat(2.0));
        let p = t.matrix().transform_point3(Vec3::X);
        assert!((p - Vec3::new(3.0, 2.0, 3.0)).length() < 1.0e-5);
    }

    #[test]
    fn test_sphere_transform_uses_largest_scale() {
        let sphere = BoundingSphere::new(Vec3::X, 1.0);
        let world = Transform::from_position_scale(Vec3::new(0.0, 5.0, 0.0), Vec3::new(1.0, 3.0, 2.0)).matrix();
        let moved = sphere.transformed(&world);

        assert!((moved.center - Vec3::new(1.0, 5.0, 0.0)).length() < 1.0e-5);
        assert!((moved.radius - 3.0).abs() < 1.0e-5);
    }

    #[test]
    fn test_aabb_from_points() {
        let aabb = Aabb::from_points([Vec3::new(-1.0, 2.0, 0.0), Vec3::new(3.0, -2.0, 1.0)]);
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(3.0, 2.0, 1.0));
        assert_eq!(aabb.center(), Vec3::new(1.0, 0.0, 0.5));
        assert!(!aabb.is_empty());
        assert!(Aabb::EMPTY.is_empty());
    }

    #[test]
    fn test_normal_matrix_of_uniform_scale() {
        let block = TransformBlock::from_world(Mat4::from_scale(Vec3::splat(2.0)));
        let n = block.normal_matrix.transform_vector3(Vec3::Y);
        assert!((n - Vec3::new(0.0, 0.5, 0.0)).length() < 1.0e-5);
    }
}
