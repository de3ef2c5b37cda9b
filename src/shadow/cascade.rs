//! Cascaded shadow cameras for directional lights.
//!
//! The main view frustum is cut into `C` depth slices. Each slice is fitted
//! with an orthographic camera looking along the light direction whose
//! extents come from the slice's light-space bounding box. The box's near
//! side is pulled back to cover the whole scene so casters between the light
//! and the slice still land in the shadow map.

use glam::Vec3;

use crate::error::{RendererError, Result};
use crate::scene::{Aabb, Camera, Projection, MAX_LIGHT_SHADOW_VIEWS};

/// Most cascades a single directional light can use
pub const MAX_CASCADES: usize = MAX_LIGHT_SHADOW_VIEWS;

/// Smallest gap kept between consecutive split fractions
const MIN_SPLIT_GAP: f32 = 1.0e-3;

/// Light directions closer than this to the world Y axis use Z as reference up
const PARALLEL_UP_THRESHOLD: f32 = 0.99;

/// Near-heavy cascade split schedule.
///
/// `schedule[i]` is the fraction of the main view depth range at which
/// cascade `i` ends. The first two cascades additionally reach at least
/// `min_distances[i]` world units, so near detail does not shrink to nothing
/// in views with a large far plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeSplits {
    pub schedule: [f32; MAX_CASCADES - 1],
    pub min_distances: [f32; 2],
}

impl Default for CascadeSplits {
    fn default() -> Self {
        Self {
            schedule: [0.05, 0.15, 0.4],
            min_distances: [8.0, 24.0],
        }
    }
}

impl CascadeSplits {
    pub fn validate(&self) -> Result<()> {
        let mut previous = 0.0;
        for &fraction in &self.schedule {
            if !fraction.is_finite() || fraction <= previous || fraction >= 1.0 {
                return Err(RendererError::InvalidConfig(format!(
                    "cascade split schedule must be strictly increasing inside (0, 1), got {:?}",
                    self.schedule
                )));
            }
            previous = fraction;
        }
        if self.min_distances.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(RendererError::InvalidConfig(format!(
                "cascade minimum distances must be non-negative, got {:?}",
                self.min_distances
            )));
        }
        Ok(())
    }

    /// Split fractions `0 = s[0] < s[1] < ... < s[count] = 1` of a view
    /// whose depth range is `range` world units.
    ///
    /// `count` is clamped to `1..=MAX_CASCADES`.
    pub fn fractions(&self, count: usize, range: f32) -> Vec<f32> {
        let count = count.clamp(1, MAX_CASCADES);
        let mut splits = vec![0.0; count + 1];
        splits[count] = 1.0;

        for i in 1..count {
            let mut fraction = self.schedule[i - 1];
            if let Some(&min_distance) = self.min_distances.get(i - 1) {
                if range > 0.0 {
                    fraction = fraction.max(min_distance / range);
                }
            }
            let lo = splits[i - 1] + MIN_SPLIT_GAP;
            let hi = 1.0 - (count - i) as f32 * MIN_SPLIT_GAP;
            // max/min rather than clamp: rounding can leave lo a hair above hi
            splits[i] = fraction.max(lo).min(hi);
        }
        splits
    }
}

/// Orthonormal (right, up) pair perpendicular to `light_dir`.
///
/// World Y is the reference up axis unless the light is nearly vertical, in
/// which case Z is used so the cross product stays well defined.
pub fn light_basis(light_dir: Vec3) -> (Vec3, Vec3) {
    let dir = light_dir.normalize_or_zero();
    let dir = if dir == Vec3::ZERO { Vec3::NEG_Y } else { dir };
    let reference = if dir.y.abs() > PARALLEL_UP_THRESHOLD {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let right = dir.cross(reference).normalize();
    let up = right.cross(dir);
    (right, up)
}

/// Builds the cascade cameras of one directional light.
#[derive(Debug, Clone, Copy)]
pub struct CascadeBuilder {
    splits: CascadeSplits,
    count: usize,
}

impl CascadeBuilder {
    pub fn new(splits: CascadeSplits, count: usize) -> Self {
        Self {
            splits,
            count: count.clamp(1, MAX_CASCADES),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count.clamp(1, MAX_CASCADES);
        self
    }

    /// Eight world-space corners of the main view slice between the split
    /// fractions `from` and `to`.
    pub fn slice_corners(main: &Camera, from: f32, to: f32) -> [Vec3; 8] {
        let corners = main.frustum().all_corners();
        let mut slice = [Vec3::ZERO; 8];
        for i in 0..4 {
            let near = corners[i];
            let far = corners[i + 4];
            slice[i] = near.lerp(far, from);
            slice[i + 4] = near.lerp(far, to);
        }
        slice
    }

    /// One shadow-casting orthographic camera per cascade, nearest first.
    pub fn build(&self, light_dir: Vec3, main: &Camera, scene_bounds: &Aabb) -> Vec<Camera> {
        let projection = main.projection();
        let range = projection.far() - projection.near();
        let fractions = self.splits.fractions(self.count, range);

        let dir = light_dir.normalize_or_zero();
        let dir = if dir == Vec3::ZERO { Vec3::NEG_Y } else { dir };
        let (right, up) = light_basis(dir);
        let to_light_space = |p: Vec3| Vec3::new(p.dot(right), p.dot(up), p.dot(dir));

        let scene_near = if scene_bounds.is_empty() {
            f32::INFINITY
        } else {
            scene_bounds
                .corners()
                .iter()
                .map(|&c| c.dot(dir))
                .fold(f32::INFINITY, f32::min)
        };

        fractions
            .windows(2)
            .map(|pair| {
                let slice = Self::slice_corners(main, pair[0], pair[1]);
                let mut min = Vec3::splat(f32::INFINITY);
                let mut max = Vec3::splat(f32::NEG_INFINITY);
                for corner in slice {
                    let p = to_light_space(corner);
                    min = min.min(p);
                    max = max.max(p);
                }
                // Include casters between the light and the slice
                min.z = min.z.min(scene_near);

                let origin = right * min.x + up * min.y + dir * min.z;
                let extent = max - min;
                let mut camera = Camera::new(
                    origin,
                    dir,
                    Projection::Orthographic {
                        left: 0.0,
                        right: extent.x,
                        top: extent.y,
                        bottom: 0.0,
                        near: 0.0,
                        far: extent.z,
                    },
                );
                camera.set_up(up);
                camera.set_shadow_caster(true);
                camera.build_frustum();
                camera
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn main_camera() -> Camera {
        Camera::perspective(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Z, 60.0, 16.0 / 9.0, 0.1, 200.0)
    }

    #[rstest]
    #[case::one(1)]
    #[case::two(2)]
    #[case::three(3)]
    #[case::four(4)]
    fn test_split_fractions_monotonic(#[case] count: usize) {
        for range in [1.0, 50.0, 199.9, 10_000.0] {
            let splits = CascadeSplits::default().fractions(count, range);
            assert_eq!(splits.len(), count + 1);
            assert_eq!(splits[0], 0.0);
            assert_eq!(splits[count], 1.0);
            assert!(splits.windows(2).all(|w| w[0] < w[1]), "{splits:?}");
        }
    }

    #[test]
    fn test_min_distance_pushes_first_split() {
        let splits = CascadeSplits::default().fractions(4, 1000.0);
        // 5% of 1000 is 50, above the 8 unit minimum
        assert!((splits[1] - 0.05).abs() < 1.0e-6);

        let splits = CascadeSplits::default().fractions(4, 100.0);
        // 5% of 100 is 5, so the 8 unit minimum wins
        assert!((splits[1] - 0.08).abs() < 1.0e-6);
    }

    #[test]
    fn test_invalid_schedule() {
        let mut splits = CascadeSplits::default();
        assert!(splits.validate().is_ok());
        splits.schedule = [0.2, 0.1, 0.4];
        assert!(splits.validate().is_err());
        splits.schedule = [0.1, 0.2, 1.0];
        assert!(splits.validate().is_err());
        splits = CascadeSplits {
            min_distances: [-1.0, 2.0],
            ..CascadeSplits::default()
        };
        assert!(splits.validate().is_err());
    }

    #[rstest]
    #[case::slanted(Vec3::new(0.3, -1.0, 0.2))]
    #[case::straight_down(Vec3::NEG_Y)]
    #[case::straight_up(Vec3::Y)]
    #[case::horizontal(Vec3::X)]
    fn test_light_basis_orthonormal(#[case] dir: Vec3) {
        let (right, up) = light_basis(dir);
        let dir = dir.normalize();
        assert!((right.length() - 1.0).abs() < 1.0e-5);
        assert!((up.length() - 1.0).abs() < 1.0e-5);
        assert!(right.dot(up).abs() < 1.0e-5);
        assert!(right.dot(dir).abs() < 1.0e-5);
        assert!(up.dot(dir).abs() < 1.0e-5);
    }

    #[rstest]
    #[case::slanted(Vec3::new(0.3, -1.0, 0.2))]
    #[case::straight_down(Vec3::NEG_Y)]
    fn test_cascades_contain_their_slices(#[case] light_dir: Vec3) {
        let main = main_camera();
        let scene = Aabb::new(Vec3::new(-100.0, -1.0, -200.0), Vec3::new(100.0, 30.0, 10.0));
        let builder = CascadeBuilder::new(CascadeSplits::default(), 4);
        let cascades = builder.build(light_dir, &main, &scene);
        assert_eq!(cascades.len(), 4);

        let splits = CascadeSplits::default().fractions(4, 199.9);
        for (i, cascade) in cascades.iter().enumerate() {
            assert!(cascade.is_ortho());
            assert!(cascade.is_shadow_caster());
            for corner in CascadeBuilder::slice_corners(&main, splits[i], splits[i + 1]) {
                assert!(
                    cascade.frustum().min_distance(corner) > -1.0e-2,
                    "cascade {i} misses slice corner {corner}"
                );
            }
        }
    }

    #[test]
    fn test_cascade_near_covers_scene_casters() {
        let main = main_camera();
        // Tall scene: casters far above the view slice
        let scene = Aabb::new(Vec3::new(-10.0, 0.0, -10.0), Vec3::new(10.0, 500.0, 0.0));
        let cascades = CascadeBuilder::new(CascadeSplits::default(), 1).build(Vec3::NEG_Y, &main, &scene);

        let cascade = &cascades[0];
        // Light looks down, so its near plane sits at the top of the scene
        assert!((cascade.position().y - 500.0).abs() < 1.0e-3);
        // A caster above the slice is inside the cascade volume
        assert!(cascade.sphere_in_frustum(Vec3::new(0.0, 400.0, -5.0), 0.1));
    }
}
