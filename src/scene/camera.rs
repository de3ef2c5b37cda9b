//! Camera system and view frustum math.
//!
//! A [`Camera`] owns its derived frustum: every setter that touches position,
//! orientation or projection rebuilds the six planes and six corner points
//! before returning, so plane tests never observe stale state.

use bitflags::bitflags;
use glam::{Mat4, Vec3};

/// Near plane of a point (omni) camera as a fraction of its radius
const POINT_NEAR_FACTOR: f32 = 0.01;

/// Largest half-angle accepted by the cone test before `tan` blows up
const MAX_CONE_HALF_ANGLE: f32 = std::f32::consts::FRAC_PI_2 - 1.0e-3;

/// Camera projection type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    },
    /// Omnidirectional view of everything within `radius` of the camera
    Point { radius: f32 },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective {
            fov_y: std::f32::consts::FRAC_PI_4, // 45 degrees
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Projection::Perspective {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    pub fn orthographic(width: f32, height: f32, near: f32, far: f32) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Projection::Orthographic {
            left: -half_w,
            right: half_w,
            top: half_h,
            bottom: -half_h,
            near,
            far,
        }
    }

    pub fn point(radius: f32) -> Self {
        Projection::Point { radius }
    }

    pub fn matrix(&self) -> Mat4 {
        match *self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov_y, aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                top,
                bottom,
                near,
                far,
            } => Mat4::orthographic_rh(left, right, bottom, top, near, far),
            // One cube face; the caller orients the camera per face.
            Projection::Point { radius } => Mat4::perspective_rh(
                std::f32::consts::FRAC_PI_2,
                1.0,
                radius * POINT_NEAR_FACTOR,
                radius,
            ),
        }
    }

    pub fn near(&self) -> f32 {
        match *self {
            Projection::Perspective { near, .. } => near,
            Projection::Orthographic { near, .. } => near,
            Projection::Point { radius } => radius * POINT_NEAR_FACTOR,
        }
    }

    pub fn far(&self) -> f32 {
        match *self {
            Projection::Perspective { far, .. } => far,
            Projection::Orthographic { far, .. } => far,
            Projection::Point { radius } => radius,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if let Projection::Perspective { aspect: a, .. } = self {
            *a = aspect;
        }
    }

    /// Flags implied by the projection variant
    pub fn default_flags(&self) -> CameraFlags {
        match self {
            Projection::Perspective { .. } => CameraFlags::empty(),
            Projection::Orthographic { .. } => CameraFlags::ORTHO,
            Projection::Point { .. } => CameraFlags::POINT,
        }
    }
}

bitflags! {
    /// Per-camera flags. Independent of the projection variant once set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CameraFlags: u32 {
        const ORTHO = 1 << 0;
        const POINT = 1 << 1;
        const SHADOW_CASTER = 1 << 2;
    }
}

/// Plane in Hessian normal form. Points with positive signed distance are
/// on the inner side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    /// Plane through `point` facing `normal` (normalized here).
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            d: -normal.dot(point),
        }
    }

    #[inline]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self {
            normal: Vec3::Z,
            d: 0.0,
        }
    }
}

/// Six inward-facing planes plus six corner points.
///
/// Corners are stored as near top-left, near top-right, near bottom-left,
/// far top-left, far top-right and far bottom-left. The remaining corner of
/// each face follows by parallelogram completion.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frustum {
    pub planes: [Plane; 6],
    pub corners: [Vec3; 6],
}

impl Frustum {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const BOTTOM: usize = 2;
    pub const TOP: usize = 3;
    pub const NEAR: usize = 4;
    pub const FAR: usize = 5;

    pub const NEAR_TOP_LEFT: usize = 0;
    pub const NEAR_TOP_RIGHT: usize = 1;
    pub const NEAR_BOTTOM_LEFT: usize = 2;
    pub const FAR_TOP_LEFT: usize = 3;
    pub const FAR_TOP_RIGHT: usize = 4;
    pub const FAR_BOTTOM_LEFT: usize = 5;

    /// Smallest signed distance from `point` to any plane.
    pub fn min_distance(&self, point: Vec3) -> f32 {
        self.planes
            .iter()
            .map(|plane| plane.signed_distance(point))
            .fold(f32::INFINITY, f32::min)
    }

    /// All eight corners: near TL, TR, BL, BR then far TL, TR, BL, BR.
    pub fn all_corners(&self) -> [Vec3; 8] {
        let c = &self.corners;
        let near_br = c[Self::NEAR_TOP_RIGHT] + c[Self::NEAR_BOTTOM_LEFT] - c[Self::NEAR_TOP_LEFT];
        let far_br = c[Self::FAR_TOP_RIGHT] + c[Self::FAR_BOTTOM_LEFT] - c[Self::FAR_TOP_LEFT];
        [
            c[Self::NEAR_TOP_LEFT],
            c[Self::NEAR_TOP_RIGHT],
            c[Self::NEAR_BOTTOM_LEFT],
            near_br,
            c[Self::FAR_TOP_LEFT],
            c[Self::FAR_TOP_RIGHT],
            c[Self::FAR_BOTTOM_LEFT],
            far_br,
        ]
    }
}

/// Camera for viewing the scene
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    direction: Vec3,
    up: Vec3,
    projection: Projection,
    view_id: u32,
    flags: CameraFlags,
    frustum: Frustum,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 2.0, 5.0), Vec3::NEG_Z, Projection::default())
    }
}

impl Camera {
    pub fn new(position: Vec3, direction: Vec3, projection: Projection) -> Self {
        let mut camera = Self {
            position,
            direction: direction.normalize_or_zero(),
            up: Vec3::Y,
            projection,
            view_id: 0,
            flags: projection.default_flags(),
            frustum: Frustum::default(),
        };
        camera.build_frustum();
        camera
    }

    pub fn perspective(position: Vec3, direction: Vec3, fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::new(
            position,
            direction,
            Projection::perspective(fov_y_degrees, aspect, near, far),
        )
    }

    pub fn point(position: Vec3, radius: f32) -> Self {
        Self::new(position, Vec3::NEG_Z, Projection::point(radius))
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    pub fn view_id(&self) -> u32 {
        self.view_id
    }

    pub fn flags(&self) -> CameraFlags {
        self.flags
    }

    pub fn is_ortho(&self) -> bool {
        self.flags.contains(CameraFlags::ORTHO)
    }

    pub fn is_point(&self) -> bool {
        self.flags.contains(CameraFlags::POINT)
    }

    pub fn is_shadow_caster(&self) -> bool {
        self.flags.contains(CameraFlags::SHADOW_CASTER)
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.build_frustum();
    }

    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = direction.normalize_or_zero();
        self.build_frustum();
    }

    pub fn set_up(&mut self, up: Vec3) {
        self.up = up.normalize_or_zero();
        self.build_frustum();
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.set_direction(target - self.position);
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.build_frustum();
    }

    /// Update aspect ratio for perspective projection
    pub fn set_aspect(&mut self, width: f32, height: f32) {
        self.projection.set_aspect(width / height);
        self.build_frustum();
    }

    pub fn set_view_id(&mut self, view_id: u32) {
        self.view_id = view_id;
    }

    pub fn set_flags(&mut self, flags: CameraFlags) {
        self.flags = flags;
    }

    pub fn set_shadow_caster(&mut self, shadow_caster: bool) {
        self.flags.set(CameraFlags::SHADOW_CASTER, shadow_caster);
    }

    /// Orthonormal (forward, right, up) basis.
    ///
    /// Falls back to an arbitrary perpendicular up axis when `up` is parallel
    /// to the view direction.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = if self.direction == Vec3::ZERO {
            Vec3::NEG_Z
        } else {
            self.direction
        };
        let mut right = forward.cross(self.up);
        if right.length_squared() < 1.0e-8 {
            right = forward.cross(forward.any_orthonormal_vector());
        }
        let right = right.normalize();
        let up = right.cross(forward);
        (forward, right, up)
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Mat4 {
        let (forward, _, up) = self.basis();
        Mat4::look_to_rh(self.position, forward, up)
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    /// Get combined projection-view matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Recompute the six planes and six corners from the current state.
    pub fn build_frustum(&mut self) {
        let (f, r, u) = self.basis();
        let pos = self.position;

        self.frustum = match self.projection {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => {
                let half_v = fov_y * 0.5;
                let tan_v = half_v.tan();
                let half_h = (tan_v * aspect).atan();
                let (sin_h, cos_h) = half_h.sin_cos();
                let (sin_v, cos_v) = half_v.sin_cos();

                let mut planes = [Plane::default(); 6];
                planes[Frustum::LEFT] = Plane::from_point_normal(pos, r * cos_h + f * sin_h);
                planes[Frustum::RIGHT] = Plane::from_point_normal(pos, -r * cos_h + f * sin_h);
                planes[Frustum::BOTTOM] = Plane::from_point_normal(pos, u * cos_v + f * sin_v);
                planes[Frustum::TOP] = Plane::from_point_normal(pos, -u * cos_v + f * sin_v);
                planes[Frustum::NEAR] = Plane::from_point_normal(pos + f * near, f);
                planes[Frustum::FAR] = Plane::from_point_normal(pos + f * far, -f);

                let near_h = near * tan_v;
                let far_h = far * tan_v;
                let near_c = pos + f * near;
                let far_c = pos + f * far;
                let corners = [
                    near_c + u * near_h - r * near_h * aspect,
                    near_c + u * near_h + r * near_h * aspect,
                    near_c - u * near_h - r * near_h * aspect,
                    far_c + u * far_h - r * far_h * aspect,
                    far_c + u * far_h + r * far_h * aspect,
                    far_c - u * far_h - r * far_h * aspect,
                ];
                Frustum { planes, corners }
            }
            Projection::Orthographic {
                left,
                right,
                top,
                bottom,
                near,
                far,
            } => {
                let mut planes = [Plane::default(); 6];
                planes[Frustum::LEFT] = Plane::from_point_normal(pos + r * left, r);
                planes[Frustum::RIGHT] = Plane::from_point_normal(pos + r * right, -r);
                planes[Frustum::BOTTOM] = Plane::from_point_normal(pos + u * bottom, u);
                planes[Frustum::TOP] = Plane::from_point_normal(pos + u * top, -u);
                planes[Frustum::NEAR] = Plane::from_point_normal(pos + f * near, f);
                planes[Frustum::FAR] = Plane::from_point_normal(pos + f * far, -f);

                let near_c = pos + f * near;
                let far_c = pos + f * far;
                let corners = [
                    near_c + u * top + r * left,
                    near_c + u * top + r * right,
                    near_c + u * bottom + r * left,
                    far_c + u * top + r * left,
                    far_c + u * top + r * right,
                    far_c + u * bottom + r * left,
                ];
                Frustum { planes, corners }
            }
            Projection::Point { radius } => {
                // Axis-aligned cube around the camera; callers use the
                // point flag to switch to a sphere test instead.
                let mut planes = [Plane::default(); 6];
                planes[Frustum::LEFT] = Plane::from_point_normal(pos - Vec3::X * radius, Vec3::X);
                planes[Frustum::RIGHT] = Plane::from_point_normal(pos + Vec3::X * radius, Vec3::NEG_X);
                planes[Frustum::BOTTOM] = Plane::from_point_normal(pos - Vec3::Y * radius, Vec3::Y);
                planes[Frustum::TOP] = Plane::from_point_normal(pos + Vec3::Y * radius, Vec3::NEG_Y);
                planes[Frustum::NEAR] = Plane::from_point_normal(pos - Vec3::Z * radius, Vec3::Z);
                planes[Frustum::FAR] = Plane::from_point_normal(pos + Vec3::Z * radius, Vec3::NEG_Z);

                let corners = [
                    pos + Vec3::new(-radius, radius, -radius),
                    pos + Vec3::new(radius, radius, -radius),
                    pos + Vec3::new(-radius, -radius, -radius),
                    pos + Vec3::new(-radius, radius, radius),
                    pos + Vec3::new(radius, radius, radius),
                    pos + Vec3::new(-radius, -radius, radius),
                ];
                Frustum { planes, corners }
            }
        };
    }

    /// True iff the minimum signed plane distance to `center` is at least `-radius`.
    pub fn sphere_in_frustum(&self, center: Vec3, radius: f32) -> bool {
        self.frustum.min_distance(center) >= -radius
    }

    /// Conservative cone visibility test.
    ///
    /// Each plane rejects the cone only when both the apex and the base-rim
    /// point reaching furthest inside lie behind it. The cone is culled when
    /// any single plane rejects it, so cones clipping a frustum corner may
    /// still be reported visible.
    pub fn cone_in_frustum(&self, origin: Vec3, direction: Vec3, length: f32, half_angle: f32) -> bool {
        let axis = direction.normalize_or_zero();
        let base = origin + axis * length;
        let rim_radius = length * half_angle.clamp(0.0, MAX_CONE_HALF_ANGLE).tan();

        for plane in &self.frustum.planes {
            if plane.signed_distance(origin) >= 0.0 {
                continue;
            }
            let toward_plane = (plane.normal - axis * plane.normal.dot(axis)).normalize_or_zero();
            let rim = base + toward_plane * rim_radius;
            if plane.signed_distance(rim) < 0.0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward_camera() -> Camera {
        // 90 degree square frustum looking down -Z from the origin
        Camera::perspective(Vec3::ZERO, Vec3::NEG_Z, 90.0, 1.0, 1.0, 100.0)
    }

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1.0e-4
    }

    #[test]
    fn test_perspective_corners() {
        let camera = forward_camera();
        let corners = camera.frustum().corners;

        assert!(approx(corners[Frustum::NEAR_TOP_LEFT], Vec3::new(-1.0, 1.0, -1.0)));
        assert!(approx(corners[Frustum::NEAR_TOP_RIGHT], Vec3::new(1.0, 1.0, -1.0)));
        assert!(approx(corners[Frustum::NEAR_BOTTOM_LEFT], Vec3::new(-1.0, -1.0, -1.0)));
        assert!(approx(corners[Frustum::FAR_TOP_LEFT], Vec3::new(-100.0, 100.0, -100.0)));

        let all = camera.frustum().all_corners();
        assert!(approx(all[3], Vec3::new(1.0, -1.0, -1.0)));
        assert!(approx(all[7], Vec3::new(100.0, -100.0, -100.0)));
    }

    #[test]
    fn test_corners_lie_on_planes() {
        let camera = forward_camera();
        for corner in camera.frustum().all_corners() {
            assert!(camera.frustum().min_distance(corner).abs() < 1.0e-3);
        }
    }

    #[test]
    fn test_sphere_in_perspective_frustum() {
        let camera = forward_camera();

        assert!(camera.sphere_in_frustum(Vec3::new(0.0, 0.0, -10.0), 0.5));
        assert!(!camera.sphere_in_frustum(Vec3::new(0.0, 0.0, 10.0), 0.5));
        // Beyond the far plane, reached only by the radius
        assert!(!camera.sphere_in_frustum(Vec3::new(0.0, 0.0, -105.0), 4.0));
        assert!(camera.sphere_in_frustum(Vec3::new(0.0, 0.0, -105.0), 6.0));
        // Left of the 45 degree side plane
        assert!(!camera.sphere_in_frustum(Vec3::new(-20.0, 0.0, -10.0), 1.0));
        assert!(camera.sphere_in_frustum(Vec3::new(-20.0, 0.0, -10.0), 8.0));
    }

    #[test]
    fn test_frustum_never_stale() {
        let mut camera = forward_camera();
        let target = Vec3::new(0.0, 0.0, -10.0);
        assert!(camera.sphere_in_frustum(target, 0.1));

        camera.set_position(Vec3::new(0.0, 0.0, -20.0));
        assert!(!camera.sphere_in_frustum(target, 0.1));

        camera.set_direction(Vec3::Z);
        assert!(camera.sphere_in_frustum(target, 0.1));

        camera.set_projection(Projection::perspective(90.0, 1.0, 1.0, 5.0));
        assert!(!camera.sphere_in_frustum(target, 0.1));
    }

    #[test]
    fn test_orthographic_planes() {
        let camera = Camera::new(
            Vec3::ZERO,
            Vec3::NEG_Z,
            Projection::orthographic(10.0, 10.0, 0.0, 20.0),
        );
        assert!(camera.is_ortho());

        assert!(camera.sphere_in_frustum(Vec3::new(4.0, 4.0, -10.0), 0.0));
        assert!(!camera.sphere_in_frustum(Vec3::new(6.0, 0.0, -10.0), 0.5));
        assert!(camera.sphere_in_frustum(Vec3::new(6.0, 0.0, -10.0), 1.5));
        assert!(!camera.sphere_in_frustum(Vec3::new(0.0, 0.0, -25.0), 1.0));

        let corners = camera.frustum().corners;
        assert!(approx(corners[Frustum::NEAR_TOP_LEFT], Vec3::new(-5.0, 5.0, 0.0)));
        assert!(approx(corners[Frustum::FAR_BOTTOM_LEFT], Vec3::new(-5.0, -5.0, -20.0)));
    }

    #[test]
    fn test_point_camera_is_cube() {
        let camera = Camera::point(Vec3::new(10.0, 0.0, 0.0), 5.0);
        assert!(camera.is_point());
        assert!(!camera.is_ortho());

        assert!(camera.sphere_in_frustum(Vec3::new(14.0, 0.0, 0.0), 0.0));
        assert!(!camera.sphere_in_frustum(Vec3::new(16.0, 0.0, 0.0), 0.5));
        for plane in &camera.frustum().planes {
            assert!((plane.signed_distance(camera.position()) - 5.0).abs() < 1.0e-4);
        }
    }

    #[test]
    fn test_flags_are_independent() {
        let mut camera = forward_camera();
        assert_eq!(camera.flags(), CameraFlags::empty());

        camera.set_shadow_caster(true);
        assert!(camera.is_shadow_caster());
        assert!(!camera.is_ortho());

        camera.set_flags(CameraFlags::ORTHO | CameraFlags::SHADOW_CASTER);
        assert!(camera.is_ortho());
        // Projection variant is untouched
        assert!(matches!(camera.projection(), Projection::Perspective { .. }));
    }

    #[test]
    fn test_cone_in_frustum() {
        let camera = forward_camera();
        let half_angle = 30f32.to_radians();

        // Spot in front pointing away from the camera
        assert!(camera.cone_in_frustum(Vec3::new(0.0, 0.0, -5.0), Vec3::NEG_Z, 10.0, half_angle));
        // Behind the camera pointing further back
        assert!(!camera.cone_in_frustum(Vec3::new(0.0, 0.0, 20.0), Vec3::Z, 10.0, half_angle));
        // Behind the camera but long enough to reach into view
        assert!(camera.cone_in_frustum(Vec3::new(0.0, 0.0, 20.0), Vec3::NEG_Z, 30.0, half_angle));
        // Short cone behind the camera pointing toward it
        assert!(!camera.cone_in_frustum(Vec3::new(0.0, 0.0, 20.0), Vec3::NEG_Z, 5.0, half_angle));
    }

    #[test]
    fn test_cone_rim_reaches_into_view() {
        let camera = forward_camera();
        // Apex left of the left plane, axis parallel to the view direction,
        // wide enough that the rim crosses into the frustum.
        let origin = Vec3::new(-30.0, 0.0, -10.0);
        assert!(!camera.cone_in_frustum(origin, Vec3::NEG_Z, 10.0, 5f32.to_radians()));
        assert!(camera.cone_in_frustum(origin, Vec3::NEG_Z, 10.0, 60f32.to_radians()));
    }

    #[test]
    fn test_basis_fallback_when_looking_along_up() {
        let camera = Camera::perspective(Vec3::ZERO, Vec3::NEG_Y, 60.0, 1.0, 0.1, 10.0);
        let (forward, right, up) = camera.basis();

        assert!(approx(forward, Vec3::NEG_Y));
        assert!(right.is_normalized());
        assert!(up.is_normalized());
        assert!(forward.dot(right).abs() < 1.0e-5);
        assert!(camera.view_matrix().is_finite());
        assert!(camera.sphere_in_frustum(Vec3::new(0.0, -5.0, 0.0), 0.1));
    }

    #[test]
    fn test_view_projection_maps_center_to_clip_center() {
        let camera = forward_camera();
        let clip = camera.view_projection_matrix() * Vec3::new(0.0, 0.0, -10.0).extend(1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 1.0e-5);
        assert!(ndc.y.abs() < 1.0e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
