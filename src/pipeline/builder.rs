//! Frame production: scene to views, lights, materials and instance lists.

use glam::Vec3;

use crate::frame::{Frame, FramePool, MAX_SHADOWS};
use crate::scene::{Camera, Light, LightKind, Projection, Scene, TransformBlock, MAX_LIGHT_SHADOW_VIEWS};
use crate::shadow::{select_shadow_candidates, CascadeBuilder};
use crate::RendererConfig;

/// Widest cone a spot shadow view is built for
const MAX_SPOT_SHADOW_FOV: f32 = std::f32::consts::PI - 0.01;

/// Spot shadow near plane as a fraction of the spot length
const SPOT_SHADOW_NEAR_FACTOR: f32 = 0.01;

/// Fills a [`Frame`] from a [`Scene`] and the main camera.
///
/// Per frame, in order:
/// 1. add the main view
/// 2. select visible lights and rank shadow candidates
/// 3. add shadow views for the candidates (cascades, spot or point views)
/// 4. write lights with their shadow view slots
/// 5. write every scene material
/// 6. walk the scene, writing each instance at least one view can see
/// 7. fill the frame uniforms
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    cascades: CascadeBuilder,
    max_shadows: usize,
}

impl FrameBuilder {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            cascades: CascadeBuilder::new(config.cascade_splits, config.cascade_count),
            max_shadows: MAX_SHADOWS.min(config.max_views.saturating_sub(1)),
        }
    }

    /// Build one frame into `pool`.
    ///
    /// Returns `false` when the pool had no free slot and the frame was
    /// skipped. A built frame is published right away when possible, and
    /// otherwise by the next `begin_frame`.
    pub fn produce(&self, pool: &mut FramePool, scene: &Scene, camera: &Camera) -> bool {
        let Some(frame) = pool.begin_frame() else {
            return false;
        };
        self.build(frame, scene, camera);
        if !pool.end_frame() {
            log::trace!("FrameBuilder: frame built but left pending");
        }
        true
    }

    /// Write everything visible from `camera` into a `Building` frame.
    pub fn build(&self, frame: &mut Frame, scene: &Scene, camera: &Camera) {
        let mut main = camera.clone();
        main.set_shadow_caster(false);
        let Some(main_index) = frame.add_view(main) else {
            log::warn!("FrameBuilder: no room for the main view");
            return;
        };
        let main = match frame.views().view(main_index) {
            Some(view) => view.camera().clone(),
            None => return,
        };

        // Lights
        let selection = select_shadow_candidates(scene.lights(), &main, self.max_shadows);
        let mut lights: Vec<Light> = selection.visible.iter().map(|&i| scene.lights()[i]).collect();
        let capacity = frame.lights().remaining() as usize;
        if lights.len() > capacity {
            frame.stats_mut().lights_dropped += (lights.len() - capacity) as u32;
            lights.truncate(capacity);
        }

        // Shadow views
        let world_bounds = scene.world_bounds();
        let mut shadow_matrices = Vec::with_capacity(self.max_shadows);
        'candidates: for candidate in selection.candidates.iter() {
            let Some(light) = lights.get_mut(candidate.light_index as usize) else {
                continue;
            };
            let remaining = self.max_shadows - shadow_matrices.len();
            if remaining == 0 {
                break;
            }

            let cameras = match light.kind {
                LightKind::Ambient => continue,
                LightKind::Directional { direction } => {
                    let count = self.cascades.count().min(remaining);
                    self.cascades.with_count(count).build(direction, &main, &world_bounds)
                }
                LightKind::Spot {
                    position,
                    direction,
                    length,
                    half_angle,
                } => vec![spot_shadow_camera(position, direction, length, half_angle)],
                LightKind::Point { position, .. } => {
                    let mut view = Camera::point(position, light.range());
                    view.set_shadow_caster(true);
                    vec![view]
                }
            };

            for (slot, shadow_camera) in cameras.into_iter().take(MAX_LIGHT_SHADOW_VIEWS).enumerate() {
                let matrix = shadow_camera.view_projection_matrix();
                if frame.add_view(shadow_camera).is_none() {
                    break 'candidates;
                }
                light.shadow_views[slot] = shadow_matrices.len() as i32;
                shadow_matrices.push(matrix);
            }
        }

        for light in &lights {
            frame.write_light(light);
        }

        // Materials before instances: opacity is read back from this table
        for material in scene.materials() {
            frame.write_material(material);
        }
        let material_count = frame.materials().len();

        // Instances
        for visit in scene.walk() {
            frame.stats_mut().instances_visited += 1;

            let bits = frame.view_bits(visit.bounds.center, visit.bounds.radius);
            if bits == 0 {
                frame.stats_mut().instances_culled += 1;
                continue;
            }
            if visit.instance.primitives.iter().any(|p| p.material >= material_count) {
                log::trace!("FrameBuilder: node {} references a dropped material", visit.node);
                frame.stats_mut().instances_dropped += 1;
                continue;
            }
            frame.write_instance(visit.instance, &TransformBlock::from_world(visit.world), bits);
        }

        // Uniforms
        let main_uniforms = frame.views().views()[main_index as usize].uniforms();
        let light_count = frame.lights().len();
        let shadow_count = shadow_matrices.len() as u32;
        let uniforms = frame.uniforms_mut();
        uniforms.proj_view = main_uniforms.proj_view;
        uniforms.frustum_corners = main_uniforms.frustum_corners;
        uniforms.view_position = main_uniforms.view_position;
        for (dst, src) in uniforms.shadow_proj_view.iter_mut().zip(&shadow_matrices) {
            *dst = *src;
        }
        uniforms.light_count = light_count;
        uniforms.shadow_count = shadow_count;
        frame.stats_mut().shadow_views = shadow_count;

        let stats = frame.stats();
        log::debug!(
            "FrameBuilder: {} visited, {} culled, {} written, {} lights, {} shadow views",
            stats.instances_visited,
            stats.instances_culled,
            stats.instances_written,
            light_count,
            shadow_count
        );
    }
}

/// Perspective shadow view covering a spot light cone
fn spot_shadow_camera(position: Vec3, direction: Vec3, length: f32, half_angle: f32) -> Camera {
    let mut camera = Camera::new(
        position,
        direction,
        Projection::Perspective {
            fov_y: (half_angle * 2.0).clamp(0.01, MAX_SPOT_SHADOW_FOV),
            aspect: 1.0,
            near: (length * SPOT_SHADOW_NEAR_FACTOR).max(1.0e-3),
            far: length,
        },
    );
    camera.set_shadow_caster(true);
    camera
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MeshHandle;
    use crate::scene::{AlphaMode, BoundingSphere, Instance, Material, Primitive, Transform, NO_SHADOW_VIEW};

    fn cube(material: u32) -> Instance {
        Instance::new(
            vec![Primitive {
                mesh: MeshHandle(1),
                material,
                vertex_count: 36,
            }],
            BoundingSphere::new(Vec3::ZERO, 1.0),
        )
    }

    fn camera() -> Camera {
        Camera::perspective(Vec3::new(0.0, 2.0, 10.0), Vec3::NEG_Z, 60.0, 16.0 / 9.0, 0.1, 100.0)
    }

    fn pool(config: &RendererConfig) -> FramePool {
        FramePool::new(config, 256).unwrap()
    }

    #[test]
    fn test_build_assigns_views_and_lists() {
        let config = RendererConfig::default().with_frames_in_flight(2);
        let mut scene = Scene::new();
        let stone = scene.add_material(Material::new("stone"));
        let glass = scene.add_material(Material::new("glass").with_alpha_mode(AlphaMode::Blend));
        scene.add_node(Transform::from_position(Vec3::new(0.0, 0.0, 0.0)), Some(cube(stone)), None);
        scene.add_node(Transform::from_position(Vec3::new(1.0, 0.0, -2.0)), Some(cube(glass)), None);
        // Behind the camera and far from any shadow view
        scene.add_node(Transform::from_position(Vec3::new(0.0, 0.0, 500.0)), Some(cube(stone)), None);
        scene.add_light(Light::ambient(Vec3::ONE, 0.1));
        scene.add_light(Light::directional(Vec3::new(0.2, -1.0, -0.3), Vec3::ONE, 3.0));

        let mut pool = pool(&config);
        let builder = FrameBuilder::new(&config);
        let frame = pool.begin_frame().unwrap();
        builder.build(frame, &scene, &camera());

        // Main view plus four cascades
        assert_eq!(frame.views().len(), 5);
        assert_eq!(frame.views().shadow_views().count(), 4);
        assert_eq!(frame.uniforms().shadow_count, 4);
        assert_eq!(frame.uniforms().light_count, 2);

        let directional = frame.lights().read(1).unwrap();
        assert_eq!(directional.shadow_views.to_array(), [0, 1, 2, 3]);
        let ambient = frame.lights().read(0).unwrap();
        assert_eq!(ambient.shadow_views.x, NO_SHADOW_VIEW);

        let stats = *frame.stats();
        assert_eq!(stats.instances_visited, 3);
        assert_eq!(stats.instances_culled, 1);
        assert_eq!(stats.instances_written, 2);

        let main = frame.views().main_view().unwrap();
        assert_eq!(main.list().opaque(), &[0]);
        assert_eq!(main.list().transparent(), &[1]);
        assert_eq!(frame.uniforms().proj_view, camera().view_projection_matrix());
    }

    #[test]
    fn test_shadow_views_bounded_by_capacity() {
        let config = RendererConfig::default();
        let mut scene = Scene::new();
        let m = scene.add_material(Material::default());
        scene.add_node(Transform::default(), Some(cube(m)), None);
        // Two directional lights would need eight cascades, plus point lights
        scene.add_light(Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0));
        scene.add_light(Light::directional(Vec3::new(1.0, -1.0, 0.0), Vec3::ONE, 1.0));
        for i in 0..4 {
            scene.add_light(Light::point(Vec3::new(i as f32, 1.0, 0.0), 0.5, 2.0, Vec3::ONE, 1.0));
        }

        let mut pool = pool(&config);
        let frame = pool.begin_frame().unwrap();
        FrameBuilder::new(&config).build(frame, &scene, &camera());

        assert_eq!(frame.uniforms().shadow_count as usize, MAX_SHADOWS);
        assert_eq!(frame.views().len(), 1 + MAX_SHADOWS);
        // Point lights rank after both directional lights and get no views
        for index in 2..6 {
            assert_eq!(frame.lights().read(index).unwrap().shadow_views.x, NO_SHADOW_VIEW);
        }
    }

    #[test]
    fn test_spot_and_point_shadow_views() {
        let config = RendererConfig::default();
        let mut scene = Scene::new();
        scene.add_light(Light::spot(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y, 10.0, 0.5, Vec3::ONE, 1.0));
        scene.add_light(Light::point(Vec3::new(0.0, 1.0, -5.0), 1.0, 4.0, Vec3::ONE, 1.0));

        let mut pool = pool(&config);
        let frame = pool.begin_frame().unwrap();
        FrameBuilder::new(&config).build(frame, &scene, &camera());

        let shadows: Vec<_> = frame.views().shadow_views().collect();
        assert_eq!(shadows.len(), 2);
        // Spot is nearer to the camera than the point light
        let first = shadows[0].camera();
        let second = shadows[1].camera();
        assert!(!first.is_point());
        assert!(second.is_point());
        assert_eq!(second.projection().far(), 5.0);
    }

    #[test]
    fn test_dropped_material_drops_instance() {
        let config = RendererConfig::default().with_max_materials(1);
        let mut scene = Scene::new();
        let a = scene.add_material(Material::new("a"));
        let b = scene.add_material(Material::new("b"));
        scene.add_node(Transform::default(), Some(cube(a)), None);
        scene.add_node(Transform::default(), Some(cube(b)), None);

        let mut pool = pool(&config);
        let frame = pool.begin_frame().unwrap();
        FrameBuilder::new(&config).build(frame, &scene, &camera());

        assert_eq!(frame.stats().materials_dropped, 1);
        assert_eq!(frame.stats().instances_dropped, 1);
        assert_eq!(frame.stats().instances_written, 1);
    }

    #[test]
    fn test_produce_skips_when_pool_is_full() {
        let config = RendererConfig::default().with_frames_in_flight(2);
        let scene = Scene::new();
        let mut pool = pool(&config);
        let builder = FrameBuilder::new(&config);

        assert!(builder.produce(&mut pool, &scene, &camera()));
        assert!(builder.produce(&mut pool, &scene, &camera()));
        assert!(!builder.produce(&mut pool, &scene, &camera()));
        assert_eq!(pool.in_flight(), 1);
    }
}
