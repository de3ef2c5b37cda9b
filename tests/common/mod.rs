//! Shared fixtures for the integration tests

#![allow(dead_code)]

use frame_pipeline::backend::MeshHandle;
use frame_pipeline::scene::{BoundingSphere, Camera, Instance, Primitive};
use frame_pipeline::RendererConfig;
use glam::Vec3;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Small tables so every buffer fits comfortably under allocation limits
pub fn small_config() -> RendererConfig {
    RendererConfig::default()
        .with_max_instances(64)
        .with_max_materials(16)
        .with_max_lights(16)
        .with_shadow_map_size(256)
}

pub fn camera() -> Camera {
    Camera::perspective(Vec3::new(0.0, 2.0, 10.0), Vec3::NEG_Z, 60.0, 16.0 / 9.0, 0.1, 100.0)
}

/// Unit cube with a single primitive
pub fn cube(mesh: u32, material: u32) -> Instance {
    Instance::new(
        vec![Primitive {
            mesh: MeshHandle(mesh),
            material,
            vertex_count: 36,
        }],
        BoundingSphere::new(Vec3::ZERO, 0.87),
    )
}

/// Instance drawn with several materials, one primitive each
pub fn multi_material(mesh: u32, materials: &[u32]) -> Instance {
    Instance::new(
        materials
            .iter()
            .map(|&material| Primitive {
                mesh: MeshHandle(mesh),
                material,
                vertex_count: 6,
            })
            .collect(),
        BoundingSphere::new(Vec3::ZERO, 1.0),
    )
}
