//! Headless frame loop on the recording driver
//!
//! Run with:
//!   cargo run --example headless
//!   cargo run --example headless -- --frames 240 --instances 2000 --lights 64 --gpu-lag 2
//!
//! The producer builds a frame every iteration while the consumer only
//! renders every `--gpu-lag` iterations, so the pool fills up and the
//! producer starts skipping frames instead of blocking.

use clap::Parser;
use frame_pipeline::{
    backend::{DriverCommand, MeshHandle},
    scene::{AlphaMode, BoundingSphere, Camera, Instance, Light, Material, Primitive, Scene, Transform},
    CullingMode, FrameBuilder, FrameRenderer, RecordingDriver, RendererConfig,
};
use glam::{Quat, Vec3, Vec4};

#[derive(Parser, Debug)]
#[command(about = "Run the frame pipeline without a GPU")]
struct Args {
    /// Number of producer iterations
    #[arg(long, default_value_t = 120)]
    frames: u32,
    #[arg(long, default_value_t = 1280)]
    width: u32,
    #[arg(long, default_value_t = 720)]
    height: u32,
    /// Instances laid out on a square grid
    #[arg(long, default_value_t = 400)]
    instances: u32,
    /// Point and spot lights besides the sun
    #[arg(long, default_value_t = 16)]
    lights: u32,
    /// Frame slots in the pool
    #[arg(long, default_value_t = 3)]
    frames_in_flight: usize,
    /// Consumer renders once every N iterations
    #[arg(long, default_value_t = 1)]
    gpu_lag: u32,
    /// Tile buffer allocation limit in bytes, to exercise the culling fallback
    #[arg(long)]
    max_buffer_size: Option<u64>,
}

fn build_scene(instances: u32, lights: u32) -> Scene {
    let mut scene = Scene::new();

    let opaque = scene.add_material(Material::new("ground").with_base_color(Vec4::new(0.6, 0.6, 0.6, 1.0)));
    let metal = scene.add_material(
        Material::new("metal")
            .with_metallic(1.0)
            .with_roughness(0.3),
    );
    let glass = scene.add_material(
        Material::new("glass")
            .with_base_color(Vec4::new(0.8, 0.9, 1.0, 0.3))
            .with_alpha_mode(AlphaMode::Blend),
    );

    let side = (instances as f32).sqrt().ceil().max(1.0) as u32;
    let spacing = 3.0;
    let offset = (side - 1) as f32 * spacing * 0.5;
    let root = scene.add_node(Transform::default(), None, None);

    for i in 0..instances {
        let (x, z) = (i % side, i / side);
        let material = match i % 7 {
            0 => glass,
            1 | 2 => metal,
            _ => opaque,
        };
        let instance = Instance::new(
            vec![Primitive {
                mesh: MeshHandle(i % 4),
                material,
                vertex_count: 36,
            }],
            BoundingSphere::new(Vec3::ZERO, 0.87),
        );
        let transform = Transform::from_position_rotation(
            Vec3::new(x as f32 * spacing - offset, 0.5, z as f32 * spacing - offset),
            Quat::from_rotation_y(i as f32 * 0.3),
        );
        scene.add_node(transform, Some(instance), Some(root));
    }

    scene.add_light(Light::ambient(Vec3::splat(0.1), 1.0));
    scene.add_light(Light::directional(Vec3::new(-0.3, -1.0, -0.2), Vec3::new(1.0, 0.95, 0.9), 3.0));
    for i in 0..lights {
        let angle = i as f32 / lights.max(1) as f32 * std::f32::consts::TAU;
        let position = Vec3::new(angle.cos() * offset.max(4.0), 3.0, angle.sin() * offset.max(4.0));
        let color = Vec3::new(angle.cos() * 0.5 + 0.5, 0.6, angle.sin() * 0.5 + 0.5);
        if i % 4 == 0 {
            scene.add_light(Light::spot(position, Vec3::new(0.0, -1.0, 0.1), 10.0, 0.5, color, 20.0));
        } else {
            scene.add_light(Light::point(position, 0.1, 8.0, color, 10.0));
        }
    }
    scene
}

fn main() -> frame_pipeline::Result<()> {
    frame_pipeline::init_logging();
    let args = Args::parse();

    let config = RendererConfig::default()
        .with_size(args.width, args.height)
        .with_frames_in_flight(args.frames_in_flight)
        .with_max_instances(args.instances.max(1));

    let mut driver = RecordingDriver::new();
    let log = driver.log();
    let mut renderer = FrameRenderer::new(&mut driver, &config)?;
    let mut pool = renderer.create_pool()?;
    let builder = FrameBuilder::new(&config);
    let scene = build_scene(args.instances, args.lights);

    if let Some(limit) = args.max_buffer_size {
        driver.set_max_buffer_size(Some(limit));
        // Force a reallocation of the tile buffer under the new limit
        renderer.resize(&mut driver, args.width + 1, args.height)?;
        renderer.resize(&mut driver, args.width, args.height)?;
    }
    if renderer.culling_mode() == CullingMode::Disabled {
        println!("Tiled light culling unavailable, shading every light per tile");
    }

    let mut camera = Camera::perspective(
        Vec3::new(0.0, 8.0, 20.0),
        Vec3::new(0.0, -0.35, -1.0),
        60.0,
        args.width as f32 / args.height as f32,
        0.1,
        200.0,
    );

    let mut produced = 0u32;
    let mut skipped = 0u32;
    let mut rendered = 0usize;
    let mut dropped = 0u32;
    let mut written = 0u32;

    for iteration in 0..args.frames {
        let angle = iteration as f32 * 0.02;
        camera.set_position(Vec3::new(angle.sin() * 20.0, 8.0, angle.cos() * 20.0));
        camera.look_at(Vec3::ZERO);

        if builder.produce(&mut pool, &scene, &camera) {
            produced += 1;
        } else {
            skipped += 1;
        }

        if iteration % args.gpu_lag.max(1) == 0 {
            while let Some(frame) = pool.acquire_frame() {
                dropped += frame.stats().total_dropped();
                written += frame.stats().instances_written;
                renderer.apply(&mut driver, frame)?;
                renderer.render(&mut driver, frame)?;
                pool.release_frame();
                rendered += 1;
            }
        }
    }

    // Flush whatever is still published
    rendered += renderer.render_pending(&mut driver, &mut pool)?;
    let discarded = pool.drain();

    let draws = log.count(|c| matches!(c, DriverCommand::Draw(_)));
    let dispatches = log.count(|c| matches!(c, DriverCommand::Dispatch { .. }));
    let passes = log.count(|c| matches!(c, DriverCommand::BeginPass(_)));

    println!("Frames produced:   {produced} ({skipped} skipped on a full pool)");
    println!("Frames rendered:   {rendered} ({discarded} discarded at shutdown)");
    println!("Instances written: {written} ({dropped} items dropped on full tables)");
    println!("Render passes:     {passes}");
    println!("Draw calls:        {draws}");
    println!("Culling dispatches {dispatches} ({:?})", renderer.culling_mode());

    renderer.destroy(&mut driver);
    Ok(())
}
