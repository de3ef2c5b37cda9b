//! End-to-end tests: scene -> FrameBuilder -> FramePool -> FrameRenderer -> RecordingDriver

#![cfg(feature = "recording")]

mod common;

use common::{camera, cube, init_logger, multi_material, small_config};
use frame_pipeline::backend::{
    BufferHandle, ComputePipelineDescriptor, DriverCommand, PipelineHandle, TextureHandle, VideoDriver,
};
use frame_pipeline::frame::{FrameUniforms, MAX_SHADOWS};
use frame_pipeline::pipeline::light_culling::FRAME_UNIFORMS_BINDING;
use frame_pipeline::scene::{AlphaMode, Camera, GpuMaterial, Light, Material, Scene, Transform, TransformBlock};
use frame_pipeline::shadow::select_shadow_candidates;
use frame_pipeline::{
    CullingMode, FrameBuilder, FramePool, FrameRenderer, FrameState, LightCullingPass, RecordingDriver,
    RendererConfig,
};
use glam::{Vec3, Vec4};
use rstest::rstest;

fn opaque_scene() -> Scene {
    let mut scene = Scene::new();
    let m = scene.add_material(Material::new("stone"));
    scene.add_node(Transform::default(), Some(cube(1, m)), None);
    scene.add_light(Light::point(Vec3::new(0.0, 2.0, 0.0), 0.5, 3.0, Vec3::ONE, 5.0));
    scene
}

#[test]
fn test_three_slot_pool_refuses_fourth_begin() {
    init_logger();
    let config = RendererConfig::default().with_frames_in_flight(3);
    let mut pool = FramePool::new(&config, 256).unwrap();

    assert!(pool.begin_frame().is_some());
    assert!(pool.begin_frame().is_some());
    assert!(pool.begin_frame().is_some());
    assert!(pool.begin_frame().is_none());
    assert!(pool.in_flight() < pool.frames_in_flight() as u64);
}

#[test]
fn test_directional_light_ranks_before_point_light() {
    let main = Camera::perspective(Vec3::ZERO, Vec3::NEG_Z, 60.0, 1.0, 0.1, 100.0);
    let lights = [
        Light::point(Vec3::new(0.0, 0.0, -10.0), 0.5, 2.0, Vec3::ONE, 1.0),
        Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0),
    ];

    let selection = select_shadow_candidates(&lights, &main, MAX_SHADOWS);
    let candidates = selection.candidates.as_slice();
    assert_eq!(selection.visible, vec![0, 1]);
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].light_index, 1);
    assert_eq!(candidates[0].distance_sq, 0.0);
    assert_eq!(candidates[1].light_index, 0);
    assert!((candidates[1].distance_sq - 100.0).abs() < 1e-3);
}

#[test]
fn test_material_table_overflow_keeps_first_entries() {
    init_logger();
    let config = RendererConfig::default();
    assert_eq!(config.max_materials, 1024);

    let mut scene = Scene::new();
    for i in 0..1025 {
        scene.add_material(Material::new("m").with_base_color(Vec4::new(i as f32, 0.0, 0.0, 1.0)));
    }
    // References the material that cannot be stored
    scene.add_node(Transform::default(), Some(cube(1, 1024)), None);
    scene.add_node(Transform::default(), Some(cube(2, 1023)), None);

    let mut pool = FramePool::new(&config, 256).unwrap();
    let frame = pool.begin_frame().unwrap();
    FrameBuilder::new(&config).build(frame, &scene, &camera());

    assert_eq!(frame.materials().len(), 1024);
    assert_eq!(frame.stats().materials_dropped, 1);
    for (i, material) in scene.materials().iter().take(1024).enumerate() {
        assert_eq!(frame.materials().read(i as u32), Some(material.to_gpu_data()));
    }
    assert_eq!(frame.write_material(&Material::new("late")), None);

    assert_eq!(frame.stats().instances_dropped, 1);
    assert_eq!(frame.stats().instances_written, 1);
    assert_eq!(frame.primitives(0)[0].material, 1023);
}

#[test]
fn test_instance_outside_every_view_is_in_no_list() {
    let config = RendererConfig::default();
    let mut scene = opaque_scene();
    let m = 0;
    scene.add_node(Transform::from_position(Vec3::new(0.0, 0.0, 500.0)), Some(cube(2, m)), None);
    scene.add_node(Transform::from_position(Vec3::new(-400.0, 0.0, 0.0)), Some(cube(3, m)), None);

    let mut pool = FramePool::new(&config, 256).unwrap();
    let frame = pool.begin_frame().unwrap();
    FrameBuilder::new(&config).build(frame, &scene, &camera());

    assert_eq!(frame.view_bits(Vec3::new(0.0, 0.0, 500.0), 0.87), 0);
    assert_eq!(frame.stats().instances_culled, 2);
    assert_eq!(frame.instance_entries().len(), 1);
    for view in frame.views().views() {
        assert!(view.list().as_slice().iter().all(|&index| index == 0));
    }
}

#[test]
fn test_view_lists_are_partitioned_by_opacity() {
    let config = RendererConfig::default();
    let mut scene = Scene::new();
    let stone = scene.add_material(Material::new("stone"));
    let foliage = scene.add_material(Material::new("foliage").with_alpha_mode(AlphaMode::Mask { cutoff: 0.5 }));
    let glass = scene.add_material(Material::new("glass").with_alpha_mode(AlphaMode::Blend));
    scene.add_light(Light::directional(Vec3::new(0.3, -1.0, -0.2), Vec3::ONE, 2.0));

    for i in 0..24u32 {
        let instance = match i % 4 {
            0 => cube(i, stone),
            1 => cube(i, glass),
            2 => multi_material(i, &[stone, glass]),
            _ => multi_material(i, &[stone, foliage]),
        };
        let position = Vec3::new((i % 6) as f32 * 2.0 - 5.0, 0.0, -((i / 6) as f32) * 2.0);
        scene.add_node(Transform::from_position(position), Some(instance), None);
    }

    let mut pool = FramePool::new(&config, 256).unwrap();
    let frame = pool.begin_frame().unwrap();
    FrameBuilder::new(&config).build(frame, &scene, &camera());

    let main = frame.views().main_view().unwrap();
    assert_eq!(main.list().len(), 24);
    assert_eq!(main.list().opaque_count(), 12);

    for view in frame.views().views() {
        let list = view.list();
        assert_eq!(list.opaque_count() + list.transparent_count(), list.len());
        for &index in list.opaque() {
            assert!(frame.instance_entry(index).unwrap().opaque);
        }
        for &index in list.transparent() {
            assert!(!frame.instance_entry(index).unwrap().opaque);
        }
        // Opaque keep submission order; transparent are prepended
        assert!(list.opaque().windows(2).all(|w| w[0] < w[1]));
        assert!(list.transparent().windows(2).all(|w| w[0] > w[1]));
    }
}

#[rstest]
#[case::alignment_16(16)]
#[case::alignment_256(256)]
fn test_draw_offsets_address_uploaded_blocks(#[case] alignment: u64) {
    init_logger();
    let mut driver = RecordingDriver::new().with_uniform_alignment(alignment);
    let log = driver.log();
    let config = small_config();
    let mut renderer = FrameRenderer::new(&mut driver, &config).unwrap();
    let mut pool = renderer.create_pool().unwrap();

    let mut scene = Scene::new();
    let positions: Vec<Vec3> = (0..5).map(|i| Vec3::new(i as f32 - 2.0, 0.0, -(i as f32))).collect();
    for (i, position) in positions.iter().enumerate() {
        let material = scene.add_material(Material::new("m").with_base_color(Vec4::new(i as f32, 0.5, 0.25, 1.0)));
        scene.add_node(Transform::from_position(*position), Some(cube(i as u32, material)), None);
    }

    assert!(FrameBuilder::new(&config).produce(&mut pool, &scene, &camera()));
    assert_eq!(renderer.render_pending(&mut driver, &mut pool).unwrap(), 1);

    let draws: Vec<_> = log
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            DriverCommand::Draw(draw) if draw.view == 0 => Some(draw),
            _ => None,
        })
        .collect();
    assert_eq!(draws.len(), positions.len());

    for draw in draws {
        let i = draw.mesh.0 as usize;

        let instances = driver.buffer_contents(draw.instance_buffer).unwrap();
        let start = draw.instance_offset as usize;
        assert_eq!(start as u64 % alignment, 0);
        let block: TransformBlock =
            bytemuck::pod_read_unaligned(&instances[start..start + std::mem::size_of::<TransformBlock>()]);
        assert_eq!(block.model.w_axis, positions[i].extend(1.0));

        let materials = driver.buffer_contents(draw.material_buffer).unwrap();
        let start = draw.material_offset as usize;
        let material: GpuMaterial =
            bytemuck::pod_read_unaligned(&materials[start..start + std::mem::size_of::<GpuMaterial>()]);
        assert_eq!(material.base_color.x, i as f32);
    }
}

#[test]
fn test_shadow_passes_precede_main_view() {
    init_logger();
    let mut driver = RecordingDriver::new();
    let log = driver.log();
    let config = small_config();
    let mut renderer = FrameRenderer::new(&mut driver, &config).unwrap();
    let mut pool = renderer.create_pool().unwrap();

    let mut scene = opaque_scene();
    scene.add_light(Light::directional(Vec3::new(0.2, -1.0, -0.4), Vec3::ONE, 3.0));
    scene.add_light(Light::spot(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y, 10.0, 0.5, Vec3::ONE, 4.0));

    FrameBuilder::new(&config).produce(&mut pool, &scene, &camera());
    log.clear();
    renderer.render_pending(&mut driver, &mut pool).unwrap();

    // Directional (four cascades), then point and spot by distance
    let passes: Vec<(Option<String>, Option<TextureHandle>)> = log
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            DriverCommand::BeginPass(desc) => Some((desc.label, desc.depth.map(|(texture, _)| texture))),
            _ => None,
        })
        .collect();
    let labels: Vec<_> = passes.iter().map(|(label, _)| label.clone().unwrap()).collect();
    assert_eq!(
        labels,
        vec![
            "Shadow View 1",
            "Shadow View 2",
            "Shadow View 3",
            "Shadow View 4",
            "Shadow View 5",
            "Shadow View 6",
            "Main View"
        ]
    );
    for (i, (_, depth)) in passes.iter().take(6).enumerate() {
        assert_eq!(*depth, Some(renderer.shadow_maps()[i]));
    }

    // Every draw inside a pass belongs to that pass's view
    let mut current_view = None;
    for command in log.commands() {
        match command {
            DriverCommand::BeginPass(desc) => {
                let label = desc.label.unwrap();
                current_view = Some(match label.strip_prefix("Shadow View ") {
                    Some(id) => id.parse::<u32>().unwrap(),
                    None => 0,
                });
            }
            DriverCommand::EndPass => current_view = None,
            DriverCommand::Draw(draw) => assert_eq!(Some(draw.view), current_view),
            _ => {}
        }
    }
}

#[test]
fn test_frames_are_consumed_in_order() {
    init_logger();
    let mut driver = RecordingDriver::new();
    let config = small_config().with_frames_in_flight(3);
    let mut renderer = FrameRenderer::new(&mut driver, &config).unwrap();
    let mut pool = renderer.create_pool().unwrap();
    let builder = FrameBuilder::new(&config);
    let scene = opaque_scene();

    let mut produced = Vec::new();
    let mut rendered = Vec::new();
    let mut seed = 0x2545_f491_u32;

    for step in 0..500u32 {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;

        if seed % 3 != 0 {
            let mut view = camera();
            view.set_position(Vec3::new(step as f32, 2.0, 10.0));
            if builder.produce(&mut pool, &scene, &view) {
                produced.push(step);
            }
        } else if let Some(frame) = pool.acquire_frame() {
            rendered.push(frame.uniforms().view_position.x as u32);
            renderer.apply(&mut driver, frame).unwrap();
            renderer.render(&mut driver, frame).unwrap();
            assert_eq!(frame.state(), FrameState::Retired);
            pool.release_frame();
        }
        assert!(pool.in_flight() < pool.frames_in_flight() as u64);
    }

    assert!(!rendered.is_empty());
    assert_eq!(rendered[..], produced[..rendered.len()]);
    let remaining = renderer.render_pending(&mut driver, &mut pool).unwrap();
    assert!(produced.len() - rendered.len() - remaining <= 1);
    pool.drain();
    assert!(pool.frames().iter().all(|f| f.state() == FrameState::Retired));
}

#[test]
#[should_panic(expected = "illegal frame transition")]
fn test_render_requires_apply() {
    let mut driver = RecordingDriver::new();
    let config = small_config();
    let mut renderer = FrameRenderer::new(&mut driver, &config).unwrap();
    let mut pool = renderer.create_pool().unwrap();
    FrameBuilder::new(&config).produce(&mut pool, &opaque_scene(), &camera());

    let frame = pool.acquire_frame().unwrap();
    let _ = renderer.render(&mut driver, frame);
}

#[test]
fn test_resize_rebinds_tile_buffer_to_consumers() {
    init_logger();
    let mut driver = RecordingDriver::new();
    let log = driver.log();
    let config = small_config();
    let mut renderer = FrameRenderer::new(&mut driver, &config).unwrap();

    let shading: PipelineHandle = driver
        .create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("Forward Shading".into()),
            shader: String::new(),
            entry_point: "main".into(),
        })
        .unwrap();
    renderer.register_tile_consumer(&mut driver, shading, 3);
    let old: BufferHandle = renderer.light_culling().tile_buffer().unwrap();

    log.clear();
    renderer.resize(&mut driver, 1920, 1080).unwrap();
    let new = renderer.light_culling().tile_buffer().unwrap();
    assert_ne!(old, new);
    assert_eq!(renderer.light_culling().tiles(), (60, 34));

    let commands = log.commands();
    assert!(commands.contains(&DriverCommand::DestroyBuffer(old)));
    let rebound = commands.iter().any(|c| {
        matches!(c, DriverCommand::BindBuffer { pipeline, binding: 3, buffer, range }
            if *pipeline == shading
                && *buffer == new
                && range.size == LightCullingPass::tile_buffer_size((60, 34), config.max_lights_per_tile))
    });
    assert!(rebound);
    assert_eq!(renderer.size(), (1920, 1080));
}

#[test]
fn test_culling_falls_back_when_tile_buffer_fails() {
    init_logger();
    // Every per-slot table fits, the 40x23 tile buffer does not
    let mut driver = RecordingDriver::new().with_max_buffer_size(100_000);
    let log = driver.log();
    let config = small_config();
    let mut renderer = FrameRenderer::new(&mut driver, &config).unwrap();
    assert_eq!(renderer.culling_mode(), CullingMode::Disabled);

    let mut pool = renderer.create_pool().unwrap();
    FrameBuilder::new(&config).produce(&mut pool, &opaque_scene(), &camera());
    log.clear();
    assert_eq!(renderer.render_pending(&mut driver, &mut pool).unwrap(), 1);

    let commands = log.commands();
    assert!(!commands.iter().any(|c| matches!(c, DriverCommand::Dispatch { .. })));
    assert!(commands.iter().any(|c| matches!(c, DriverCommand::Draw(_))));

    let uniforms_buffer = commands
        .iter()
        .find_map(|c| match c {
            DriverCommand::BindBuffer { binding, buffer, .. } if *binding == FRAME_UNIFORMS_BINDING => Some(*buffer),
            _ => None,
        })
        .unwrap();
    let uniforms: FrameUniforms = bytemuck::pod_read_unaligned(driver.buffer_contents(uniforms_buffer).unwrap());
    assert_eq!(uniforms.tile_size, 0);
    assert_eq!(uniforms.screen_size, [1280, 720]);
    assert_eq!(uniforms.light_count, 1);

    // Memory frees up; the next resize restores tiled culling
    driver.set_max_buffer_size(None);
    renderer.resize(&mut driver, 800, 600).unwrap();
    assert_eq!(renderer.culling_mode(), CullingMode::Tiled);
    FrameBuilder::new(&config).produce(&mut pool, &opaque_scene(), &camera());
    log.clear();
    renderer.render_pending(&mut driver, &mut pool).unwrap();
    assert_eq!(log.count(|c| matches!(c, DriverCommand::Dispatch { x: 25, y: 19, .. })), 1);
}

#[test]
fn test_drain_discards_unrendered_frames() {
    let mut driver = RecordingDriver::new();
    let config = small_config();
    let renderer = FrameRenderer::new(&mut driver, &config).unwrap();
    let mut pool = renderer.create_pool().unwrap();
    let builder = FrameBuilder::new(&config);

    while builder.produce(&mut pool, &opaque_scene(), &camera()) {}
    assert_eq!(pool.in_flight(), 2);
    assert!(pool.has_pending());

    assert_eq!(pool.drain(), 3);
    assert_eq!(pool.in_flight(), 0);
    assert!(pool.frames().iter().all(|f| f.state() == FrameState::Retired));
    assert!(pool.begin_frame().is_some());

    renderer.destroy(&mut driver);
    assert_eq!(driver.live_buffers(), 0);
}
