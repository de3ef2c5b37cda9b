//! Frames: the unit of hand-off between the producer and the consumer.
//!
//! A [`Frame`] holds every table the GPU reads for one rendered image:
//! padded material and instance tables, a packed light table, the active
//! views with their partitioned instance lists, and the frame uniform block.
//! Frames cycle through [`FrameState`] inside a [`FramePool`]:
//!
//! ```text
//! Building ──► Finalized ──► Applied ──► Rendering ──► Retired
//!    ▲                                                   │
//!    └──────────────────── begin_frame ◄─────────────────┘
//! ```
//!
//! While `Building` the frame is mutable and owned by the producer. Once
//! `Finalized` the table lengths are frozen and only the consumer touches it.
//! Any write attempted outside `Building` is a programming error and panics.

mod pool;
pub mod uniforms;
pub mod view;
pub mod writer;

pub use pool::FramePool;
pub use uniforms::{FrameUniforms, ViewUniforms, MAX_SHADOWS};
pub use view::{get_view_bits, View, ViewCatalog, ViewList, MAX_VIEW_BITS};
pub use writer::{align_up, padded_offset, padded_stride, BufferWriter};

use crate::error::Result;
use crate::scene::{Camera, GpuLight, GpuMaterial, Instance, Light, Material, Primitive, TransformBlock};
use crate::RendererConfig;

/// Lifecycle state of a frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameState {
    /// CPU-owned, tables are being written
    Building,
    /// Traversal complete; tables frozen
    Finalized,
    /// Tables uploaded to the GPU
    Applied,
    /// Passes are being recorded
    Rendering,
    /// Slot free for reuse
    Retired,
}

/// Per-frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub instances_visited: u32,
    pub instances_culled: u32,
    pub instances_written: u32,
    pub instances_dropped: u32,
    pub materials_dropped: u32,
    pub lights_dropped: u32,
    pub views_dropped: u32,
    /// Instance indices a full view list could not take
    pub list_entries_dropped: u32,
    pub shadow_views: u32,
    pub vertices_submitted: u64,
}

impl FrameStats {
    /// Total items dropped because some table was full
    pub fn total_dropped(&self) -> u32 {
        self.instances_dropped
            + self.materials_dropped
            + self.lights_dropped
            + self.views_dropped
            + self.list_entries_dropped
    }
}

/// CPU-side record of a written instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceEntry {
    /// Range into [`Frame::primitives`]
    pub first_primitive: u32,
    pub primitive_count: u32,
    pub skinned: bool,
    /// Views this instance was assigned to
    pub view_mask: u32,
    /// Every referenced material is opaque
    pub opaque: bool,
}

/// One slot of the frame ring.
#[derive(Debug)]
pub struct Frame {
    slot: usize,
    state: FrameState,
    materials: BufferWriter<GpuMaterial>,
    instances: BufferWriter<TransformBlock>,
    entries: Vec<InstanceEntry>,
    primitives: Vec<Primitive>,
    lights: BufferWriter<GpuLight>,
    views: ViewCatalog,
    uniforms: FrameUniforms,
    stats: FrameStats,
}

impl Frame {
    /// Allocate a frame with the capacities from `config`.
    ///
    /// `alignment` is the driver's minimum uniform block alignment and sets
    /// the stride of the material and instance tables.
    pub fn new(slot: usize, config: &RendererConfig, alignment: u64) -> Result<Self> {
        Ok(Self {
            slot,
            state: FrameState::Retired,
            materials: BufferWriter::padded("materials", config.max_materials, alignment)?,
            instances: BufferWriter::padded("instances", config.max_instances, alignment)?,
            entries: Vec::with_capacity(config.max_instances as usize),
            primitives: Vec::new(),
            lights: BufferWriter::packed("lights", config.max_lights),
            views: ViewCatalog::new(config.max_views, config.max_instances as usize)?,
            uniforms: FrameUniforms::default(),
            stats: FrameStats::default(),
        })
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn is_building(&self) -> bool {
        self.state == FrameState::Building
    }

    fn assert_building(&self, operation: &str) {
        assert!(
            self.is_building(),
            "{operation} on frame slot {} in state {:?}",
            self.slot,
            self.state
        );
    }

    // ---- Producer API ----

    /// Append a material, returning its index or `None` when the table is full.
    pub fn write_material(&mut self, material: &Material) -> Option<u32> {
        self.assert_building("write_material");
        let index = self.materials.write(&material.to_gpu_data());
        if index.is_none() {
            self.stats.materials_dropped += 1;
        }
        index
    }

    /// Append an instance and add it to every view selected by `view_mask`.
    ///
    /// The instance is opaque when every material it references is opaque.
    /// Opaque instances extend each view's opaque run; the rest go to the
    /// front of the transparent run.
    ///
    /// Returns the instance index, or `None` when the instance table is full.
    ///
    /// # Panics
    ///
    /// Panics if a primitive references a material that has not been
    /// written to this frame yet.
    pub fn write_instance(&mut self, instance: &Instance, transform: &TransformBlock, view_mask: u32) -> Option<u32> {
        self.assert_building("write_instance");

        let mut opaque = true;
        for primitive in &instance.primitives {
            let Some(material) = self.materials.read(primitive.material) else {
                panic!(
                    "instance references material {} but only {} materials were written",
                    primitive.material,
                    self.materials.len()
                );
            };
            opaque &= material.is_opaque();
        }

        let Some(index) = self.instances.write(transform) else {
            self.stats.instances_dropped += 1;
            return None;
        };

        self.entries.push(InstanceEntry {
            first_primitive: self.primitives.len() as u32,
            primitive_count: instance.primitives.len() as u32,
            skinned: instance.skinned,
            view_mask,
            opaque,
        });
        self.primitives.extend_from_slice(&instance.primitives);

        let dropped = self.views.append_instance(index, opaque, view_mask);
        self.stats.list_entries_dropped += dropped as u32;
        self.stats.instances_written += 1;
        self.stats.vertices_submitted += instance.vertex_count();
        Some(index)
    }

    /// Append a light to the light table.
    pub fn write_light(&mut self, light: &Light) -> Option<u32> {
        self.assert_building("write_light");
        let index = self.lights.write(&light.to_gpu_data());
        if index.is_none() {
            self.stats.lights_dropped += 1;
        }
        index
    }

    /// Add a view; its index is also its bit in view masks.
    pub fn add_view(&mut self, camera: Camera) -> Option<u32> {
        self.assert_building("add_view");
        let index = self.views.add_view(camera);
        if index.is_none() {
            self.stats.views_dropped += 1;
        }
        index
    }

    /// Bitmask of the views that can see a world-space sphere.
    pub fn view_bits(&self, center: glam::Vec3, radius: f32) -> u32 {
        self.views.get_view_bits(center, radius)
    }

    pub fn uniforms_mut(&mut self) -> &mut FrameUniforms {
        self.assert_building("uniforms_mut");
        &mut self.uniforms
    }

    pub fn stats_mut(&mut self) -> &mut FrameStats {
        &mut self.stats
    }

    // ---- Consumer API ----

    pub fn materials(&self) -> &BufferWriter<GpuMaterial> {
        &self.materials
    }

    pub fn instances(&self) -> &BufferWriter<TransformBlock> {
        &self.instances
    }

    pub fn instance_entries(&self) -> &[InstanceEntry] {
        &self.entries
    }

    pub fn instance_entry(&self, index: u32) -> Option<&InstanceEntry> {
        self.entries.get(index as usize)
    }

    /// Primitives of the instance at `index`
    pub fn primitives(&self, index: u32) -> &[Primitive] {
        match self.entries.get(index as usize) {
            Some(entry) => {
                let start = entry.first_primitive as usize;
                &self.primitives[start..start + entry.primitive_count as usize]
            }
            None => &[],
        }
    }

    pub fn lights(&self) -> &BufferWriter<GpuLight> {
        &self.lights
    }

    pub fn views(&self) -> &ViewCatalog {
        &self.views
    }

    pub fn uniforms(&self) -> &FrameUniforms {
        &self.uniforms
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    // ---- State transitions ----

    /// Reset every table and enter `Building`.
    ///
    /// # Panics
    ///
    /// Panics unless the slot is `Retired`.
    pub(crate) fn begin(&mut self) {
        assert_eq!(
            self.state,
            FrameState::Retired,
            "frame slot {} reused before it was retired",
            self.slot
        );
        self.materials.reset();
        self.instances.reset();
        self.entries.clear();
        self.primitives.clear();
        self.lights.reset();
        self.views.clear();
        self.uniforms = FrameUniforms::default();
        self.stats = FrameStats::default();
        self.state = FrameState::Building;
    }

    /// Freeze the tables. Called by the pool when the frame is published.
    pub(crate) fn finalize(&mut self) {
        self.transition(FrameState::Building, FrameState::Finalized);
        log::debug!(
            "Frame slot {} finalized: {} instances, {} materials, {} lights, {} views, {} dropped",
            self.slot,
            self.instances.len(),
            self.materials.len(),
            self.lights.len(),
            self.views.len(),
            self.stats.total_dropped()
        );
    }

    /// Record that the tables have been uploaded.
    ///
    /// # Panics
    ///
    /// Panics unless the frame is `Finalized`, so a frame can be applied once.
    pub fn mark_applied(&mut self) {
        self.transition(FrameState::Finalized, FrameState::Applied);
    }

    /// # Panics
    ///
    /// Panics unless the frame is `Applied`.
    pub fn begin_render(&mut self) {
        self.transition(FrameState::Applied, FrameState::Rendering);
    }

    /// Give the slot back to the pool.
    ///
    /// Frames may be retired without rendering (for example when drained at
    /// shutdown) but never while still `Building`.
    pub fn retire(&mut self) {
        assert!(
            !matches!(self.state, FrameState::Building | FrameState::Retired),
            "cannot retire frame slot {} in state {:?}",
            self.slot,
            self.state
        );
        self.state = FrameState::Retired;
    }

    fn transition(&mut self, from: FrameState, to: FrameState) {
        assert_eq!(
            self.state, from,
            "illegal frame transition to {to:?} on slot {}",
            self.slot
        );
        self.state = to;
    }
}
