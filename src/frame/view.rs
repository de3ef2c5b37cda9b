//! Views and bitmask view assignment.
//!
//! Every active view (the main camera plus any shadow views) owns a bit in a
//! `u32` mask. An instance is tested once per view with its bounding sphere
//! and the resulting mask decides which view lists receive its index.

use glam::Vec3;

use super::uniforms::ViewUniforms;
use crate::error::{RendererError, Result};
use crate::scene::Camera;

/// Width of the view bitmask, and so the hard limit on simultaneous views.
pub const MAX_VIEW_BITS: usize = u32::BITS as usize;

/// Instance indices for one view: an opaque run followed by a transparent run.
#[derive(Debug, Clone, Default)]
pub struct ViewList {
    indices: Vec<u32>,
    opaque_count: usize,
    capacity: usize,
}

impl ViewList {
    pub fn new(capacity: usize) -> Self {
        Self {
            indices: Vec::with_capacity(capacity),
            opaque_count: 0,
            capacity,
        }
    }

    /// Add an instance index. Opaque indices extend the opaque run;
    /// transparent indices go to the front of the transparent run.
    ///
    /// Returns `false` (and drops the index) when the list is full.
    pub fn push(&mut self, index: u32, opaque: bool) -> bool {
        if self.indices.len() >= self.capacity {
            return false;
        }
        // Both cases insert at the run boundary
        self.indices.insert(self.opaque_count, index);
        if opaque {
            self.opaque_count += 1;
        }
        true
    }

    /// Full list: opaque run then transparent run
    pub fn as_slice(&self) -> &[u32] {
        &self.indices
    }

    pub fn opaque(&self) -> &[u32] {
        &self.indices[..self.opaque_count]
    }

    pub fn transparent(&self) -> &[u32] {
        &self.indices[self.opaque_count..]
    }

    pub fn opaque_count(&self) -> usize {
        self.opaque_count
    }

    pub fn transparent_count(&self) -> usize {
        self.indices.len() - self.opaque_count
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.indices.clear();
        self.opaque_count = 0;
    }
}

/// A camera plus its render list and uniform snapshot
#[derive(Debug, Clone)]
pub struct View {
    camera: Camera,
    uniforms: ViewUniforms,
    list: ViewList,
}

impl View {
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn list(&self) -> &ViewList {
        &self.list
    }

    pub fn id(&self) -> u32 {
        self.camera.view_id()
    }

    /// Uniform block with the current list counts filled in
    pub fn uniforms(&self) -> ViewUniforms {
        ViewUniforms {
            opaque_count: self.list.opaque_count() as u32,
            transparent_count: self.list.transparent_count() as u32,
            ..self.uniforms
        }
    }

    /// Sphere visibility for this view. Point views use a plain distance test
    /// because their planes only describe a bounding cube.
    pub fn contains_sphere(&self, center: Vec3, radius: f32) -> bool {
        if self.camera.is_point() {
            let reach = self.camera.projection().far() + radius;
            return center.distance_squared(self.camera.position()) <= reach * reach;
        }
        self.camera.sphere_in_frustum(center, radius)
    }
}

/// OR together `1 << view.id` for every view that can see the sphere.
pub fn get_view_bits(views: &[View], center: Vec3, radius: f32) -> u32 {
    views
        .iter()
        .filter(|view| view.contains_sphere(center, radius))
        .fold(0, |bits, view| bits | (1 << view.id()))
}

/// The ordered set of views active in one frame.
#[derive(Debug, Clone)]
pub struct ViewCatalog {
    views: Vec<View>,
    max_views: usize,
    list_capacity: usize,
}

impl ViewCatalog {
    /// Create a catalog holding up to `max_views` views, each list holding up
    /// to `list_capacity` instances.
    ///
    /// `max_views` above the bitmask width is a configuration error.
    pub fn new(max_views: usize, list_capacity: usize) -> Result<Self> {
        if max_views == 0 || max_views > MAX_VIEW_BITS {
            return Err(RendererError::InvalidConfig(format!(
                "max_views must be in 1..={MAX_VIEW_BITS}, got {max_views}"
            )));
        }
        Ok(Self {
            views: Vec::with_capacity(max_views),
            max_views,
            list_capacity,
        })
    }

    /// Append a view, snapshotting its matrices and frustum corners.
    ///
    /// Returns the view index (also its bit position), or `None` when the
    /// catalog is full.
    pub fn add_view(&mut self, mut camera: Camera) -> Option<u32> {
        if self.views.len() >= self.max_views {
            log::trace!("ViewCatalog: full at {} views, dropping view", self.max_views);
            return None;
        }

        let index = self.views.len() as u32;
        debug_assert!((index as usize) < MAX_VIEW_BITS);
        camera.set_view_id(index);
        camera.build_frustum();

        let uniforms = ViewUniforms::from_camera(&camera);
        self.views.push(View {
            camera,
            uniforms,
            list: ViewList::new(self.list_capacity),
        });
        Some(index)
    }

    /// Bitmask of the views whose volume contains the sphere.
    pub fn get_view_bits(&self, center: Vec3, radius: f32) -> u32 {
        get_view_bits(&self.views, center, radius)
    }

    /// Add an instance index to every view selected by `mask`.
    ///
    /// Returns the number of lists that had to drop it because they were full.
    pub fn append_instance(&mut self, index: u32, opaque: bool, mask: u32) -> usize {
        let mut dropped = 0;
        for view in &mut self.views {
            if mask & (1 << view.id()) != 0 && !view.list.push(index, opaque) {
                dropped += 1;
            }
        }
        dropped
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn view(&self, index: u32) -> Option<&View> {
        self.views.get(index as usize)
    }

    /// The first view added; by convention the main camera.
    pub fn main_view(&self) -> Option<&View> {
        self.views.first()
    }

    /// Shadow-casting views in addition order.
    pub fn shadow_views(&self) -> impl Iterator<Item = &View> {
        self.views.iter().filter(|v| v.camera.is_shadow_caster())
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.views.len() >= self.max_views
    }

    pub fn max_views(&self) -> usize {
        self.max_views
    }

    pub fn clear(&mut self) {
        self.views.clear();
    }
}
