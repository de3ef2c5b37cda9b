//! Light visibility and shadow-caster ranking.

use crate::frame::MAX_SHADOWS;
use crate::scene::{Camera, Light, LightKind};

/// A light ranked for shadow casting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCandidate {
    /// Index into the frame's light table
    pub light_index: u32,
    /// Squared distance to the main view; 0 for directional lights
    pub distance_sq: f32,
}

/// Bounded list of candidates sorted by ascending distance.
///
/// Insertion finds its position by linear scan and shifts the tail right,
/// dropping the furthest entry when the list is already full.
#[derive(Debug, Clone)]
pub struct ShadowCandidates {
    entries: Vec<ShadowCandidate>,
    capacity: usize,
}

impl Default for ShadowCandidates {
    fn default() -> Self {
        Self::new(MAX_SHADOWS)
    }
}

impl ShadowCandidates {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a candidate. Returns `false` if it ranks below every entry of a
    /// full list and was not kept.
    ///
    /// Equal distances keep insertion order.
    pub fn insert(&mut self, light_index: u32, distance_sq: f32) -> bool {
        let position = self
            .entries
            .iter()
            .position(|c| c.distance_sq > distance_sq)
            .unwrap_or(self.entries.len());

        if position >= self.capacity {
            return false;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop();
        }
        self.entries.insert(
            position,
            ShadowCandidate {
                light_index,
                distance_sq,
            },
        );
        true
    }

    pub fn as_slice(&self) -> &[ShadowCandidate] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShadowCandidate> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Result of light evaluation for one frame
#[derive(Debug, Clone, Default)]
pub struct LightSelection {
    /// Scene light indices of the visible lights, in discovery order.
    /// A light's position here is its index in the frame light table.
    pub visible: Vec<usize>,
    pub candidates: ShadowCandidates,
}

/// Classify every scene light against the main view.
///
/// Ambient and directional lights are always visible. Point lights are
/// tested as spheres of radius `interior + falloff`, spot lights as cones.
/// Directional lights enter the candidate list at distance 0, positional
/// lights at their squared distance to the main view; ambient lights never
/// cast shadows.
pub fn select_shadow_candidates(lights: &[Light], main: &Camera, capacity: usize) -> LightSelection {
    let mut selection = LightSelection {
        visible: Vec::with_capacity(lights.len()),
        candidates: ShadowCandidates::new(capacity),
    };
    let eye = main.position();

    for (scene_index, light) in lights.iter().enumerate() {
        let distance_sq = match light.kind {
            LightKind::Ambient => None,
            LightKind::Directional { .. } => Some(0.0),
            LightKind::Point {
                position,
                interior_radius,
                falloff_radius,
            } => {
                if !main.sphere_in_frustum(position, interior_radius + falloff_radius) {
                    continue;
                }
                Some(position.distance_squared(eye))
            }
            LightKind::Spot {
                position,
                direction,
                length,
                half_angle,
            } => {
                if !main.cone_in_frustum(position, direction, length, half_angle) {
                    continue;
                }
                Some(position.distance_squared(eye))
            }
        };

        let table_index = selection.visible.len() as u32;
        selection.visible.push(scene_index);
        if let Some(distance_sq) = distance_sq {
            selection.candidates.insert(table_index, distance_sq);
        }
    }

    log::trace!(
        "Light selection: {} of {} visible, {} shadow candidates",
        selection.visible.len(),
        lights.len(),
        selection.candidates.len()
    );
    selection
}
