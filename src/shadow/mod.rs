//! Shadow caster selection and shadow view construction
//!
//! - [`select_shadow_candidates`] decides which lights are visible this frame
//!   and ranks a bounded number of them for shadow casting.
//! - [`CascadeBuilder`] turns a directional light into orthographic cascade
//!   cameras fitted to slices of the main view.

mod candidates;
mod cascade;

pub use candidates::{select_shadow_candidates, LightSelection, ShadowCandidate, ShadowCandidates};
pub use cascade::{light_basis, CascadeBuilder, CascadeSplits, MAX_CASCADES};
