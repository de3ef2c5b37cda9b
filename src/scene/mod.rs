//! Scene management: cameras, lights, materials and the node hierarchy

mod camera;
mod graph;
mod light;
mod material;
mod transform;

pub use camera::*;
pub use graph::*;
pub use light::*;
pub use material::*;
pub use transform::*;
