//! Scene graph consumed by the frame builder.
//!
//! Nodes live in a flat arena and refer to their children by index. The
//! [`SceneWalker`] visits them depth first with an explicit stack that carries
//! each node's accumulated parent matrix, so deep hierarchies never recurse.

use glam::Mat4;

use super::light::Light;
use super::material::Material;
use super::transform::{Aabb, BoundingSphere, Transform};
use crate::backend::MeshHandle;

/// Index of a node in the scene arena
pub type NodeId = usize;

/// A mesh primitive drawn with one material
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primitive {
    pub mesh: MeshHandle,
    /// Index into the scene material list
    pub material: u32,
    pub vertex_count: u32,
}

/// Renderable payload of a node
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub primitives: Vec<Primitive>,
    /// Skinned meshes are evaluated by the animation layer before drawing
    pub skinned: bool,
    /// Local-space bounds
    pub bounds: BoundingSphere,
}

impl Instance {
    pub fn new(primitives: Vec<Primitive>, bounds: BoundingSphere) -> Self {
        Self {
            primitives,
            skinned: false,
            bounds,
        }
    }

    pub fn with_skin(mut self, skinned: bool) -> Self {
        self.skinned = skinned;
        self
    }

    pub fn vertex_count(&self) -> u64 {
        self.primitives.iter().map(|p| p.vertex_count as u64).sum()
    }
}

/// Scene node
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub local: Transform,
    pub instance: Option<Instance>,
    pub children: Vec<NodeId>,
}

/// Scene: node hierarchy plus materials and lights, rebuilt by the caller as needed
#[derive(Debug, Clone, Default)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    roots: Vec<NodeId>,
    materials: Vec<Material>,
    lights: Vec<Light>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node under `parent` (or as a root) and return its id.
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not name an existing node.
    pub fn add_node(&mut self, local: Transform, instance: Option<Instance>, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        match parent {
            Some(parent) => {
                assert!(parent < id, "parent node {parent} does not exist");
                self.nodes[parent].children.push(id);
            }
            None => self.roots.push(id),
        }
        self.nodes.push(SceneNode {
            local,
            instance,
            children: Vec::new(),
        });
        id
    }

    pub fn add_material(&mut self, material: Material) -> u32 {
        self.materials.push(material);
        (self.materials.len() - 1) as u32
    }

    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut [Light] {
        &mut self.lights
    }

    /// Depth-first walk over every node that carries an instance.
    pub fn walk(&self) -> SceneWalker<'_> {
        let stack = self
            .roots
            .iter()
            .rev()
            .map(|&root| (root, Mat4::IDENTITY))
            .collect();
        SceneWalker { scene: self, stack }
    }

    /// World-space bounds of all instances
    pub fn world_bounds(&self) -> Aabb {
        let mut aabb = Aabb::EMPTY;
        for visit in self.walk() {
            aabb.expand_sphere(&visit.bounds);
        }
        aabb
    }
}

/// An instance reached by the walker, with its resolved world state
#[derive(Debug, Clone, Copy)]
pub struct InstanceVisit<'a> {
    pub node: NodeId,
    pub world: Mat4,
    pub bounds: BoundingSphere,
    pub instance: &'a Instance,
}

/// Explicit-stack scene traversal
#[derive(Debug)]
pub struct SceneWalker<'a> {
    scene: &'a Scene,
    stack: Vec<(NodeId, Mat4)>,
}

impl<'a> Iterator for SceneWalker<'a> {
    type Item = InstanceVisit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, parent)) = self.stack.pop() {
            let Some(node) = self.scene.nodes.get(id) else {
                continue;
            };
            let world = parent * node.local.matrix();

            // Reverse so the first child is visited first
            for &child in node.children.iter().rev() {
                self.stack.push((child, world));
            }

            if let Some(instance) = &node.instance {
                return Some(InstanceVisit {
                    node: id,
                    world,
                    bounds: instance.bounds.transformed(&world),
                    instance,
                });
            }
        }
        None
    }
}
