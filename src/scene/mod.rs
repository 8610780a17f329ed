//! Mesh Scene Data Model
//!
//! The in-memory result of importing a 3D asset: a tree of nodes referencing
//! flat lists of sub-meshes and materials. A [`MeshScene`] is immutable after
//! import and may be read concurrently by every shape that references it.

pub mod bounds;

pub use bounds::BoundingBox;

use glam::{Affine3A, Vec3, Vec4};
use uuid::Uuid;

/// Primitive topology of a sub-mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Points,
    Lines,
    Triangles,
}

impl Default for PrimitiveKind {
    fn default() -> Self {
        PrimitiveKind::Triangles
    }
}

/// Material description carried through from the importer.
///
/// Only the properties the physics/visualization consumers read; textures and
/// shading parameters stay inside the rendering pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDesc {
    pub name: Option<String>,
    /// RGBA base color factor.
    pub base_color: Vec4,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            name: None,
            base_color: Vec4::ONE,
        }
    }
}

/// One primitive batch: vertex data plus an index list and a material slot.
#[derive(Debug, Clone, Default)]
pub struct SubMesh {
    pub name: Option<String>,
    pub kind: PrimitiveKind,
    /// Vertex positions in local (unscaled) mesh coordinates.
    pub positions: Vec<Vec3>,
    /// Per-vertex normals; `None` until generated.
    pub normals: Option<Vec<Vec3>>,
    /// Indices into `positions`; three per triangle, two per line segment.
    pub indices: Vec<u32>,
    /// Index into [`MeshScene::materials`].
    pub material: Option<usize>,
}

impl SubMesh {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }
}

/// A node in the imported scene hierarchy.
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    pub name: Option<String>,
    /// Local transform relative to the parent node.
    pub transform: Affine3A,
    /// Indices into [`MeshScene::meshes`].
    pub meshes: Vec<usize>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            transform: Affine3A::IDENTITY,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// An imported mesh scene.
#[derive(Debug, Clone)]
pub struct MeshScene {
    /// Stable identity of this imported asset, for consumer-side caching.
    pub uuid: Uuid,
    pub root: SceneNode,
    pub meshes: Vec<SubMesh>,
    pub materials: Vec<MaterialDesc>,
}

impl MeshScene {
    #[must_use]
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            root: SceneNode::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
        }
    }

    /// Total vertex count across all sub-meshes, without deduplication.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(SubMesh::vertex_count).sum()
    }

    /// Visits every node in the tree, depth-first, with its accumulated
    /// world transform.
    pub fn visit_nodes(&self, mut f: impl FnMut(&SceneNode, Affine3A)) {
        fn walk(node: &SceneNode, parent: Affine3A, f: &mut impl FnMut(&SceneNode, Affine3A)) {
            let world = parent * node.transform;
            f(node, world);
            for child in &node.children {
                walk(child, world, f);
            }
        }
        walk(&self.root, Affine3A::IDENTITY, &mut f);
    }
}

impl Default for MeshScene {
    fn default() -> Self {
        Self::new()
    }
}
