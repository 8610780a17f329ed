//! Import Boundary
//!
//! The third-party import engine sits behind the [`MeshImporter`] trait so
//! the shape layer only depends on a contract: a URI plus processing flags
//! in, a [`MeshScene`] or an error out. The bundled backend is glTF
//! ([`GltfImporter`]); the post-process passes are engine-independent and
//! operate on the scene data model directly.

pub mod gltf;
pub mod postprocess;

pub use self::gltf::GltfImporter;

use bitflags::bitflags;

use crate::errors::Result;
use crate::retriever::ResourceRetriever;
use crate::scene::MeshScene;

bitflags! {
    /// Post-process passes applied to an imported scene.
    ///
    /// The first import pass uses the surface-cleanup steps; vertex
    /// pre-transformation runs as a separate second pass because the loader
    /// may reset the root transform in between.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PostProcessSteps: u32 {
        /// Generate missing per-vertex normals (area weighted).
        const GEN_NORMALS = 1 << 0;
        /// Normalize every surface sub-mesh to an indexed triangle list.
        const TRIANGULATE = 1 << 1;
        /// Merge bit-identical vertices and rewrite indices.
        const JOIN_IDENTICAL_VERTICES = 1 << 2;
        /// Split sub-meshes by primitive type and drop stripped types.
        const SORT_BY_PRIMITIVE_TYPE = 1 << 3;
        /// Merge sub-meshes that share a node, material and primitive type.
        const OPTIMIZE_MESHES = 1 << 4;
        /// Check index bounds and attribute lengths.
        const VALIDATE_DATA_STRUCTURE = 1 << 5;
        /// Bake node transforms into vertex data and collapse the tree.
        const PRE_TRANSFORM_VERTICES = 1 << 6;
    }
}

bitflags! {
    /// Primitive type set, used to configure which primitives an import
    /// discards.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PrimitiveTypes: u32 {
        const POINT = 1 << 0;
        const LINE = 1 << 1;
        const TRIANGLE = 1 << 2;
    }
}

/// Per-import configuration, fixed before the importer runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportConfig {
    /// Primitive types removed from the scene during import.
    pub strip_primitives: PrimitiveTypes,
}

impl PostProcessSteps {
    /// The step set used by the mesh shape load protocol's first pass.
    #[must_use]
    pub fn surface_cleanup() -> Self {
        Self::GEN_NORMALS
            | Self::TRIANGULATE
            | Self::JOIN_IDENTICAL_VERTICES
            | Self::SORT_BY_PRIMITIVE_TYPE
            | Self::OPTIMIZE_MESHES
            | Self::VALIDATE_DATA_STRUCTURE
    }
}

/// Opaque import engine contract.
///
/// Implementations read the primary asset and any sub-resources through the
/// supplied retriever, so local and remote assets load uniformly.
pub trait MeshImporter {
    /// Imports the asset behind `uri` and applies `steps` to the result.
    fn import(
        &self,
        uri: &str,
        retriever: &dyn ResourceRetriever,
        config: &ImportConfig,
        steps: PostProcessSteps,
    ) -> Result<MeshScene>;

    /// Applies `steps` to an already-imported scene, producing a new scene.
    ///
    /// The input scene is left untouched so callers can fall back to it when
    /// a pass fails.
    fn apply_post_process(&self, scene: &MeshScene, steps: PostProcessSteps) -> Result<MeshScene> {
        postprocess::run(scene.clone(), steps, PrimitiveTypes::empty())
    }
}
