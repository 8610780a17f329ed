//! Mesh Shape
//!
//! [`MeshShape`] owns a shared reference to an imported mesh scene, a
//! strictly positive non-uniform scale, and display metadata, and computes
//! bounding box, volume and inertia lazily on first access after a mutation.
//!
//! # Ownership
//!
//! The imported scene lives in a [`SharedMesh`]: reference-counted shared
//! ownership so the scene is released exactly once, when the last referencing
//! shape drops. Cloned shapes share the immutable scene but carry independent
//! mutable state (scale, caches, metadata), so mutating one clone never races
//! with another.
//!
//! # Caching
//!
//! Cached geometry is a `Cell<Option<_>>`: `None` is the dirty state, so a
//! stale value can never be read — access goes through the accessor, which
//! recomputes on `None`. Every mutation also bumps the shape's version
//! counter for external consumers.

use std::cell::Cell;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::{Affine3A, Mat3, Vec3};

use crate::errors::{Result, ShapeError};
use crate::importer::{ImportConfig, MeshImporter, PostProcessSteps, PrimitiveTypes};
use crate::retriever::{LocalFileRetriever, ResourceRetriever};
use crate::scene::{BoundingBox, MeshScene};
use crate::shape::version::ChangeTracker;
use crate::shape::{AlphaMode, ColorMode};

// ============================================================================
// SharedMesh
// ============================================================================

/// Shared ownership wrapper around one imported [`MeshScene`].
///
/// Constructed only from a successful import; the wrapped scene is valid for
/// the wrapper's entire lifetime and is released exactly once, when the last
/// clone drops.
#[derive(Debug, Clone)]
pub struct SharedMesh(Arc<MeshScene>);

impl SharedMesh {
    #[must_use]
    pub fn new(scene: MeshScene) -> Self {
        Self(Arc::new(scene))
    }

    #[inline]
    #[must_use]
    pub fn scene(&self) -> &MeshScene {
        &self.0
    }

    /// Whether two handles reference the same imported scene.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Number of shapes currently referencing this scene.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl Deref for SharedMesh {
    type Target = MeshScene;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ============================================================================
// Load protocol
// ============================================================================

/// Loads a mesh asset through `retriever` and `importer`.
///
/// Import failure is recoverable: it is logged with the URI and the importer
/// diagnostic and surfaces as `None` — callers get a usable empty shape, not
/// an aborted construction. A failed vertex pre-transform pass degrades to
/// the un-baked scene rather than discarding the import.
pub fn load_mesh(
    uri: &str,
    retriever: &Arc<dyn ResourceRetriever>,
    importer: &dyn MeshImporter,
) -> Option<SharedMesh> {
    // Points and lines carry no surface for physics; drop them at import.
    let config = ImportConfig {
        strip_primitives: PrimitiveTypes::POINT | PrimitiveTypes::LINE,
    };

    let mut scene = match importer.import(
        uri,
        retriever.as_ref(),
        &config,
        PostProcessSteps::surface_cleanup(),
    ) {
        Ok(scene) => scene,
        Err(err) => {
            log::warn!("[MeshShape::load_mesh] failed loading mesh '{uri}': {err}");
            return None;
        }
    };

    // Collada encodes an up-axis alignment rotation on the root that must
    // not propagate into the physics frame.
    if has_collada_extension(uri) {
        scene.root.transform = Affine3A::IDENTITY;
    }

    // Bake transforms as a second pass, after the root correction above.
    let scene = match importer.apply_post_process(&scene, PostProcessSteps::PRE_TRANSFORM_VERTICES)
    {
        Ok(baked) => baked,
        Err(err) => {
            log::warn!("[MeshShape::load_mesh] failed pre-transforming vertices: {err}");
            scene
        }
    };

    Some(SharedMesh::new(scene))
}

/// Convenience overload for bare filesystem paths: synthesizes a local-file
/// retriever and delegates to [`load_mesh`].
pub fn load_mesh_from_path(
    path: impl AsRef<Path>,
    importer: &dyn MeshImporter,
) -> Option<SharedMesh> {
    let path = path.as_ref();
    let retriever: Arc<dyn ResourceRetriever> = Arc::new(LocalFileRetriever::new(path));
    load_mesh(&path.to_string_lossy(), &retriever, importer)
}

fn has_collada_extension(uri: &str) -> bool {
    let extension = uri
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    matches!(extension.as_deref(), Some("dae" | "zae"))
}

// ============================================================================
// MeshShape
// ============================================================================

/// A triangle mesh shape for physics simulation.
#[derive(Clone)]
pub struct MeshShape {
    scale: Vec3,
    mesh: Option<SharedMesh>,
    uri: String,
    path: Option<PathBuf>,
    retriever: Option<Arc<dyn ResourceRetriever>>,

    color_mode: ColorMode,
    alpha_mode: AlphaMode,
    color_index: i32,
    /// Rendering-backend opaque token.
    display_list: u32,

    // None == dirty; reads always recompute before returning.
    bounding_box: Cell<Option<BoundingBox>>,
    volume: Cell<Option<f32>>,
    tracker: ChangeTracker,
}

impl MeshShape {
    /// Constructs a shape from an already-imported mesh handle.
    ///
    /// Returns an error only for an invalid scale; a `None` mesh is a valid
    /// empty shape.
    pub fn new(
        scale: Vec3,
        mesh: Option<SharedMesh>,
        uri: impl Into<String>,
        retriever: Option<Arc<dyn ResourceRetriever>>,
    ) -> Result<Self> {
        let mut shape = Self {
            scale: Vec3::ONE,
            mesh: None,
            uri: String::new(),
            path: None,
            retriever: None,
            color_mode: ColorMode::default(),
            alpha_mode: AlphaMode::default(),
            color_index: 0,
            display_list: 0,
            bounding_box: Cell::new(None),
            volume: Cell::new(None),
            tracker: ChangeTracker::new(),
        };
        shape.set_mesh(mesh, uri, retriever);
        shape.set_scale(scale)?;
        Ok(shape)
    }

    /// Constructs a shape by importing the asset behind `uri`.
    ///
    /// With a retriever, the asset loads through it; without one, `uri` is
    /// treated as a local filesystem path. Import failure yields a shape with
    /// no mesh — check [`Self::mesh`] before use.
    pub fn from_uri(
        scale: Vec3,
        uri: impl Into<String>,
        retriever: Option<Arc<dyn ResourceRetriever>>,
        importer: &dyn MeshImporter,
    ) -> Result<Self> {
        let uri = uri.into();
        let mesh = match &retriever {
            Some(retriever) => load_mesh(&uri, retriever, importer),
            None => load_mesh_from_path(&uri, importer),
        };
        Self::new(scale, mesh, uri, retriever)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Replaces the mesh reference.
    ///
    /// A `None` mesh clears the URI, resolved path and retriever. Either way
    /// this is a mutation: cached geometry is invalidated and the version
    /// counter advances.
    pub fn set_mesh(
        &mut self,
        mesh: Option<SharedMesh>,
        uri: impl Into<String>,
        retriever: Option<Arc<dyn ResourceRetriever>>,
    ) {
        self.mesh = mesh;

        if self.mesh.is_none() {
            self.uri.clear();
            self.path = None;
            self.retriever = None;
        } else {
            self.uri = uri.into();
            self.path = retriever.as_ref().and_then(|r| r.file_path(&self.uri));
            self.retriever = retriever;
        }
        self.mark_mutated();
    }

    /// Sets the shape's non-uniform scale.
    ///
    /// Every component must be strictly positive; violation is an
    /// always-checked validation error, never silently accepted.
    pub fn set_scale(&mut self, scale: Vec3) -> Result<()> {
        if !(scale.cmpgt(Vec3::ZERO).all() && scale.is_finite()) {
            return Err(ShapeError::InvalidScale(scale));
        }
        self.scale = scale;
        self.mark_mutated();
        Ok(())
    }

    /// Invalidates cached geometry and advances the version counter. Every
    /// geometry-affecting mutation funnels through here.
    fn mark_mutated(&mut self) {
        self.bounding_box.set(None);
        self.volume.set(None);
        self.tracker.changed();
    }

    /// Per-frame refresh hook. Mesh shapes are static once loaded.
    pub fn update(&mut self) {}

    // ------------------------------------------------------------------
    // Geometry queries
    // ------------------------------------------------------------------

    /// The axis-aligned bounding box of the scaled mesh.
    ///
    /// Zero-sized at the origin when the shape has no mesh. Recomputed on
    /// first access after a mutation, cached otherwise.
    pub fn bounding_box(&self) -> BoundingBox {
        if let Some(cached) = self.bounding_box.get() {
            return cached;
        }
        let computed = self.compute_bounding_box();
        self.bounding_box.set(Some(computed));
        computed
    }

    /// Approximate volume: the product of the three bounding-box extents,
    /// not the true mesh volume. Downstream inertia relies on exactly this
    /// approximation.
    pub fn volume(&self) -> f32 {
        if let Some(cached) = self.volume.get() {
            return cached;
        }
        let extents = self.bounding_box().extents();
        let computed = extents.x * extents.y * extents.z;
        self.volume.set(Some(computed));
        computed
    }

    /// Inertia tensor of a solid box spanning the full bounding-box extents
    /// with the given mass. Mesh shapes do not compute exact volumetric
    /// inertia.
    #[must_use]
    pub fn inertia(&self, mass: f32) -> Mat3 {
        solid_box_inertia(self.bounding_box().extents(), mass)
    }

    /// The complete ordered vertex sequence across all sub-meshes, in local
    /// (unscaled) mesh coordinates. Reused vertex arrays are reported as
    /// often as they appear; no deduplication.
    #[must_use]
    pub fn vertices(&self) -> Vec<Vec3> {
        let Some(mesh) = &self.mesh else {
            return Vec::new();
        };
        let mut vertices = Vec::with_capacity(mesh.vertex_count());
        for sub_mesh in &mesh.meshes {
            vertices.extend_from_slice(&sub_mesh.positions);
        }
        vertices
    }

    fn compute_bounding_box(&self) -> BoundingBox {
        let Some(mesh) = &self.mesh else {
            return BoundingBox::ZERO;
        };

        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for sub_mesh in &mesh.meshes {
            for &position in &sub_mesh.positions {
                min = min.min(position);
                max = max.max(position);
            }
        }
        if !min.is_finite() {
            // Mesh present but empty of vertices.
            return BoundingBox::ZERO;
        }

        BoundingBox {
            min: min * self.scale,
            max: max * self.scale,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// The shared mesh handle, or `None` for an empty shape.
    #[inline]
    #[must_use]
    pub fn mesh(&self) -> Option<&SharedMesh> {
        self.mesh.as_ref()
    }

    /// The imported scene, or `None` for an empty shape.
    #[inline]
    #[must_use]
    pub fn scene(&self) -> Option<&MeshScene> {
        self.mesh.as_ref().map(SharedMesh::scene)
    }

    #[inline]
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Local file path the URI resolved to, if the retriever produced one.
    #[inline]
    #[must_use]
    pub fn resolved_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn retriever(&self) -> Option<&Arc<dyn ResourceRetriever>> {
        self.retriever.as_ref()
    }

    /// Monotonic counter bumped on every mutation of scale or mesh.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.tracker.version()
    }

    #[inline]
    #[must_use]
    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    pub fn set_color_mode(&mut self, mode: ColorMode) {
        self.color_mode = mode;
    }

    #[inline]
    #[must_use]
    pub fn alpha_mode(&self) -> AlphaMode {
        self.alpha_mode
    }

    pub fn set_alpha_mode(&mut self, mode: AlphaMode) {
        self.alpha_mode = mode;
    }

    #[inline]
    #[must_use]
    pub fn color_index(&self) -> i32 {
        self.color_index
    }

    pub fn set_color_index(&mut self, index: i32) {
        self.color_index = index;
    }

    #[inline]
    #[must_use]
    pub fn display_list(&self) -> u32 {
        self.display_list
    }

    pub fn set_display_list(&mut self, token: u32) {
        self.display_list = token;
    }
}

/// Inertia tensor of a solid box with full extents `d` and mass `m`:
/// `diag(m/12 * (dy^2 + dz^2), m/12 * (dx^2 + dz^2), m/12 * (dx^2 + dy^2))`.
#[must_use]
pub fn solid_box_inertia(extents: Vec3, mass: f32) -> Mat3 {
    let coefficient = mass / 12.0;
    let squared = extents * extents;
    Mat3::from_diagonal(Vec3::new(
        coefficient * (squared.y + squared.z),
        coefficient * (squared.x + squared.z),
        coefficient * (squared.x + squared.y),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collada_extension_matching_is_case_insensitive() {
        assert!(has_collada_extension("model.dae"));
        assert!(has_collada_extension("MODEL.DAE"));
        assert!(has_collada_extension("archive.zae"));
        assert!(!has_collada_extension("model.gltf"));
        assert!(!has_collada_extension("no-extension"));
    }

    #[test]
    fn solid_box_inertia_of_cube() {
        let inertia = solid_box_inertia(Vec3::splat(1.0), 6.0);
        // m/12 * (1 + 1) = 1 on every axis.
        assert_eq!(inertia, Mat3::from_diagonal(Vec3::ONE));
    }
}
