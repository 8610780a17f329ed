//! Kinema Shapes — mesh shape resource layer for physics simulation.
//!
//! Loads triangle mesh assets through an opaque import boundary, wraps the
//! imported scene in reference-counted shared ownership, and exposes
//! scale-aware geometric queries (bounding box, volume, inertia) with
//! lazy dirty-flag caching and a version counter for external cache
//! invalidation.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod errors;
pub mod importer;
pub mod retriever;
pub mod scene;
pub mod shape;

pub use errors::{Result, ShapeError};
pub use importer::{GltfImporter, ImportConfig, MeshImporter, PostProcessSteps, PrimitiveTypes};
pub use retriever::{LocalFileRetriever, ResourceRetriever};
pub use scene::{BoundingBox, MaterialDesc, MeshScene, PrimitiveKind, SceneNode, SubMesh};
pub use shape::{AlphaMode, ChangeTracker, ColorMode, MeshShape, SharedMesh};
pub use shape::{load_mesh, load_mesh_from_path};
