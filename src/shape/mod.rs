//! Shape Surface
//!
//! The public entity of this layer is [`MeshShape`]: a triangle mesh asset
//! with a non-uniform scale, display metadata, and lazily computed bounding
//! geometry for the physics and visualization consumers.

pub mod mesh;
pub mod version;

pub use mesh::{MeshShape, SharedMesh, load_mesh, load_mesh_from_path};
pub use version::ChangeTracker;

/// How a shape's render color is sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// Use the colors from the imported mesh materials.
    #[default]
    MaterialColor,
    /// Look the color up in a palette by the shape's color index.
    ColorIndex,
    /// Use the color assigned to the shape itself.
    ShapeColor,
}

/// How a shape's alpha channel is blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    /// Standard alpha blending.
    #[default]
    Blend,
    /// Override with the shape's own alpha value.
    ShapeAlpha,
}
