//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`ShapeError`] covers all failure modes including:
//! - Resource retrieval failures
//! - Asset parsing and import errors
//! - Mesh structure validation errors
//! - Shape parameter validation errors
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, ShapeError>`.

use glam::Vec3;
use thiserror::Error;

/// The main error type for the mesh shape layer.
///
/// Each variant provides specific context about what went wrong.
#[derive(Error, Debug)]
pub enum ShapeError {
    // ========================================================================
    // Resource Retrieval Errors
    // ========================================================================
    /// The requested resource could not be resolved by the retriever.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Import Errors
    // ========================================================================
    /// glTF parsing or loading error.
    #[error("glTF error: {0}")]
    GltfParse(String),

    /// Data URI parsing error.
    #[error("Data URI error: {0}")]
    DataUri(String),

    /// Base64 decoding error.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The importer failed to produce a scene for the given URI.
    #[error("Failed to import '{uri}': {reason}")]
    ImportFailed {
        /// The URI that was being imported
        uri: String,
        /// Importer-reported failure reason
        reason: String,
    },

    // ========================================================================
    // Mesh Structure Errors
    // ========================================================================
    /// The imported scene failed structure validation.
    #[error("Invalid mesh structure: {0}")]
    InvalidScene(String),

    /// A post-process pass failed on an otherwise valid scene.
    #[error("Post-process failed: {0}")]
    PostProcessFailed(String),

    // ========================================================================
    // Shape Parameter Errors
    // ========================================================================
    /// A mesh shape scale had a non-positive component.
    #[error("Mesh scale must be strictly positive on every axis, got {0}")]
    InvalidScale(Vec3),
}

impl From<gltf::Error> for ShapeError {
    fn from(err: gltf::Error) -> Self {
        ShapeError::GltfParse(err.to_string())
    }
}

/// Alias for `Result<T, ShapeError>`.
pub type Result<T> = std::result::Result<T, ShapeError>;
