//! Resource Retrieval
//!
//! Decouples asset loading from filesystem specifics. A [`ResourceRetriever`]
//! resolves a URI to raw bytes and, where possible, to a local file path.
//! Retrieval is synchronous and blocking; import failure is reported through
//! the return value, never through unwinding.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Result, ShapeError};

/// Resolves URIs to byte streams and local file paths.
///
/// Implementations must be shareable across shapes that reference the same
/// asset source.
pub trait ResourceRetriever: Send + Sync {
    /// Reads the full contents of the resource behind `uri`.
    fn resolve(&self, uri: &str) -> Result<Vec<u8>>;

    /// Maps `uri` to a local filesystem path, if one exists.
    ///
    /// Returns `None` for sources with no filesystem identity.
    fn file_path(&self, uri: &str) -> Option<PathBuf>;
}

/// Local filesystem retriever.
///
/// Relative URIs are resolved against a root directory; absolute paths and
/// `file://` URIs are used as-is.
pub struct LocalFileRetriever {
    root_path: PathBuf,
}

impl LocalFileRetriever {
    /// Creates a retriever rooted at `path`. If `path` names a file, its
    /// parent directory becomes the root.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = strip_file_scheme_path(path.as_ref());
        let root_path = if path.is_file() {
            path.parent().unwrap_or(Path::new(".")).to_path_buf()
        } else {
            path.to_path_buf()
        };
        Self { root_path }
    }

    #[inline]
    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn resolve_path(&self, uri: &str) -> PathBuf {
        let stripped = strip_file_scheme(uri);
        let path = Path::new(stripped);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_path.join(path)
        }
    }
}

impl ResourceRetriever for LocalFileRetriever {
    fn resolve(&self, uri: &str) -> Result<Vec<u8>> {
        let path = self.resolve_path(uri);
        fs::read(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => {
                ShapeError::ResourceNotFound(path.display().to_string())
            }
            _ => ShapeError::Io(err),
        })
    }

    fn file_path(&self, uri: &str) -> Option<PathBuf> {
        let path = self.resolve_path(uri);
        path.exists().then_some(path)
    }
}

/// Strips a leading `file://` scheme from a URI, if present.
#[must_use]
pub fn strip_file_scheme(uri: &str) -> &str {
    uri.strip_prefix("file://").unwrap_or(uri)
}

fn strip_file_scheme_path(path: &Path) -> &Path {
    path.to_str()
        .map_or(path, |s| Path::new(strip_file_scheme(s)))
}
