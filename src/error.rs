//! Error types for cache loading, attribute resolution, and emission.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning a particle cache into a points primitive.
///
/// None of these are fatal to the host process: the procedural boundary turns
/// each one into an empty primitive or a skipped attribute plus a diagnostic.
#[derive(Error, Debug)]
pub enum PartioError {
    /// I/O error while reading a cache file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The cache file is not valid JSON or does not match the cache layout.
    #[error("Cache parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The cache file does not exist on disk.
    #[error("Cache file not found: {}", .0.display())]
    CacheFileNotFound(PathBuf),

    /// The cache parsed but its contents are inconsistent.
    #[error("Invalid cache: {0}")]
    InvalidCache(String),

    /// A mandatory attribute is absent under every accepted name.
    #[error("Missing required attribute: tried {}", .candidates.join(", "))]
    MissingRequiredAttribute { candidates: Vec<String> },

    /// The attribute exists but its element count cannot be mapped to an output slot.
    #[error("Unsupported attribute '{name}': {count} components per particle")]
    AttributeTypeUnsupported { name: String, count: usize },

    /// The attribute name is reserved or was already exported.
    #[error("Attribute name collision: '{0}'")]
    AttributeNameCollision(String),
}

/// Result type using PartioError.
pub type Result<T> = std::result::Result<T, PartioError>;
