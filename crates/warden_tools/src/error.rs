//! Tool errors.

use std::path::PathBuf;

use thiserror::Error;
use warden_core::error::{CoreError, SnapshotError};

/// Result type using [`ToolError`].
pub type Result<T> = std::result::Result<T, ToolError>;

/// Errors reported by the tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A file could not be read.
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Content, config or replay failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Snapshot decode or structural failure.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// JSON rendering failed.
    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read a whole file, tagging errors with the path.
pub(crate) fn read(path: &std::path::Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a UTF-8 file, tagging errors with the path.
pub(crate) fn read_text(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })
}
