//! Server error types.

use std::path::PathBuf;

use thiserror::Error;
use warden_core::error::{CoreError, SnapshotError};

/// Result type using [`ServerError`].
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors raised outside the tick: boot, storage and admin plumbing.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Filesystem access failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Server config could not be parsed.
    #[error("Failed to parse server config '{}': {message}", path.display())]
    Config {
        /// Config file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// Content or other core boot failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Snapshot could not be encoded or decoded.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// The tick loop is gone.
    #[error("server is shut down")]
    ShutDown,
}

impl ServerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
