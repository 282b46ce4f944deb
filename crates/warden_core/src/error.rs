//! Error types for the authority simulation.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Top-level error type for boot-time and API errors.
///
/// Nothing inside a tick returns this type; in-tick problems are either
/// command rejections or [`SystemFault`]s.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Content data could not be parsed.
    #[error("Failed to parse content data '{source_name}': {message}")]
    ContentParse {
        /// Name of the content source (usually a file path).
        source_name: String,
        /// Parser message.
        message: String,
    },

    /// Content data parsed but references are inconsistent.
    #[error("Invalid content: {0}")]
    InvalidContent(String),

    /// Configuration could not be parsed.
    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    /// Snapshot encode/decode/validation failure.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Replay bytes could not be read.
    #[error("Invalid replay: {0}")]
    ReplayFormat(String),

    /// Replay playback diverged from the recorded run.
    #[error("Desync detected at tick {tick}: recorded hash {expected}, replayed hash {actual}")]
    DesyncDetected {
        /// Tick counter where the hashes were compared.
        tick: u64,
        /// Hash stored in the replay.
        expected: u64,
        /// Hash produced by playback.
        actual: u64,
    },
}

/// Snapshot codec and structural errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnapshotError {
    /// Serialization failed.
    #[error("failed to encode snapshot: {0}")]
    Encode(String),

    /// The payload is not a snapshot.
    #[error("failed to decode snapshot: {0}")]
    Decode(String),

    /// The payload was written by an incompatible version.
    #[error("snapshot version mismatch: expected {expected}, got {got}")]
    VersionMismatch {
        /// Version this build understands.
        expected: u32,
        /// Version found in the payload.
        got: u32,
    },

    /// The payload decoded but violates a world invariant.
    #[error("snapshot failed structural check: {0}")]
    Structure(String),

    /// A delta was applied to the wrong baseline.
    #[error("delta base tick {delta_base} does not match snapshot tick {snapshot_tick}")]
    BaselineMismatch {
        /// Base tick named by the delta.
        delta_base: u64,
        /// Tick of the snapshot it was applied to.
        snapshot_tick: u64,
    },
}

/// An unexpected internal error inside one domain system.
///
/// Raised either explicitly by the system or synthesized by the scheduler
/// when the system panics.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("system '{system}' faulted at tick {tick}: {message}")]
pub struct SystemFault {
    /// Name of the faulting system.
    pub system: &'static str,
    /// Tick during which the fault happened.
    pub tick: u64,
    /// Human readable description.
    pub message: String,
}
