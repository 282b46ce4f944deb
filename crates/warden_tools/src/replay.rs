//! Replay verification.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use warden_core::config::SimConfig;
use warden_core::content::ContentRegistry;
use warden_core::replay::{Replay, ReplayPlayer};

use crate::error::{read, Result};

/// Outcome of a successful replay verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Tick the recording started from.
    pub start_tick: u64,
    /// Tick the recording ended on.
    pub final_tick: u64,
    /// Commands replayed.
    pub commands: usize,
    /// Final state hash, matched by playback.
    pub final_hash: u64,
}

/// Play a recorded replay file and compare its final hash.
///
/// # Errors
///
/// Returns an error if the file does not decode or playback desyncs.
pub fn verify_replay_file(
    path: &Path,
    content: Arc<ContentRegistry>,
    config: SimConfig,
) -> Result<ReplaySummary> {
    let replay = Replay::from_bytes(&read(path)?)?;
    verify_replay(replay, content, config)
}

/// Play a decoded replay and compare its final hash.
///
/// # Errors
///
/// Returns an error if the initial snapshot is unusable or playback desyncs.
pub fn verify_replay(
    replay: Replay,
    content: Arc<ContentRegistry>,
    config: SimConfig,
) -> Result<ReplaySummary> {
    let summary = ReplaySummary {
        start_tick: replay.start_tick()?,
        final_tick: replay.final_tick,
        commands: replay.command_count(),
        final_hash: replay.final_hash,
    };
    let mut player = ReplayPlayer::new(replay, content, config)?;
    player.verify()?;
    Ok(summary)
}
