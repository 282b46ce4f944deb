//! Server configuration, loaded from RON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use warden_core::config::SimConfig;

use crate::error::{Result, ServerError};

/// Server configuration.
///
/// Missing fields fall back to [`ServerConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Content definitions (RON).
    pub content_path: PathBuf,
    /// Directory for checkpoint files.
    pub snapshot_dir: PathBuf,
    /// Checkpoint every N completed ticks; 0 disables periodic checkpoints.
    pub checkpoint_interval: u64,
    /// Checkpoint files kept on disk.
    pub keep_snapshots: usize,
    /// Frames buffered per subscriber before slow ones start lagging.
    pub frame_capacity: usize,
    /// Restore the newest checkpoint on boot.
    pub restore_on_boot: bool,
    /// Simulation settings.
    pub sim: SimConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            content_path: PathBuf::from("assets/content.ron"),
            snapshot_dir: PathBuf::from("snapshots"),
            checkpoint_interval: 600,
            keep_snapshots: 5,
            frame_capacity: 64,
            restore_on_boot: true,
            sim: SimConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse a config from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the text is not a valid config.
    pub fn from_ron_str(path: &Path, text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| ServerError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Read and parse a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ServerError::io(path, e))?;
        Self::from_ron_str(path, &text)
    }

    /// Tick rate in Hz.
    #[must_use]
    pub fn tick_rate(&self) -> u32 {
        self.sim.tick_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_sim_fields_override_defaults() {
        let config = ServerConfig::from_ron_str(
            Path::new("inline"),
            "(checkpoint_interval: 20, sim: (tick_rate: 10, seed: 7))",
        )
        .expect("valid config");
        assert_eq!(config.checkpoint_interval, 20);
        assert_eq!(config.sim.tick_rate, 10);
        assert_eq!(config.sim.seed, 7);
        assert_eq!(config.keep_snapshots, 5);
        assert_eq!(config.sim.inventory_slots, SimConfig::default().inventory_slots);
    }

    #[test]
    fn shipped_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets/server.ron");
        let config = ServerConfig::load(&path).expect("shipped config");
        assert_eq!(config.content_path, PathBuf::from("assets/content.ron"));
        assert_eq!(config.sim.starting_gold, 10);
    }

    #[test]
    fn garbage_is_a_config_error() {
        let err = ServerConfig::from_ron_str(Path::new("bad.ron"), "(((").unwrap_err();
        assert!(matches!(err, ServerError::Config { .. }));
    }
}
