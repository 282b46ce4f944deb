//! Checkpoint persistence.
//!
//! Checkpoints are opaque encoded snapshots. The file store names them
//! `snapshot-<generation>-<tick>.bin`, both zero-padded. The generation
//! grows with every save and decides which checkpoint is newest; the world
//! tick does not, since a reset starts it over at zero. Files are written
//! through a temporary file plus rename so a crash never leaves a
//! half-written checkpoint under a real name.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, ServerError};

const PREFIX: &str = "snapshot-";
const EXTENSION: &str = "bin";

/// Somewhere encoded snapshots can be kept.
pub trait SnapshotStore: Send {
    /// Persist a checkpoint taken after `tick` completed ticks.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint could not be written.
    fn save(&mut self, tick: u64, bytes: &[u8]) -> Result<()>;

    /// Newest checkpoint, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_latest(&self) -> Result<Option<(u64, Vec<u8>)>>;
}

/// A checkpoint file on disk.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CheckpointFile {
    /// Save order; higher is newer.
    pub generation: u64,
    /// Completed ticks of the saved world.
    pub tick: u64,
    /// File location.
    pub path: PathBuf,
}

/// Checkpoints as files in one directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
    keep: usize,
    next_generation: u64,
}

impl FileSnapshotStore {
    /// Store in `dir`, keeping the newest `keep` files (at least one).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or listed.
    pub fn open(dir: impl Into<PathBuf>, keep: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| ServerError::io(&dir, e))?;
        let mut store = Self {
            dir,
            keep: keep.max(1),
            next_generation: 0,
        };
        store.next_generation = store.list()?.last().map_or(0, |c| c.generation + 1);
        Ok(store)
    }

    /// Checkpoint directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, generation: u64, tick: u64) -> PathBuf {
        self.dir
            .join(format!("{PREFIX}{generation:020}-{tick:020}.{EXTENSION}"))
    }

    fn parse(path: &Path) -> Option<(u64, u64)> {
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            return None;
        }
        let stem = path.file_stem()?.to_str()?.strip_prefix(PREFIX)?;
        let (generation, tick) = stem.split_once('-')?;
        Some((generation.parse().ok()?, tick.parse().ok()?))
    }

    /// Checkpoints on disk, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn list(&self) -> Result<Vec<CheckpointFile>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| ServerError::io(&self.dir, e))?;
        let mut found = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| ServerError::io(&self.dir, e))?.path();
            if let Some((generation, tick)) = Self::parse(&path) {
                found.push(CheckpointFile {
                    generation,
                    tick,
                    path,
                });
            }
        }
        found.sort();
        Ok(found)
    }

    fn prune(&self) -> Result<()> {
        let found = self.list()?;
        let excess = found.len().saturating_sub(self.keep);
        for old in found.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&old.path) {
                warn!(
                    generation = old.generation,
                    tick = old.tick,
                    "Failed to prune checkpoint {}: {e}",
                    old.path.display()
                );
            }
        }
        Ok(())
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&mut self, tick: u64, bytes: &[u8]) -> Result<()> {
        let generation = self.next_generation;
        let path = self.path_for(generation, tick);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|e| ServerError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| ServerError::io(&path, e))?;
        self.next_generation += 1;
        debug!(generation, tick, bytes = bytes.len(), "Checkpoint written");
        self.prune()
    }

    fn load_latest(&self) -> Result<Option<(u64, Vec<u8>)>> {
        let Some(newest) = self.list()?.pop() else {
            return Ok(None);
        };
        let bytes = fs::read(&newest.path).map_err(|e| ServerError::io(&newest.path, e))?;
        Ok(Some((newest.tick, bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticks(store: &FileSnapshotStore) -> Vec<u64> {
        store
            .list()
            .expect("list")
            .into_iter()
            .map(|c| c.tick)
            .collect()
    }

    #[test]
    fn newest_save_wins_and_old_ones_are_pruned() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = FileSnapshotStore::open(dir.path(), 2).expect("open");
        assert_eq!(store.load_latest().expect("load"), None);

        store.save(5, b"five").expect("save");
        store.save(100, b"hundred").expect("save");
        store.save(20, b"twenty").expect("save");

        assert_eq!(ticks(&store), vec![100, 20]);
        assert_eq!(
            store.load_latest().expect("load"),
            Some((20, b"twenty".to_vec()))
        );
    }

    #[test]
    fn generations_continue_after_reopening() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = FileSnapshotStore::open(dir.path(), 3).expect("open");
        store.save(50, b"before reset").expect("save");

        let mut reopened = FileSnapshotStore::open(dir.path(), 3).expect("reopen");
        reopened.save(5, b"after reset").expect("save");
        let newest = reopened.list().expect("list").pop().expect("newest");
        assert_eq!(newest.generation, 1);
        assert_eq!(
            reopened.load_latest().expect("load"),
            Some((5, b"after reset".to_vec()))
        );
    }

    #[test]
    fn stray_files_are_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("notes.txt"), "hi").expect("write");
        fs::write(dir.path().join("snapshot-abc.bin"), "x").expect("write");
        fs::write(dir.path().join("snapshot-00000000000000000009.bin"), "x").expect("write");
        fs::write(
            dir.path()
                .join("snapshot-00000000000000000001-00000000000000000009.tmp"),
            "x",
        )
        .expect("write");
        let store = FileSnapshotStore::open(dir.path(), 3).expect("open");
        assert!(store.list().expect("list").is_empty());
    }
}
