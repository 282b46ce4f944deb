//! Recording and playing back runs.
//!
//! A replay stores the encoded starting snapshot and the resolved commands
//! of every tick. Playing it back through a fresh simulation must land on
//! the recorded final state hash; anything else is a desync.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::config::SimConfig;
use crate::content::ContentRegistry;
use crate::error::{CoreError, Result};
use crate::simulation::{Simulation, TickReport};
use crate::snapshot::Snapshot;

/// Replay format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Commands that ran during one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayTick {
    /// Tick id.
    pub tick: u64,
    /// Resolved commands in batch order.
    pub commands: Vec<Command>,
}

/// Complete replay data structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Encoded starting snapshot.
    pub initial_snapshot: Vec<u8>,
    /// Ticks that carried commands, ascending.
    pub ticks: Vec<ReplayTick>,
    /// Tick counter when recording stopped.
    pub final_tick: u64,
    /// State hash when recording stopped.
    pub final_hash: u64,
}

impl Replay {
    /// Start recording from the simulation's current world.
    ///
    /// # Errors
    /// Returns an error if the world cannot be encoded.
    pub fn new(simulation: &Simulation) -> Result<Self> {
        Ok(Self {
            version: REPLAY_VERSION,
            initial_snapshot: simulation.encode_snapshot()?,
            ticks: Vec::new(),
            final_tick: simulation.current_tick(),
            final_hash: simulation.state_hash(),
        })
    }

    /// Record one finished tick.
    pub fn record(&mut self, report: &TickReport) {
        if !report.commands.is_empty() {
            self.ticks.push(ReplayTick {
                tick: report.tick,
                commands: report.commands.clone(),
            });
        }
        self.final_tick = report.frame.tick;
    }

    /// Seal the replay with the simulation's final state.
    pub fn finalize(&mut self, simulation: &Simulation) {
        self.final_tick = simulation.current_tick();
        self.final_hash = simulation.state_hash();
    }

    /// Start tick of the recording.
    ///
    /// # Errors
    /// Returns an error if the initial snapshot does not decode.
    pub fn start_tick(&self) -> Result<u64> {
        Ok(Snapshot::decode(&self.initial_snapshot)?.tick)
    }

    /// Commands recorded for `tick`.
    #[must_use]
    pub fn commands_at_tick(&self, tick: u64) -> &[Command] {
        self.ticks
            .binary_search_by_key(&tick, |t| t.tick)
            .map_or(&[], |i| self.ticks[i].commands.as_slice())
    }

    /// Total number of recorded commands.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.ticks.iter().map(|t| t.commands.len()).sum()
    }

    /// Serialize with bincode.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| CoreError::ReplayFormat(format!("Failed to serialize replay: {e}")))
    }

    /// Deserialize and check the version.
    ///
    /// # Errors
    /// Returns an error for undecodable bytes or another format version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let replay: Self = bincode::deserialize(bytes)
            .map_err(|e| CoreError::ReplayFormat(format!("Failed to deserialize replay: {e}")))?;
        if replay.version != REPLAY_VERSION {
            return Err(CoreError::ReplayFormat(format!(
                "Replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }
        Ok(replay)
    }
}

/// Replay playback controller.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    content: Arc<ContentRegistry>,
    config: SimConfig,
    simulation: Simulation,
}

impl ReplayPlayer {
    /// Player positioned at the start of `replay`.
    ///
    /// # Errors
    /// Returns an error if the initial snapshot is unusable.
    pub fn new(replay: Replay, content: Arc<ContentRegistry>, config: SimConfig) -> Result<Self> {
        let simulation = Self::initial_simulation(&replay, &content, &config)?;
        Ok(Self {
            replay,
            content,
            config,
            simulation,
        })
    }

    fn initial_simulation(
        replay: &Replay,
        content: &Arc<ContentRegistry>,
        config: &SimConfig,
    ) -> Result<Simulation> {
        let snapshot = Snapshot::decode(&replay.initial_snapshot)?;
        snapshot.validate(content)?;
        Ok(Simulation::with_world(
            Arc::clone(content),
            config.clone(),
            snapshot.into_world(),
        ))
    }

    /// Run one recorded tick and return its report, or `None` at the end.
    pub fn step(&mut self) -> Option<TickReport> {
        if self.is_finished() {
            return None;
        }
        let tick = self.simulation.current_tick();
        let commands = self.replay.commands_at_tick(tick).to_vec();
        Some(self.simulation.run_batch(commands))
    }

    /// Run one recorded tick. Returns true while more ticks remain.
    pub fn advance(&mut self) -> bool {
        self.step().is_some() && !self.is_finished()
    }

    /// Restart and play up to `target_tick`.
    ///
    /// # Errors
    /// Returns an error if the initial snapshot is unusable.
    pub fn seek(&mut self, target_tick: u64) -> Result<()> {
        self.simulation = Self::initial_simulation(&self.replay, &self.content, &self.config)?;
        while self.simulation.current_tick() < target_tick && self.advance() {}
        Ok(())
    }

    /// Play to the end and compare the final hash.
    ///
    /// # Errors
    /// Returns [`CoreError::DesyncDetected`] when the hashes differ.
    pub fn verify(&mut self) -> Result<()> {
        self.seek(self.replay.final_tick)?;
        let actual = self.simulation.state_hash();
        if actual == self.replay.final_hash {
            Ok(())
        } else {
            Err(CoreError::DesyncDetected {
                tick: self.simulation.current_tick(),
                expected: self.replay.final_hash,
                actual,
            })
        }
    }

    /// Tick counter of the playback simulation.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.simulation.current_tick()
    }

    /// Playback simulation.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// True once the recorded final tick is reached.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.simulation.current_tick() >= self.replay.final_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Action;
    use crate::math::Vec2Fixed;

    fn recorded_run() -> (Replay, Arc<ContentRegistry>) {
        let content = Arc::new(ContentRegistry::default());
        let mut sim = Simulation::new(Arc::clone(&content), SimConfig::default());
        let mut replay = Replay::new(&sim).expect("replay");
        sim.submit(1, 1, Action::Join { name: "ada".into() });
        replay.record(&sim.tick());
        sim.submit(
            1,
            2,
            Action::Move {
                destination: Vec2Fixed::from_ints(5, 0),
            },
        );
        for _ in 0..10 {
            replay.record(&sim.tick());
        }
        replay.finalize(&sim);
        (replay, content)
    }

    #[test]
    fn playback_matches_recording() {
        let (replay, content) = recorded_run();
        assert_eq!(replay.final_tick, 11);
        assert_eq!(replay.command_count(), 2);

        let bytes = replay.to_bytes().expect("encode");
        let replay = Replay::from_bytes(&bytes).expect("decode");
        let mut player = ReplayPlayer::new(replay, content, SimConfig::default()).expect("player");
        player.verify().expect("no desync");
        assert!(player.is_finished());
    }

    #[test]
    fn tampered_hash_is_a_desync() {
        let (mut replay, content) = recorded_run();
        replay.final_hash ^= 1;
        let mut player = ReplayPlayer::new(replay, content, SimConfig::default()).expect("player");
        assert!(matches!(player.verify(), Err(CoreError::DesyncDetected { .. })));
    }
}
