//! World reset and snapshot restore.
//!
//! Both operations take `&mut Simulation`, so they can only run between
//! ticks. A restore either installs a fully validated world or falls back
//! to the default world; the previous world is never left half-replaced.

use tracing::{info, warn};

use crate::error::SnapshotError;
use crate::simulation::Simulation;
use crate::snapshot::Snapshot;
use crate::world::WorldState;

/// What a reset or restore did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreReport {
    /// Default world installed on request.
    ResetToDefaults {
        /// Queued commands dropped.
        discarded_commands: usize,
    },
    /// Snapshot installed.
    Restored {
        /// Tick counter of the restored world.
        tick: u64,
        /// Entities restored.
        entities: usize,
        /// Queued commands dropped.
        discarded_commands: usize,
    },
    /// Snapshot rejected; default world installed instead.
    FellBackToDefaults {
        /// Why the snapshot was rejected.
        reason: SnapshotError,
        /// Queued commands dropped.
        discarded_commands: usize,
    },
}

impl RestoreReport {
    /// True unless a restore had to fall back.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !matches!(self, Self::FellBackToDefaults { .. })
    }
}

/// Installs default or restored worlds into a simulation.
#[derive(Debug, Default, Clone, Copy)]
pub struct StateResetManager;

impl StateResetManager {
    /// Replace the world with the default layout at tick zero.
    pub fn reset_to_defaults(sim: &mut Simulation) -> RestoreReport {
        let world = WorldState::initial(sim.content(), sim.config());
        let discarded_commands = sim.replace_world(world);
        info!(discarded_commands, "World reset to defaults");
        RestoreReport::ResetToDefaults { discarded_commands }
    }

    /// Decode, validate and install an encoded snapshot.
    pub fn restore_from(sim: &mut Simulation, bytes: &[u8]) -> RestoreReport {
        match Snapshot::decode(bytes) {
            Ok(snapshot) => Self::restore_snapshot(sim, snapshot),
            Err(reason) => Self::fall_back(sim, reason),
        }
    }

    /// Validate and install a decoded snapshot.
    pub fn restore_snapshot(sim: &mut Simulation, snapshot: Snapshot) -> RestoreReport {
        if let Err(reason) = snapshot.validate(sim.content()) {
            return Self::fall_back(sim, reason);
        }
        let tick = snapshot.tick;
        let entities = snapshot.entities.len();
        let discarded_commands = sim.replace_world(snapshot.into_world());
        info!(tick, entities, discarded_commands, "World restored from snapshot");
        RestoreReport::Restored {
            tick,
            entities,
            discarded_commands,
        }
    }

    fn fall_back(sim: &mut Simulation, reason: SnapshotError) -> RestoreReport {
        warn!(error = %reason, "Snapshot rejected, falling back to defaults");
        let world = WorldState::initial(sim.content(), sim.config());
        let discarded_commands = sim.replace_world(world);
        RestoreReport::FellBackToDefaults {
            reason,
            discarded_commands,
        }
    }
}
