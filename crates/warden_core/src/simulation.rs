//! Simulation facade.
//!
//! [`Simulation`] owns the world, the content tables, the command queue,
//! the scheduler and the snapshot manager. One call to [`Simulation::tick`]
//! freezes the queue, runs the pipeline, advances the tick counter and
//! publishes the sync frame.
//!
//! Freezing checks each command's `seq` against the world's per-connection
//! marks, and the tick raises those marks, so a command object resubmitted
//! in any later tick is rejected as a duplicate.

use std::sync::Arc;

use crate::command::{Action, Command, CommandBatch, CommandQueue, CommandSender, Rejection};
use crate::config::SimConfig;
use crate::content::ContentRegistry;
use crate::entity::ConnectionId;
use crate::error::{SnapshotError, SystemFault};
use crate::event::Event;
use crate::scheduler::{SystemHealth, TickScheduler};
use crate::snapshot::{Snapshot, SnapshotManager, SyncFrame};
use crate::world::WorldState;

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Id of the tick that ran; the world counter is now one higher.
    pub tick: u64,
    /// Commands that reached systems, after batch resolution.
    pub commands: Vec<Command>,
    /// Every rejected command.
    pub rejections: Vec<Rejection>,
    /// System faults raised during the tick.
    pub faults: Vec<SystemFault>,
    /// Frame to broadcast.
    pub frame: SyncFrame,
}

impl TickReport {
    /// Events emitted during the tick, in order.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.frame.delta.events
    }
}

/// The authoritative simulation.
#[derive(Debug)]
pub struct Simulation {
    world: WorldState,
    content: Arc<ContentRegistry>,
    config: SimConfig,
    queue: CommandQueue,
    scheduler: TickScheduler,
    snapshots: SnapshotManager,
    carried_events: Vec<Event>,
}

impl Simulation {
    /// Simulation over the default world built from `content`.
    #[must_use]
    pub fn new(content: Arc<ContentRegistry>, config: SimConfig) -> Self {
        let world = WorldState::initial(&content, &config);
        Self::with_world(content, config, world)
    }

    /// Simulation over an existing world.
    #[must_use]
    pub fn with_world(content: Arc<ContentRegistry>, config: SimConfig, world: WorldState) -> Self {
        let scheduler = TickScheduler::new(config.fault_threshold);
        let snapshots = SnapshotManager::new(&world);
        Self {
            world,
            content,
            config,
            queue: CommandQueue::new(),
            scheduler,
            snapshots,
            carried_events: Vec::new(),
        }
    }

    /// Replace the system pipeline.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: TickScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Producer handle for connection tasks.
    #[must_use]
    pub fn command_sender(&self) -> CommandSender {
        self.queue.sender()
    }

    /// Enqueue a command for the next tick.
    pub fn submit(&self, connection: ConnectionId, seq: u64, action: Action) {
        self.queue.push(Command::new(connection, seq, action));
    }

    /// Commands waiting for the next tick.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.queue.pending()
    }

    /// Freeze the queue and run one tick.
    pub fn tick(&mut self) -> TickReport {
        let batch = self.queue.freeze(self.world.tick, &self.world.last_seq);
        self.execute(&batch)
    }

    /// Run one tick over an explicit command list, bypassing the queue.
    ///
    /// Used by replays and tests; the list goes through the same batch
    /// resolution as queued commands.
    pub fn run_batch(&mut self, commands: Vec<Command>) -> TickReport {
        let batch = CommandBatch::from_commands(self.world.tick, commands, &self.world.last_seq);
        self.execute(&batch)
    }

    fn execute(&mut self, batch: &CommandBatch) -> TickReport {
        let tick = self.world.tick;
        let output = self
            .scheduler
            .run_tick(&mut self.world, &self.content, &self.config, batch);
        self.world.record_accepted(batch.accepted_seqs());
        self.world.tick += 1;

        #[cfg(feature = "debug-validation")]
        {
            if let Err(err) = Snapshot::capture(&self.world).validate(&self.content) {
                tracing::warn!(tick, error = %err, "World failed structural check");
            }
        }

        let mut events = std::mem::take(&mut self.carried_events);
        events.extend(output.events);
        let frame = self
            .snapshots
            .publish(&self.world, events, &output.rejections);

        #[cfg(debug_assertions)]
        {
            let hash = self.world.state_hash();
            tracing::debug!(tick = self.world.tick, state_hash = hash, "Simulation state hash");
        }

        TickReport {
            tick,
            commands: batch.commands().to_vec(),
            rejections: output.rejections,
            faults: output.faults,
            frame,
        }
    }

    /// Current world.
    #[must_use]
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Mutable world, for setup between ticks.
    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    /// Content tables.
    #[must_use]
    pub fn content(&self) -> &Arc<ContentRegistry> {
        &self.content
    }

    /// Tuning.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Completed tick count.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.world.tick
    }

    /// Per-system health flags.
    #[must_use]
    pub fn system_health(&self) -> Vec<SystemHealth> {
        self.scheduler.health()
    }

    /// Re-enable a disabled system. Returns false for unknown names.
    pub fn enable_system(&mut self, name: &str) -> bool {
        self.scheduler.enable(name)
    }

    /// Last published snapshot, for joining clients.
    #[must_use]
    pub fn full_snapshot(&self) -> &Snapshot {
        self.snapshots.full_snapshot()
    }

    /// Encode the current world for persistence.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Encode`] if serialization fails.
    pub fn encode_snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        Snapshot::capture(&self.world).encode()
    }

    /// Hash of the current world.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        self.world.state_hash()
    }

    /// Unbind every connection, for a world restored into a fresh process
    /// whose transport connections are all new.
    ///
    /// Players stay in the world and can be rejoined by name. The matching
    /// `PlayerLeft` events go out with the next tick's frame. Returns the
    /// number of released sessions.
    pub fn release_sessions(&mut self) -> usize {
        let connections: Vec<ConnectionId> = self.world.sessions.keys().copied().collect();
        for &connection in &connections {
            if let Some(player) = self.world.unbind(connection) {
                self.carried_events.push(Event::PlayerLeft { player, connection });
            }
        }
        if !connections.is_empty() {
            tracing::info!(sessions = connections.len(), "Released restored sessions");
        }
        connections.len()
    }

    /// Swap in a new world, dropping queued commands and rebasing sync.
    ///
    /// Returns the number of discarded commands.
    pub(crate) fn replace_world(&mut self, world: WorldState) -> usize {
        let discarded = self.queue.clear();
        self.carried_events.clear();
        self.world = world;
        self.snapshots.rebase(&self.world);
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ticks_advance_counter() {
        let mut sim = Simulation::new(Arc::new(ContentRegistry::default()), SimConfig::default());
        let report = sim.tick();
        assert_eq!(report.tick, 0);
        assert_eq!(report.frame.tick, 1);
        assert_eq!(sim.current_tick(), 1);
        assert_eq!(sim.full_snapshot().tick, 1);
    }

    #[test]
    fn released_sessions_announce_leaving_next_tick() {
        let mut sim = Simulation::new(Arc::new(ContentRegistry::default()), SimConfig::default());
        sim.submit(4, 1, Action::Join { name: "ada".into() });
        sim.tick();
        let player = sim.world().player_for(4).expect("joined");

        assert_eq!(sim.release_sessions(), 1);
        assert!(sim.world().sessions.is_empty());
        assert!(sim.world().last_seq.is_empty());

        let report = sim.tick();
        assert_eq!(
            report.events().first(),
            Some(&Event::PlayerLeft {
                player,
                connection: 4
            })
        );
        sim.submit(9, 1, Action::Join { name: "ada".into() });
        sim.tick();
        assert_eq!(sim.world().player_for(9), Some(player));
    }

    #[test]
    fn queued_commands_reach_the_next_tick() {
        let mut sim = Simulation::new(Arc::new(ContentRegistry::default()), SimConfig::default());
        sim.submit(4, 1, Action::Join { name: "ada".into() });
        assert_eq!(sim.pending_commands(), 1);
        let report = sim.tick();
        assert_eq!(report.commands.len(), 1);
        assert!(report.rejections.is_empty());
        assert!(sim.world().player_for(4).is_some());
        assert_eq!(sim.pending_commands(), 0);
    }
}
