//! Domain systems.
//!
//! Each system is stateless between invocations: everything it needs lives
//! in the [`SystemContext`] for the current tick. Systems talk to each other
//! only through the tick's ordered event log, never by calling one another.
//!
//! # Pipeline Order
//!
//! 1. **sessions** - bind connections to players
//! 2. **movement** - walk players toward their destination
//! 3. **hazards** - status expiry, hazard pulses
//! 4. **mining**, **farming**, **fishing**, **cooking**, **vendor** - economy actions
//! 5. **combat** - player and mob attacks become `AttackLanded`
//! 6. **damage** - accumulate hits, set health once
//! 7. **mob_ai** - state machines and mob movement
//! 8. **waves** - wave state machines and spawning
//! 9. **inventory** - credit items, roll loot, pickups and drops
//! 10. **cleanup** - remove dead and expired entities, respawn players

pub mod cleanup;
pub mod combat;
pub mod cooking;
pub mod damage;
pub mod farming;
pub mod fishing;
pub mod hazards;
pub mod inventory;
pub mod mining;
pub mod mob_ai;
pub mod movement;
pub mod sessions;
pub mod vendor;
pub mod waves;

use crate::command::{Command, Domain, RejectReason, Rejection};
use crate::config::SimConfig;
use crate::content::ContentRegistry;
use crate::entity::{Entity, EntityId, EntityKind, PlayerState};
use crate::error::SystemFault;
use crate::event::Event;
use crate::math::Fixed;
use crate::world::WorldState;

/// A gameplay system run once per tick.
pub trait System: Send {
    /// Stable name used in logs and health reports.
    fn name(&self) -> &'static str;

    /// Command domain this system owns, if it accepts commands.
    fn domain(&self) -> Option<Domain> {
        None
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// Returns a [`SystemFault`] on an unexpected internal error. Invalid
    /// commands are not errors; they are rejected through the context.
    fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault>;
}

/// Outcome of handling one command that did not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command was invalid against current state.
    Rejected(RejectReason),
    /// Something that should never happen did.
    Fault(String),
}

impl From<RejectReason> for CommandError {
    fn from(reason: RejectReason) -> Self {
        Self::Rejected(reason)
    }
}

/// Result of handling a single command.
pub type CommandResult = Result<(), CommandError>;

/// Everything a system may touch during one tick.
pub struct SystemContext<'a> {
    /// Tick being processed.
    pub tick: u64,
    /// The world.
    pub world: &'a mut WorldState,
    /// Static content.
    pub content: &'a ContentRegistry,
    /// Tuning.
    pub config: &'a SimConfig,
    /// This system's commands, in batch order.
    pub commands: &'a [Command],
    /// Events emitted so far this tick.
    pub events: &'a mut Vec<Event>,
    /// Rejections recorded so far this tick.
    pub rejections: &'a mut Vec<Rejection>,
    system: &'static str,
    handled: usize,
}

impl<'a> SystemContext<'a> {
    /// Build a context for `system`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        system: &'static str,
        tick: u64,
        world: &'a mut WorldState,
        content: &'a ContentRegistry,
        config: &'a SimConfig,
        commands: &'a [Command],
        events: &'a mut Vec<Event>,
        rejections: &'a mut Vec<Rejection>,
    ) -> Self {
        Self {
            tick,
            world,
            content,
            config,
            commands,
            events,
            rejections,
            system,
            handled: 0,
        }
    }

    /// Number of commands that reached an outcome.
    #[must_use]
    pub const fn handled(&self) -> usize {
        self.handled
    }

    /// Append an event to the tick log.
    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Record a rejection for `command`.
    pub fn reject(&mut self, command: &Command, reason: RejectReason) {
        tracing::debug!(
            tick = self.tick,
            system = self.system,
            connection = command.connection,
            seq = command.seq,
            reason = %reason,
            "Command rejected"
        );
        self.rejections.push(Rejection::of(command, reason));
    }

    /// Build a fault attributed to this system and tick.
    #[must_use]
    pub fn fault(&self, message: impl Into<String>) -> SystemFault {
        SystemFault {
            system: self.system,
            tick: self.tick,
            message: message.into(),
        }
    }

    /// Run `handler` for every command in order.
    ///
    /// Rejections are recorded; a fault stops processing and is returned,
    /// leaving the remaining commands unhandled.
    pub fn process_commands(
        &mut self,
        mut handler: impl FnMut(&mut Self, &Command) -> CommandResult,
    ) -> Result<(), SystemFault> {
        let commands = self.commands;
        for command in commands {
            match handler(self, command) {
                Ok(()) => {}
                Err(CommandError::Rejected(reason)) => self.reject(command, reason),
                Err(CommandError::Fault(message)) => {
                    return Err(self.fault(format!(
                        "connection {} seq {}: {message}",
                        command.connection, command.seq
                    )));
                }
            }
            self.handled += 1;
        }
        Ok(())
    }

    /// Living player controlled by the command's connection.
    pub fn acting_player(&self, command: &Command) -> Result<EntityId, RejectReason> {
        let id = self
            .world
            .player_for(command.connection)
            .ok_or(RejectReason::NotJoined)?;
        let alive = self
            .world
            .store
            .get(id)
            .is_some_and(Entity::is_living_combatant);
        if alive {
            Ok(id)
        } else {
            Err(RejectReason::Dead)
        }
    }

    /// Resolve a target id, checking it exists and has the expected kind.
    pub fn target(&self, id: EntityId, kind: EntityKind) -> Result<&Entity, RejectReason> {
        let entity = self.world.store.get(id).ok_or(RejectReason::StaleTarget)?;
        if entity.kind() == kind {
            Ok(entity)
        } else {
            Err(RejectReason::WrongTargetKind)
        }
    }

    /// Check that `player` is within `range` of `target`.
    pub fn require_range(
        &self,
        player: EntityId,
        target: EntityId,
        range: Fixed,
    ) -> Result<(), RejectReason> {
        let (Some(a), Some(b)) = (self.world.store.get(player), self.world.store.get(target))
        else {
            return Err(RejectReason::StaleTarget);
        };
        if a.position().within(b.position(), range) {
            Ok(())
        } else {
            Err(RejectReason::OutOfRange)
        }
    }
}

/// Build a fault message for an entity that vanished mid-handler.
pub(crate) fn missing(id: EntityId) -> CommandError {
    CommandError::Fault(format!("entity {id} vanished while handling command"))
}

/// Fault for a command routed to the wrong system.
pub(crate) fn misrouted(command: &Command) -> CommandError {
    CommandError::Fault(format!("unexpected action {:?}", command.action.domain()))
}

/// Mutable player payload for an id the handler already resolved.
pub(crate) fn player_mut(
    world: &mut WorldState,
    id: EntityId,
) -> Result<&mut PlayerState, CommandError> {
    world
        .store
        .get_mut(id)
        .and_then(Entity::as_player_mut)
        .ok_or_else(|| missing(id))
}

/// Player payload for an id the handler already resolved.
pub(crate) fn player_ref(world: &WorldState, id: EntityId) -> Result<&PlayerState, CommandError> {
    world
        .store
        .get(id)
        .and_then(Entity::as_player)
        .ok_or_else(|| missing(id))
}

/// The standard pipeline in execution order.
#[must_use]
pub fn default_pipeline() -> Vec<Box<dyn System>> {
    vec![
        Box::new(sessions::SessionSystem),
        Box::new(movement::MovementSystem),
        Box::new(hazards::HazardSystem),
        Box::new(mining::MiningSystem),
        Box::new(farming::FarmingSystem),
        Box::new(fishing::FishingSystem),
        Box::new(cooking::CookingSystem),
        Box::new(vendor::VendorSystem),
        Box::new(combat::CombatSystem),
        Box::new(damage::DamageSystem),
        Box::new(mob_ai::MobAiSystem),
        Box::new(waves::WaveSystem),
        Box::new(inventory::InventorySystem),
        Box::new(cleanup::CleanupSystem),
    ]
}
