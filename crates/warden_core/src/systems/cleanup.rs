//! End-of-tick removal, respawn and stamina recovery.
//!
//! Runs last so every other system saw dead mobs, depleted nodes and
//! expiring ground items during the tick that finished them. Stamina
//! recovers after the tick's swings were paid for.

use tracing::debug;

use crate::entity::{Entity, EntityId, EntityKind, Payload};
use crate::error::SystemFault;
use crate::event::Event;
use crate::math::Facing;

use super::{System, SystemContext};

/// Removes finished entities and respawns dead players.
#[derive(Debug, Default, Clone, Copy)]
pub struct CleanupSystem;

impl System for CleanupSystem {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
        let tick = ctx.tick;
        let mut doomed: Vec<(EntityId, EntityKind)> = Vec::new();
        let mut respawns: Vec<EntityId> = Vec::new();

        for entity in ctx.world.store.iter() {
            let finished = match &entity.payload {
                Payload::Mob(mob) => mob.health.is_dead(),
                Payload::ResourceNode(node) => node.charges == 0,
                Payload::DroppedItem(drop) => drop.despawn_tick <= tick,
                Payload::Player(player) => {
                    if player.health.is_dead() {
                        respawns.push(entity.id);
                    }
                    false
                }
                Payload::Crop(_) | Payload::Structure(_) => false,
            };
            if finished {
                doomed.push((entity.id, entity.kind()));
            }
        }

        for (entity, kind) in doomed {
            ctx.world.store.remove(entity);
            ctx.emit(Event::EntityRemoved { entity, kind });
        }

        let max_stamina = ctx.config.player_max_stamina;
        let regen = ctx.config.stamina_regen;
        for id in ctx.world.store.ids_of_kind(EntityKind::Player) {
            if let Some(state) = ctx.world.store.get_mut(id).and_then(Entity::as_player_mut) {
                if !state.health.is_dead() && state.stamina < max_stamina {
                    state.stamina = state.stamina.saturating_add(regen).min(max_stamina);
                }
            }
        }

        let position = ctx.world.spawn_point.to_world();
        for player in respawns {
            let Some(entity) = ctx.world.store.get_mut(player) else {
                continue;
            };
            entity.transform.position = position;
            entity.transform.facing = Facing::default();
            if let Some(state) = entity.as_player_mut() {
                state.health.current = state.health.max;
                state.stamina = max_stamina;
                state.statuses.clear();
                state.fishing = None;
                state.destination = None;
            }
            debug!(tick, player, "Player respawned");
            ctx.emit(Event::PlayerRespawned { player, position });
        }
        Ok(())
    }
}
