//! Server-validated player locomotion.
//!
//! `Move` sets a destination; every tick each living player with a
//! destination steps toward it by at most `player_speed` (halved while
//! slowed). Arrival clears the destination.

use crate::command::{Action, Domain};
use crate::entity::{has_status, EntityKind, StatusKind};
use crate::error::SystemFault;
use crate::event::Event;
use crate::math::{Facing, Fixed};

use super::{misrouted, player_mut, System, SystemContext};

/// Player movement.
#[derive(Debug, Default, Clone, Copy)]
pub struct MovementSystem;

impl System for MovementSystem {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn domain(&self) -> Option<Domain> {
        Some(Domain::Movement)
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
        ctx.process_commands(|ctx, command| {
            let Action::Move { destination } = &command.action else {
                return Err(misrouted(command));
            };
            let player = ctx.acting_player(command)?;
            player_mut(ctx.world, player)?.destination = Some(*destination);
            Ok(())
        })?;

        for id in ctx.world.store.ids_of_kind(EntityKind::Player) {
            let Some(entity) = ctx.world.store.get_mut(id) else {
                continue;
            };
            if !entity.is_living_combatant() {
                continue;
            }
            let position = entity.transform.position;
            let facing = entity.transform.facing;
            let Some(state) = entity.as_player_mut() else {
                continue;
            };
            let Some(destination) = state.destination else {
                continue;
            };

            let mut speed = ctx.config.player_speed;
            if has_status(&state.statuses, StatusKind::Slowed) {
                speed /= Fixed::from_num(2);
            }
            let next = position.step_toward(destination, speed);
            if next == destination {
                state.destination = None;
            }
            if next == position {
                continue;
            }
            entity.transform.position = next;
            entity.transform.facing = Facing::from_direction(next - position, facing);
            ctx.emit(Event::PlayerMoved {
                player: id,
                position: next,
            });
        }
        Ok(())
    }
}
