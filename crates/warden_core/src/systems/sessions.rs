//! Binding connections to player entities.
//!
//! `Join` re-attaches a connection to an existing player of the same name,
//! so a reconnecting client keeps its inventory, or creates a new player at
//! the world spawn point. `Leave` unbinds the connection; the player entity
//! stays in the world.

use tracing::info;

use crate::command::{Action, Command, Domain, RejectReason};
use crate::entity::{Payload, PlayerState, Transform};
use crate::error::SystemFault;
use crate::event::Event;

use super::{misrouted, player_mut, CommandResult, System, SystemContext};

/// Join and leave handling.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionSystem;

impl System for SessionSystem {
    fn name(&self) -> &'static str {
        "sessions"
    }

    fn domain(&self) -> Option<Domain> {
        Some(Domain::Session)
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
        ctx.process_commands(|ctx, command| match &command.action {
            Action::Join { name } => join(ctx, command, name),
            Action::Leave => leave(ctx, command),
            _ => Err(misrouted(command)),
        })
    }
}

fn join(ctx: &mut SystemContext<'_>, command: &Command, name: &str) -> CommandResult {
    let connection = command.connection;
    if ctx.world.sessions.contains_key(&connection) {
        return Err(RejectReason::AlreadyJoined.into());
    }
    if name.trim().is_empty() {
        return Err(RejectReason::InvalidQuantity.into());
    }

    let (player, created) = match ctx.world.find_player_by_name(name) {
        Some(existing) => {
            let state = player_mut(ctx.world, existing)?;
            if state.connection.is_some() {
                return Err(RejectReason::NameTaken.into());
            }
            state.connection = Some(connection);
            (existing, false)
        }
        None => {
            let state = PlayerState::new(name, Some(connection), ctx.config);
            let position = ctx.world.spawn_point.to_world();
            let id = ctx
                .world
                .store
                .spawn(Transform::at(position), Payload::Player(state));
            (id, true)
        }
    };

    ctx.world.sessions.insert(connection, player);
    info!(tick = ctx.tick, connection, player, created, name, "Player joined");
    ctx.emit(Event::PlayerJoined {
        player,
        connection,
        created,
    });
    Ok(())
}

fn leave(ctx: &mut SystemContext<'_>, command: &Command) -> CommandResult {
    let connection = command.connection;
    let player = ctx
        .world
        .unbind(connection)
        .ok_or(RejectReason::NotJoined)?;

    info!(tick = ctx.tick, connection, player, "Player left");
    ctx.emit(Event::PlayerLeft { player, connection });
    Ok(())
}
