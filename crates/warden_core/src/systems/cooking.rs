//! Cooking recipes at a fire.

use crate::command::{Action, Command, Domain, RejectReason};
use crate::entity::{EntityId, EntityKind, Payload, Station};
use crate::error::SystemFault;
use crate::event::Event;

use super::{misrouted, player_mut, player_ref, CommandError, CommandResult, System, SystemContext};

/// Recipe crafting.
#[derive(Debug, Default, Clone, Copy)]
pub struct CookingSystem;

impl System for CookingSystem {
    fn name(&self) -> &'static str {
        "cooking"
    }

    fn domain(&self) -> Option<Domain> {
        Some(Domain::Cooking)
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
        ctx.process_commands(|ctx, command| match &command.action {
            Action::Cook { station, recipe } => cook(ctx, command, *station, recipe),
            _ => Err(misrouted(command)),
        })
    }
}

fn cook(
    ctx: &mut SystemContext<'_>,
    command: &Command,
    station: EntityId,
    recipe: &str,
) -> CommandResult {
    let content = ctx.content;
    let player = ctx.acting_player(command)?;

    if !matches!(
        ctx.target(station, EntityKind::Structure)?.payload,
        Payload::Structure(Station::CookingFire)
    ) {
        return Err(RejectReason::WrongTargetKind.into());
    }
    ctx.require_range(player, station, ctx.config.interaction_range)?;
    let recipe = content.recipe(recipe).ok_or(RejectReason::UnknownContent)?;

    let inventory = &player_ref(ctx.world, player)?.inventory;
    if recipe
        .inputs
        .iter()
        .any(|input| inventory.count(&input.item) < input.quantity)
    {
        return Err(RejectReason::MissingItems.into());
    }

    let inventory = &mut player_mut(ctx.world, player)?.inventory;
    for input in &recipe.inputs {
        inventory
            .remove(&input.item, input.quantity)
            .map_err(|e| CommandError::Fault(e.to_string()))?;
    }

    ctx.emit(Event::ItemCooked {
        player,
        recipe: recipe.id.clone(),
        item: recipe.output.clone(),
        quantity: recipe.output_quantity,
    });
    Ok(())
}
