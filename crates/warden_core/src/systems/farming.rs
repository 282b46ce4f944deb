//! Planting, growing and harvesting crops.

use crate::command::{Action, Command, Domain, RejectReason};
use crate::content::{DefId, ItemKind};
use crate::entity::{CropState, EntityId, EntityKind, Payload, Transform};
use crate::error::SystemFault;
use crate::event::Event;
use crate::math::TilePos;

use super::{misrouted, missing, player_mut, CommandResult, System, SystemContext};

/// Crop lifecycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct FarmingSystem;

impl System for FarmingSystem {
    fn name(&self) -> &'static str {
        "farming"
    }

    fn domain(&self) -> Option<Domain> {
        Some(Domain::Farming)
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
        grow(ctx)?;
        ctx.process_commands(|ctx, command| match &command.action {
            Action::Plant { seed, tile } => plant(ctx, command, seed, *tile),
            Action::Harvest { crop } => harvest(ctx, command, *crop),
            _ => Err(misrouted(command)),
        })
    }
}

/// Advance every growing crop; crops planted this tick start next tick.
fn grow(ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
    let content = ctx.content;
    for id in ctx.world.store.ids_of_kind(EntityKind::Crop) {
        let Some(Payload::Crop(crop)) = ctx.world.store.get_mut(id).map(|e| &mut e.payload) else {
            continue;
        };
        let Some(def) = content.crop(&crop.crop) else {
            let message = format!("crop {id} has unknown definition '{}'", crop.crop);
            return Err(ctx.fault(message));
        };
        if crop.stage + 1 >= def.stages {
            continue;
        }
        crop.ticks_in_stage += 1;
        if crop.ticks_in_stage < def.ticks_per_stage {
            continue;
        }
        crop.stage += 1;
        crop.ticks_in_stage = 0;
        let stage = crop.stage;
        ctx.emit(Event::CropGrew { crop: id, stage });
    }
    Ok(())
}

fn plant(
    ctx: &mut SystemContext<'_>,
    command: &Command,
    seed: &str,
    tile: TilePos,
) -> CommandResult {
    let content = ctx.content;
    let player = ctx.acting_player(command)?;

    let crop_id: DefId = match content.item(seed).map(|d| &d.kind) {
        Some(ItemKind::Seed { crop }) => crop.clone(),
        Some(_) => return Err(RejectReason::NotUsable.into()),
        None => return Err(RejectReason::UnknownContent.into()),
    };
    content.crop(&crop_id).ok_or(RejectReason::UnknownContent)?;

    let position = tile.to_world();
    let in_reach = ctx
        .world
        .store
        .get(player)
        .is_some_and(|e| e.position().within(position, ctx.config.interaction_range));
    if !in_reach {
        return Err(RejectReason::OutOfRange.into());
    }

    let mut occupied = false;
    ctx.world
        .store
        .for_each_of_kind(EntityKind::Crop, |e| occupied |= e.position().to_tile() == tile);
    if occupied {
        return Err(RejectReason::TileOccupied.into());
    }

    player_mut(ctx.world, player)?
        .inventory
        .remove(seed, 1)
        .map_err(|_| RejectReason::MissingItems)?;

    let crop = ctx.world.store.spawn(
        Transform::at(position),
        Payload::Crop(CropState {
            crop: crop_id,
            planter: player,
            stage: 0,
            ticks_in_stage: 0,
        }),
    );
    ctx.emit(Event::CropPlanted { crop, player, tile });
    Ok(())
}

fn harvest(ctx: &mut SystemContext<'_>, command: &Command, crop: EntityId) -> CommandResult {
    let content = ctx.content;
    let player = ctx.acting_player(command)?;

    let Payload::Crop(state) = &ctx.target(crop, EntityKind::Crop)?.payload else {
        return Err(missing(crop));
    };
    let def = content.crop(&state.crop).ok_or(RejectReason::UnknownContent)?;
    let mature = state.stage + 1 >= def.stages;

    ctx.require_range(player, crop, ctx.config.interaction_range)?;
    if !mature {
        return Err(RejectReason::NotMature.into());
    }

    ctx.world.store.remove(crop);
    ctx.emit(Event::CropHarvested {
        crop,
        player,
        item: def.produce.clone(),
        quantity: def.yield_amount,
    });
    ctx.emit(Event::EntityRemoved {
        entity: crop,
        kind: EntityKind::Crop,
    });
    Ok(())
}
