//! Fishing lines.
//!
//! Casting at a fishing spot draws a bite tick from the world RNG. Reeling
//! in during `[bite, bite + reel_window]` lands a catch rolled from the
//! spot's table; too early or too late and the fish escapes. Lines left
//! past their window expire on their own.

use crate::command::{Action, Command, Domain, RejectReason};
use crate::content::LootEntry;
use crate::entity::{Entity, EntityId, EntityKind, FishingLine, Payload, Station};
use crate::error::SystemFault;
use crate::event::Event;
use crate::rng::DeterministicRng;

use super::{misrouted, player_mut, player_ref, CommandResult, System, SystemContext};

/// Casting and reeling.
#[derive(Debug, Default, Clone, Copy)]
pub struct FishingSystem;

impl System for FishingSystem {
    fn name(&self) -> &'static str {
        "fishing"
    }

    fn domain(&self) -> Option<Domain> {
        Some(Domain::Fishing)
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
        ctx.process_commands(|ctx, command| match &command.action {
            Action::CastLine { spot } => cast(ctx, command, *spot),
            Action::ReelIn => reel_in(ctx, command),
            _ => Err(misrouted(command)),
        })?;
        expire_lines(ctx);
        Ok(())
    }
}

fn cast(ctx: &mut SystemContext<'_>, command: &Command, spot: EntityId) -> CommandResult {
    let content = ctx.content;
    let player = ctx.acting_player(command)?;
    if player_ref(ctx.world, player)?.fishing.is_some() {
        return Err(RejectReason::LineState.into());
    }

    let Payload::Structure(Station::FishingSpot(spot_def)) =
        &ctx.target(spot, EntityKind::Structure)?.payload
    else {
        return Err(RejectReason::WrongTargetKind.into());
    };
    let def = content
        .fishing_spot(spot_def)
        .ok_or(RejectReason::UnknownContent)?;
    ctx.require_range(player, spot, ctx.config.interaction_range)?;

    let wait = ctx
        .world
        .rng
        .range_inclusive(def.min_bite_ticks, def.max_bite_ticks);
    let bite_tick = ctx.tick + u64::from(wait);
    let line = FishingLine {
        spot,
        spot_def: def.id.clone(),
        bite_tick,
        window_end: bite_tick + u64::from(def.reel_window),
    };
    player_mut(ctx.world, player)?.fishing = Some(line);
    ctx.emit(Event::LineCast { player, spot });
    Ok(())
}

fn reel_in(ctx: &mut SystemContext<'_>, command: &Command) -> CommandResult {
    let content = ctx.content;
    let player = ctx.acting_player(command)?;
    let line = player_mut(ctx.world, player)?
        .fishing
        .take()
        .ok_or(RejectReason::LineState)?;

    let spot_exists = ctx.world.store.contains(line.spot);
    let in_window = (line.bite_tick..=line.window_end).contains(&ctx.tick);
    let catch = if spot_exists && in_window {
        content
            .fishing_spot(&line.spot_def)
            .and_then(|def| roll_catch(&mut ctx.world.rng, &def.catches))
    } else {
        None
    };

    match catch {
        Some((item, quantity)) => ctx.emit(Event::FishCaught {
            player,
            item,
            quantity,
        }),
        None => ctx.emit(Event::FishEscaped { player }),
    }
    Ok(())
}

/// First catch entry that passes its chance roll.
fn roll_catch(rng: &mut DeterministicRng, catches: &[LootEntry]) -> Option<(String, u32)> {
    for entry in catches {
        if rng.roll_percent(entry.chance_percent) {
            let quantity = rng.range_inclusive(entry.min, entry.max);
            if quantity > 0 {
                return Some((entry.item.clone(), quantity));
            }
        }
    }
    None
}

fn expire_lines(ctx: &mut SystemContext<'_>) {
    let tick = ctx.tick;
    for id in ctx.world.store.ids_of_kind(EntityKind::Player) {
        let Some(state) = ctx.world.store.get_mut(id).and_then(Entity::as_player_mut) else {
            continue;
        };
        if state.fishing.as_ref().is_some_and(|line| tick > line.window_end) {
            state.fishing = None;
            ctx.emit(Event::FishEscaped { player: id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roll_catch_skips_failed_rolls() {
        let mut rng = DeterministicRng::new(3);
        let catches = vec![
            LootEntry {
                item: "boot".into(),
                min: 1,
                max: 1,
                chance_percent: 0,
            },
            LootEntry {
                item: "trout".into(),
                min: 1,
                max: 2,
                chance_percent: 100,
            },
        ];
        let (item, quantity) = roll_catch(&mut rng, &catches).unwrap();
        assert_eq!(item, "trout");
        assert!((1..=2).contains(&quantity));
    }
}
