//! Mining resource nodes.
//!
//! A swing needs a node in reach with charges left, an elapsed gather
//! cooldown, enough stamina and a carried tool of at least the ore's tier.
//! Each swing
//! removes one charge and emits `OreMined`; the inventory system credits
//! the ore. A node at zero charges stays in the store until cleanup, so a
//! second swing in the same tick sees it as depleted.

use tracing::debug;

use crate::command::{Action, Command, Domain, RejectReason};
use crate::entity::{EntityId, EntityKind, Payload};
use crate::error::SystemFault;
use crate::event::Event;

use super::{misrouted, missing, player_mut, player_ref, CommandResult, System, SystemContext};

/// Resource node mining.
#[derive(Debug, Default, Clone, Copy)]
pub struct MiningSystem;

impl System for MiningSystem {
    fn name(&self) -> &'static str {
        "mining"
    }

    fn domain(&self) -> Option<Domain> {
        Some(Domain::Mining)
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
        ctx.process_commands(|ctx, command| match &command.action {
            Action::Mine { node } => mine(ctx, command, *node),
            _ => Err(misrouted(command)),
        })
    }
}

fn mine(ctx: &mut SystemContext<'_>, command: &Command, node: EntityId) -> CommandResult {
    let content = ctx.content;
    let player = ctx.acting_player(command)?;

    let Payload::ResourceNode(state) = &ctx.target(node, EntityKind::ResourceNode)?.payload
    else {
        return Err(missing(node));
    };
    let ore_id = state.ore.clone();
    let charges = state.charges;

    ctx.require_range(player, node, ctx.config.interaction_range)?;
    if charges == 0 {
        return Err(RejectReason::Depleted.into());
    }

    let state = player_ref(ctx.world, player)?;
    if ctx.tick < state.cooldowns.next_gather_tick {
        return Err(RejectReason::OnCooldown.into());
    }
    let cost = ctx.config.swing_stamina_cost;
    if state.stamina < cost {
        return Err(RejectReason::Exhausted.into());
    }
    let ore = content.ore(&ore_id).ok_or(RejectReason::UnknownContent)?;
    let tool = state.inventory.best_tool(content);
    if ore.required_tier > 0 && tool.map_or(true, |(_, tier)| tier < ore.required_tier) {
        return Err(RejectReason::InsufficientTool.into());
    }

    let remaining = match ctx.world.store.get_mut(node).map(|e| &mut e.payload) {
        Some(Payload::ResourceNode(state)) => {
            state.charges -= 1;
            state.charges
        }
        _ => return Err(missing(node)),
    };

    let gather_cooldown = u64::from(ctx.config.gather_cooldown);
    let tick = ctx.tick;
    let state = player_mut(ctx.world, player)?;
    state.cooldowns.next_gather_tick = tick + gather_cooldown;
    state.stamina -= cost;
    let mut broken = None;
    if ore.required_tier > 0 {
        if let Some((slot, _)) = tool {
            let item = state.inventory.slots().get(slot).map(|s| s.item.clone());
            if state.inventory.wear_tool(slot) {
                broken = item;
            }
        }
    }

    debug!(tick, player, node, ore = %ore.id, remaining, "Ore mined");
    ctx.emit(Event::OreMined {
        node,
        player,
        item: ore.item.clone(),
        quantity: ore.yield_per_swing,
    });
    if let Some(item) = broken {
        ctx.emit(Event::ToolBroke { player, item });
    }
    if remaining == 0 {
        ctx.emit(Event::NodeDepleted { node });
    }
    Ok(())
}
