//! NPC vendor trades.
//!
//! Selling debits the goods and credits gold immediately. Buying debits
//! gold immediately and leaves the goods to the inventory system via
//! `ItemPurchased`. The room check counts goods already owed to the buyer
//! this tick, so repeated purchases cannot spill onto the ground. Vendors
//! buy anything with a non-zero sell price and
//! sell only their stock list.

use crate::command::{Action, Command, Domain, RejectReason};
use crate::content::DefId;
use crate::entity::{EntityId, EntityKind, Payload, Station};
use crate::error::SystemFault;
use crate::event::Event;

use super::inventory::projected_inventory;
use super::{
    misrouted, player_mut, player_ref, CommandError, CommandResult, System, SystemContext,
};

/// Buying and selling.
#[derive(Debug, Default, Clone, Copy)]
pub struct VendorSystem;

impl System for VendorSystem {
    fn name(&self) -> &'static str {
        "vendor"
    }

    fn domain(&self) -> Option<Domain> {
        Some(Domain::Vendor)
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
        ctx.process_commands(|ctx, command| match &command.action {
            Action::Sell {
                vendor,
                item,
                quantity,
            } => sell(ctx, command, *vendor, item, *quantity),
            Action::Buy {
                vendor,
                item,
                quantity,
            } => buy(ctx, command, *vendor, item, *quantity),
            _ => Err(misrouted(command)),
        })
    }
}

/// Resolve the vendor structure and check reach; returns the vendor definition id.
fn vendor_in_reach(
    ctx: &SystemContext<'_>,
    player: EntityId,
    vendor: EntityId,
) -> Result<DefId, RejectReason> {
    let Payload::Structure(Station::Vendor(def)) =
        &ctx.target(vendor, EntityKind::Structure)?.payload
    else {
        return Err(RejectReason::WrongTargetKind);
    };
    let def = def.clone();
    ctx.require_range(player, vendor, ctx.config.interaction_range)?;
    Ok(def)
}

fn sell(
    ctx: &mut SystemContext<'_>,
    command: &Command,
    vendor: EntityId,
    item: &str,
    quantity: u32,
) -> CommandResult {
    let content = ctx.content;
    let player = ctx.acting_player(command)?;
    if quantity == 0 {
        return Err(RejectReason::InvalidQuantity.into());
    }
    vendor_in_reach(ctx, player, vendor)?;

    let def = content.item(item).ok_or(RejectReason::UnknownContent)?;
    if def.sell_price == 0 {
        return Err(RejectReason::NotStocked.into());
    }
    let gold = def.sell_price.saturating_mul(quantity);

    let state = player_mut(ctx.world, player)?;
    state
        .inventory
        .remove(item, quantity)
        .map_err(|_| RejectReason::MissingItems)?;
    state.gold = state.gold.saturating_add(gold);

    ctx.emit(Event::ItemSold {
        player,
        vendor,
        item: def.id.clone(),
        quantity,
        gold,
    });
    Ok(())
}

fn buy(
    ctx: &mut SystemContext<'_>,
    command: &Command,
    vendor: EntityId,
    item: &str,
    quantity: u32,
) -> CommandResult {
    let content = ctx.content;
    let player = ctx.acting_player(command)?;
    if quantity == 0 {
        return Err(RejectReason::InvalidQuantity.into());
    }
    let vendor_def = vendor_in_reach(ctx, player, vendor)?;
    let stock = content
        .vendor(&vendor_def)
        .ok_or(RejectReason::UnknownContent)?;
    if !stock.stock.iter().any(|s| s == item) {
        return Err(RejectReason::NotStocked.into());
    }
    let def = content.item(item).ok_or(RejectReason::UnknownContent)?;
    let cost = def
        .buy_price
        .checked_mul(quantity)
        .ok_or(RejectReason::InsufficientGold)?;

    if player_ref(ctx.world, player)?.gold < cost {
        return Err(RejectReason::InsufficientGold.into());
    }
    let room = projected_inventory(ctx, player)
        .map_or(0, |inventory| inventory.room_for(item, def.max_stack));
    if room < quantity {
        return Err(RejectReason::InventoryFull.into());
    }

    let state = player_mut(ctx.world, player)?;
    state.gold = state
        .gold
        .checked_sub(cost)
        .ok_or_else(|| CommandError::Fault("gold changed during purchase".into()))?;

    ctx.emit(Event::ItemPurchased {
        player,
        vendor,
        item: def.id.clone(),
        quantity,
        gold: cost,
    });
    Ok(())
}
