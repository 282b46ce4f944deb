//! Item credits, loot and ground items.
//!
//! Systems that produce items (mining, farming, fishing, cooking, vendor
//! purchases) only emit events; this system credits the recipient once per
//! event, after every producer has run. Whatever does not fit lands on the
//! ground at the player's feet. Dead mobs roll their loot table here too.

use crate::command::{Action, Command, Domain, RejectReason};
use crate::content::{ContentRegistry, ItemId, ItemKind};
use crate::entity::{DroppedItemState, EntityId, EntityKind, Payload, Transform};
use crate::error::SystemFault;
use crate::event::Event;
use crate::inventory::{Inventory, ItemStack};
use crate::math::Vec2Fixed;
use crate::world::WorldState;

use super::{misrouted, player_mut, player_ref, CommandError, CommandResult, System, SystemContext};

/// Inventory bookkeeping and item commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct InventorySystem;

impl System for InventorySystem {
    fn name(&self) -> &'static str {
        "inventory"
    }

    fn domain(&self) -> Option<Domain> {
        Some(Domain::Inventory)
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
        let mut credits: Vec<(EntityId, ItemId, u32)> = Vec::new();
        let mut deaths: Vec<(EntityId, Vec2Fixed)> = Vec::new();
        for event in ctx.events.iter() {
            if let Some((player, item, quantity)) = pending_credit(event) {
                credits.push((player, item.clone(), quantity));
            } else if let Event::EntityDied {
                entity, position, ..
            } = event
            {
                deaths.push((*entity, *position));
            }
        }

        for (player, item, quantity) in credits {
            credit(ctx, player, &item, quantity)?;
        }
        for (entity, position) in deaths {
            drop_loot(ctx, entity, position)?;
        }

        ctx.process_commands(|ctx, command| match &command.action {
            Action::PickUp { item } => pick_up(ctx, command, *item),
            Action::Drop { slot } => drop_slot(ctx, command, *slot),
            Action::Use { slot } => use_slot(ctx, command, *slot),
            _ => Err(misrouted(command)),
        })
    }
}

/// Item credit an event asks this system to deliver: `(player, item, quantity)`.
pub(crate) fn pending_credit(event: &Event) -> Option<(EntityId, &ItemId, u32)> {
    match event {
        Event::OreMined {
            player,
            item,
            quantity,
            ..
        }
        | Event::CropHarvested {
            player,
            item,
            quantity,
            ..
        }
        | Event::FishCaught {
            player,
            item,
            quantity,
        }
        | Event::ItemCooked {
            player,
            item,
            quantity,
            ..
        }
        | Event::ItemPurchased {
            player,
            item,
            quantity,
            ..
        } => Some((*player, item, *quantity)),
        _ => None,
    }
}

/// `player`'s inventory as it will be once the credits emitted so far this
/// tick are delivered.
pub(crate) fn projected_inventory(ctx: &SystemContext<'_>, player: EntityId) -> Option<Inventory> {
    let mut inventory = ctx.world.store.get(player)?.as_player()?.inventory.clone();
    for (_, item, quantity) in ctx
        .events
        .iter()
        .filter_map(pending_credit)
        .filter(|(recipient, ..)| *recipient == player)
    {
        let max_stack = ctx.content.max_stack(item);
        for stack in stacks_of(ctx.content, item, quantity) {
            // Overflow goes to the ground, not the inventory.
            let _ = inventory.add_stack(stack, max_stack);
        }
    }
    Some(inventory)
}

/// Place a stack on the ground.
fn spawn_drop(world: &mut WorldState, position: Vec2Fixed, stack: ItemStack, despawn_tick: u64) -> EntityId {
    world.store.spawn(
        Transform::at(position),
        Payload::DroppedItem(DroppedItemState {
            stack,
            despawn_tick,
        }),
    )
}

/// Units of `item` as stacks ready for insertion, none above the max stack.
fn stacks_of(content: &ContentRegistry, item: &str, quantity: u32) -> Vec<ItemStack> {
    match content.item(item).and_then(|d| d.durability) {
        Some(durability) => (0..quantity)
            .map(|_| ItemStack::with_durability(item, durability))
            .collect(),
        None => {
            let max_stack = content.max_stack(item).max(1);
            let mut stacks = Vec::new();
            let mut left = quantity;
            while left > 0 {
                let size = left.min(max_stack);
                stacks.push(ItemStack::new(item, size));
                left -= size;
            }
            stacks
        }
    }
}

fn credit(
    ctx: &mut SystemContext<'_>,
    player: EntityId,
    item: &str,
    quantity: u32,
) -> Result<(), SystemFault> {
    let content = ctx.content;
    let tick = ctx.tick;
    let lifetime = ctx.config.dropped_item_lifetime;
    let Some(def) = content.item(item) else {
        return Err(ctx.fault(format!("credit of unknown item '{item}'")));
    };
    let Some(entity) = ctx.world.store.get_mut(player) else {
        return Err(ctx.fault(format!("credit to missing player {player}")));
    };
    let position = entity.position();
    let Some(state) = entity.as_player_mut() else {
        return Err(ctx.fault(format!("credit to non-player {player}")));
    };

    let mut overflow = Vec::new();
    for stack in stacks_of(content, item, quantity) {
        if let Some(rest) = state.inventory.add_stack(stack, def.max_stack) {
            overflow.push(rest);
        }
    }

    let dropped: u32 = overflow.iter().map(|s| s.quantity).sum();
    if quantity > dropped {
        ctx.emit(Event::ItemGranted {
            player,
            item: def.id.clone(),
            quantity: quantity - dropped,
        });
    }
    for stack in overflow {
        let id = spawn_drop(ctx.world, position, stack.clone(), tick + lifetime);
        ctx.emit(Event::ItemDropped {
            player,
            dropped: id,
            stack,
        });
    }
    Ok(())
}

fn drop_loot(
    ctx: &mut SystemContext<'_>,
    entity: EntityId,
    position: Vec2Fixed,
) -> Result<(), SystemFault> {
    let content = ctx.content;
    let despawn = ctx.tick + ctx.config.dropped_item_lifetime;
    let Some(def_id) = ctx
        .world
        .store
        .get(entity)
        .and_then(|e| e.as_mob())
        .map(|m| m.def.clone())
    else {
        return Ok(());
    };
    let Some(def) = content.mob(&def_id) else {
        return Err(ctx.fault(format!("mob {entity} has unknown definition '{def_id}'")));
    };

    for entry in &def.loot {
        if !ctx.world.rng.roll_percent(entry.chance_percent) {
            continue;
        }
        let quantity = ctx.world.rng.range_inclusive(entry.min, entry.max);
        for stack in stacks_of(content, &entry.item, quantity) {
            let dropped = spawn_drop(ctx.world, position, stack.clone(), despawn);
            ctx.emit(Event::LootDropped {
                source: entity,
                dropped,
                stack,
            });
        }
    }
    Ok(())
}

fn pick_up(ctx: &mut SystemContext<'_>, command: &Command, item: EntityId) -> CommandResult {
    let content = ctx.content;
    let player = ctx.acting_player(command)?;
    let Payload::DroppedItem(ground) = &ctx.target(item, EntityKind::DroppedItem)?.payload else {
        return Err(RejectReason::WrongTargetKind.into());
    };
    let stack = ground.stack.clone();
    ctx.require_range(player, item, ctx.config.interaction_range)?;
    let max_stack = content.max_stack(&stack.item);

    let inventory = &player_ref(ctx.world, player)?.inventory;
    let room = if stack.durability.is_some() {
        u32::from(inventory.slots().len() < inventory.capacity())
    } else {
        inventory.room_for(&stack.item, max_stack)
    };
    if room == 0 {
        return Err(RejectReason::InventoryFull.into());
    }
    let taken = room.min(stack.quantity);

    let inventory = &mut player_mut(ctx.world, player)?.inventory;
    if stack.durability.is_some() {
        if inventory.add_stack(stack.clone(), max_stack).is_some() {
            return Err(CommandError::Fault("tool did not fit after room check".into()));
        }
    } else if inventory.add(&stack.item, taken, max_stack) > 0 {
        return Err(CommandError::Fault("pickup overflowed after room check".into()));
    }

    if taken == stack.quantity {
        ctx.world.store.remove(item);
        ctx.emit(Event::EntityRemoved {
            entity: item,
            kind: EntityKind::DroppedItem,
        });
    } else if let Some(Payload::DroppedItem(ground)) =
        ctx.world.store.get_mut(item).map(|e| &mut e.payload)
    {
        ground.stack.quantity -= taken;
    }
    ctx.emit(Event::ItemPickedUp {
        player,
        dropped: item,
        quantity: taken,
    });
    Ok(())
}

fn drop_slot(ctx: &mut SystemContext<'_>, command: &Command, slot: usize) -> CommandResult {
    let player = ctx.acting_player(command)?;
    let despawn = ctx.tick + ctx.config.dropped_item_lifetime;
    let position = ctx
        .world
        .store
        .get(player)
        .map(|e| e.position())
        .ok_or(RejectReason::StaleTarget)?;
    let stack = player_mut(ctx.world, player)?
        .inventory
        .take_slot(slot)
        .map_err(|_| RejectReason::MissingItems)?;
    let dropped = spawn_drop(ctx.world, position, stack.clone(), despawn);
    ctx.emit(Event::ItemDropped {
        player,
        dropped,
        stack,
    });
    Ok(())
}

fn use_slot(ctx: &mut SystemContext<'_>, command: &Command, slot: usize) -> CommandResult {
    let content = ctx.content;
    let player = ctx.acting_player(command)?;
    let stack = player_ref(ctx.world, player)?
        .inventory
        .slots()
        .get(slot)
        .ok_or(RejectReason::MissingItems)?;
    let def = content.item(&stack.item).ok_or(RejectReason::UnknownContent)?;
    let ItemKind::Food { heal } = def.kind else {
        return Err(RejectReason::NotUsable.into());
    };

    let state = player_mut(ctx.world, player)?;
    let item = state
        .inventory
        .consume_one(slot)
        .map_err(|e| CommandError::Fault(e.to_string()))?;
    let healed = state.health.heal(heal);
    ctx.emit(Event::ItemUsed {
        player,
        item,
        healed,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentFile, ItemDef};

    fn content() -> ContentRegistry {
        let item = |id: &str, durability: Option<u32>| ItemDef {
            id: id.into(),
            name: id.into(),
            kind: ItemKind::Material,
            max_stack: 10,
            sell_price: 0,
            buy_price: 0,
            durability,
        };
        ContentRegistry::from_file(ContentFile {
            items: vec![item("ore", None), item("pick", Some(30))],
            ..ContentFile::default()
        })
        .expect("valid content")
    }

    #[test]
    fn durable_items_split_into_single_stacks() {
        let content = content();
        let stacks = stacks_of(&content, "pick", 3);
        assert_eq!(stacks.len(), 3);
        assert!(stacks.iter().all(|s| s.quantity == 1 && s.durability == Some(30)));
    }

    #[test]
    fn plain_items_split_at_max_stack() {
        let content = content();
        assert_eq!(stacks_of(&content, "ore", 7), vec![ItemStack::new("ore", 7)]);
        assert_eq!(
            stacks_of(&content, "ore", 25),
            vec![
                ItemStack::new("ore", 10),
                ItemStack::new("ore", 10),
                ItemStack::new("ore", 5)
            ]
        );
        assert!(stacks_of(&content, "ore", 0).is_empty());
    }
}
