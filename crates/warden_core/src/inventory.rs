//! Player inventories.
//!
//! An inventory is an ordered list of item stacks with a fixed slot capacity.
//! Stacks never hold zero items and never exceed their item's max stack.
//! Items carrying durability occupy a slot each.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::{ContentRegistry, ItemId, ItemKind};

/// A quantity of one item type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    /// Item definition id.
    pub item: ItemId,
    /// Number of items; always greater than zero.
    pub quantity: u32,
    /// Remaining uses for tools.
    pub durability: Option<u32>,
}

impl ItemStack {
    /// A plain stack without instance data.
    #[must_use]
    pub fn new(item: impl Into<ItemId>, quantity: u32) -> Self {
        Self {
            item: item.into(),
            quantity,
            durability: None,
        }
    }

    /// A single item carrying durability.
    #[must_use]
    pub fn with_durability(item: impl Into<ItemId>, durability: u32) -> Self {
        Self {
            item: item.into(),
            quantity: 1,
            durability: Some(durability),
        }
    }
}

/// Inventory operation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// Not enough of an item to remove.
    #[error("need {needed} of '{item}', have {available}")]
    InsufficientItems {
        /// Item requested.
        item: ItemId,
        /// Quantity requested.
        needed: u32,
        /// Quantity held.
        available: u32,
    },
    /// Slot index does not hold a stack.
    #[error("slot {0} is empty")]
    EmptySlot(usize),
    /// Inventory invariant violated.
    #[error("invalid inventory: {0}")]
    Invalid(String),
}

/// Ordered stack list with a slot capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    slots: Vec<ItemStack>,
    capacity: usize,
}

impl Inventory {
    /// Empty inventory with `capacity` slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            capacity,
        }
    }

    /// Stacks in slot order.
    #[must_use]
    pub fn slots(&self) -> &[ItemStack] {
        &self.slots
    }

    /// Slot capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// True when no slots are used.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total quantity of `item` across stacks.
    #[must_use]
    pub fn count(&self, item: &str) -> u32 {
        self.slots
            .iter()
            .filter(|s| s.item == item)
            .fold(0u32, |acc, s| acc.saturating_add(s.quantity))
    }

    /// Quantity of `item` that fits without overflow.
    #[must_use]
    pub fn room_for(&self, item: &str, max_stack: u32) -> u32 {
        let max_stack = max_stack.max(1);
        let top_up: u32 = self
            .slots
            .iter()
            .filter(|s| s.item == item && s.durability.is_none())
            .map(|s| max_stack.saturating_sub(s.quantity))
            .fold(0u32, u32::saturating_add);
        let free = (self.capacity.saturating_sub(self.slots.len())) as u32;
        top_up.saturating_add(free.saturating_mul(max_stack))
    }

    /// Add plain items, topping up existing stacks first.
    ///
    /// Returns the quantity that did not fit.
    pub fn add(&mut self, item: &str, quantity: u32, max_stack: u32) -> u32 {
        let max_stack = max_stack.max(1);
        let mut remaining = quantity;
        for stack in self
            .slots
            .iter_mut()
            .filter(|s| s.item == item && s.durability.is_none())
        {
            if remaining == 0 {
                break;
            }
            let moved = remaining.min(max_stack.saturating_sub(stack.quantity));
            stack.quantity += moved;
            remaining -= moved;
        }
        while remaining > 0 && self.slots.len() < self.capacity {
            let moved = remaining.min(max_stack);
            self.slots.push(ItemStack::new(item, moved));
            remaining -= moved;
        }
        remaining
    }

    /// Add a whole stack, keeping instance data.
    ///
    /// Returns whatever did not fit, if anything.
    pub fn add_stack(&mut self, stack: ItemStack, max_stack: u32) -> Option<ItemStack> {
        if stack.durability.is_some() {
            if self.slots.len() < self.capacity {
                self.slots.push(stack);
                return None;
            }
            return Some(stack);
        }
        let leftover = self.add(&stack.item, stack.quantity, max_stack);
        (leftover > 0).then(|| ItemStack::new(stack.item, leftover))
    }

    /// Remove `quantity` of `item`, all or nothing.
    ///
    /// Later stacks are drained first so the oldest stack keeps its slot.
    pub fn remove(&mut self, item: &str, quantity: u32) -> Result<(), InventoryError> {
        let available = self.count(item);
        if available < quantity {
            return Err(InventoryError::InsufficientItems {
                item: item.to_string(),
                needed: quantity,
                available,
            });
        }
        let mut remaining = quantity;
        for stack in self.slots.iter_mut().rev().filter(|s| s.item == item) {
            if remaining == 0 {
                break;
            }
            let taken = remaining.min(stack.quantity);
            stack.quantity -= taken;
            remaining -= taken;
        }
        self.slots.retain(|s| s.quantity > 0);
        Ok(())
    }

    /// Remove and return the whole stack in `slot`.
    pub fn take_slot(&mut self, slot: usize) -> Result<ItemStack, InventoryError> {
        if slot >= self.slots.len() {
            return Err(InventoryError::EmptySlot(slot));
        }
        Ok(self.slots.remove(slot))
    }

    /// Remove one item from `slot`, returning the item id.
    pub fn consume_one(&mut self, slot: usize) -> Result<ItemId, InventoryError> {
        let stack = self
            .slots
            .get_mut(slot)
            .ok_or(InventoryError::EmptySlot(slot))?;
        let item = stack.item.clone();
        stack.quantity -= 1;
        if stack.quantity == 0 {
            self.slots.remove(slot);
        }
        Ok(item)
    }

    /// Highest tool tier carried, with the slot holding it.
    ///
    /// Ties go to the earliest slot.
    #[must_use]
    pub fn best_tool(&self, content: &ContentRegistry) -> Option<(usize, u8)> {
        let mut best: Option<(usize, u8)> = None;
        for (slot, stack) in self.slots.iter().enumerate() {
            if let Some(ItemKind::Tool { tier }) = content.item(&stack.item).map(|d| &d.kind) {
                if best.map_or(true, |(_, t)| *tier > t) {
                    best = Some((slot, *tier));
                }
            }
        }
        best
    }

    /// Highest weapon attack bonus carried.
    #[must_use]
    pub fn weapon_bonus(&self, content: &ContentRegistry) -> u32 {
        self.slots
            .iter()
            .filter_map(|s| match content.item(&s.item).map(|d| &d.kind) {
                Some(ItemKind::Weapon { attack }) => Some(*attack),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Wear the tool in `slot` by one use. Returns true if it broke.
    pub fn wear_tool(&mut self, slot: usize) -> bool {
        let Some(stack) = self.slots.get_mut(slot) else {
            return false;
        };
        let Some(durability) = stack.durability.as_mut() else {
            return false;
        };
        *durability = durability.saturating_sub(1);
        if *durability == 0 {
            self.slots.remove(slot);
            return true;
        }
        false
    }

    /// Check stack invariants against the content tables.
    pub fn validate(&self, content: &ContentRegistry) -> Result<(), InventoryError> {
        if self.slots.len() > self.capacity {
            return Err(InventoryError::Invalid(format!(
                "{} stacks exceed capacity {}",
                self.slots.len(),
                self.capacity
            )));
        }
        for stack in &self.slots {
            let Some(def) = content.item(&stack.item) else {
                return Err(InventoryError::Invalid(format!(
                    "unknown item '{}'",
                    stack.item
                )));
            };
            if stack.quantity == 0 || stack.quantity > def.max_stack {
                return Err(InventoryError::Invalid(format!(
                    "stack of '{}' has quantity {}",
                    stack.item, stack.quantity
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_tops_up_then_opens_slots() {
        let mut inv = Inventory::new(3);
        assert_eq!(inv.add("ore", 7, 5), 0);
        assert_eq!(inv.slots().len(), 2);
        assert_eq!(inv.add("ore", 3, 5), 0);
        assert_eq!(inv.slots()[1].quantity, 5);
        assert_eq!(inv.count("ore"), 10);
    }

    #[test]
    fn add_reports_overflow() {
        let mut inv = Inventory::new(1);
        assert_eq!(inv.room_for("ore", 5), 5);
        assert_eq!(inv.add("ore", 8, 5), 3);
        assert_eq!(inv.add("fish", 1, 5), 1);
        assert_eq!(inv.count("ore"), 5);
    }

    #[test]
    fn remove_is_all_or_nothing() {
        let mut inv = Inventory::new(4);
        inv.add("seed", 3, 10);
        let err = inv.remove("seed", 4).unwrap_err();
        assert_eq!(
            err,
            InventoryError::InsufficientItems {
                item: "seed".into(),
                needed: 4,
                available: 3
            }
        );
        assert_eq!(inv.count("seed"), 3);
        inv.remove("seed", 3).unwrap();
        assert!(inv.is_empty());
    }

    #[test]
    fn durable_items_do_not_stack() {
        let mut inv = Inventory::new(2);
        assert!(inv
            .add_stack(ItemStack::with_durability("pickaxe", 2), 1)
            .is_none());
        assert!(inv
            .add_stack(ItemStack::with_durability("pickaxe", 2), 1)
            .is_none());
        assert_eq!(inv.slots().len(), 2);
        assert!(!inv.wear_tool(0));
        assert!(inv.wear_tool(0));
        assert_eq!(inv.slots().len(), 1);
    }

    #[test]
    fn consume_one_clears_empty_slot() {
        let mut inv = Inventory::new(2);
        inv.add("bread", 1, 10);
        assert_eq!(inv.consume_one(0).unwrap(), "bread");
        assert!(inv.is_empty());
        assert_eq!(inv.consume_one(0), Err(InventoryError::EmptySlot(0)));
    }
}
