//! Damage resolution.
//!
//! Every `AttackLanded` and `HazardDamage` emitted so far this tick is
//! accumulated per target. Each hit is reduced by the target's defense
//! (never below zero) and raised 50% if the target is vulnerable. Health is
//! then set exactly once: `max(0, health - total)`.

use std::collections::BTreeMap;

use tracing::debug;

use crate::entity::{has_status, EntityId, StatusKind};
use crate::error::SystemFault;
use crate::event::Event;

use super::{System, SystemContext};

/// Accumulated damage for one target.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct PendingDamage {
    total: u32,
    killer: Option<EntityId>,
}

/// Damage taken from a single hit after defense and vulnerability.
#[must_use]
pub fn mitigate(raw: u32, defense: u32, vulnerable: bool) -> u32 {
    let after_defense = raw.saturating_sub(defense);
    if vulnerable {
        after_defense.saturating_add(after_defense / 2)
    } else {
        after_defense
    }
}

/// Applies accumulated hits.
#[derive(Debug, Default, Clone, Copy)]
pub struct DamageSystem;

impl System for DamageSystem {
    fn name(&self) -> &'static str {
        "damage"
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
        let mut pending: BTreeMap<EntityId, PendingDamage> = BTreeMap::new();
        for event in ctx.events.iter() {
            let (target, raw, attacker) = match event {
                Event::AttackLanded {
                    attacker,
                    target,
                    amount,
                } => (*target, *amount, Some(*attacker)),
                Event::HazardDamage { target, amount, .. } => (*target, *amount, None),
                _ => continue,
            };
            // Stale or already dead targets absorb nothing.
            let Some(entity) = ctx.world.store.get(target) else {
                continue;
            };
            if !entity.is_living_combatant() {
                continue;
            }
            let defense = entity.stats().map_or(0, |s| s.defense);
            let vulnerable = has_status(entity.statuses(), StatusKind::Vulnerable);
            let entry = pending.entry(target).or_default();
            entry.total = entry.total.saturating_add(mitigate(raw, defense, vulnerable));
            if attacker.is_some() {
                entry.killer = attacker;
            }
        }

        for (target, damage) in pending {
            let Some(entity) = ctx.world.store.get_mut(target) else {
                continue;
            };
            let position = entity.position();
            let Some(health) = entity.health_mut() else {
                continue;
            };
            health.apply_damage(damage.total);
            let remaining = health.current;
            let died = health.is_dead();
            if died {
                if let Some(player) = entity.as_player_mut() {
                    player.fishing = None;
                    player.destination = None;
                }
            }

            ctx.emit(Event::DamageDealt {
                target,
                amount: damage.total,
                remaining,
            });
            if died {
                debug!(tick = ctx.tick, entity = target, killer = ?damage.killer, "Entity died");
                ctx.emit(Event::EntityDied {
                    entity: target,
                    killer: damage.killer,
                    position,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defense_clamps_each_hit_at_zero() {
        assert_eq!(mitigate(5, 8, false), 0);
        assert_eq!(mitigate(10, 4, false), 6);
    }

    #[test]
    fn vulnerability_applies_after_defense() {
        assert_eq!(mitigate(10, 2, true), 12);
        assert_eq!(mitigate(3, 3, true), 0);
    }
}
