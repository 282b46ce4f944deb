//! Attack resolution.
//!
//! Players attack through `Attack` commands (only the last target intent
//! per connection per tick survives the batch) and spend stamina on each
//! swing. Mobs attack when their AI
//! is in the attacking phase. A landed attack only emits `AttackLanded`;
//! the damage system turns hits into health changes.

use crate::command::{Action, Command, Domain, RejectReason};
use crate::entity::{has_status, Entity, EntityId, EntityKind, StatusEffect, StatusKind};
use crate::error::SystemFault;
use crate::event::Event;
use crate::math::Fixed;

use super::mob_ai::MobAiState;
use super::{misrouted, player_mut, player_ref, CommandResult, System, SystemContext};

/// Scale raw attack by the attacker's buffs.
///
/// Empowered adds 50%, weakened removes 50%; both may apply.
#[must_use]
pub fn buffed_attack(base: u32, statuses: &[StatusEffect]) -> u32 {
    let mut amount = u64::from(base);
    if has_status(statuses, StatusKind::Empowered) {
        amount = amount * 3 / 2;
    }
    if has_status(statuses, StatusKind::Weakened) {
        amount /= 2;
    }
    u32::try_from(amount).unwrap_or(u32::MAX)
}

/// Player and mob attacks.
#[derive(Debug, Default, Clone, Copy)]
pub struct CombatSystem;

impl System for CombatSystem {
    fn name(&self) -> &'static str {
        "combat"
    }

    fn domain(&self) -> Option<Domain> {
        Some(Domain::Combat)
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
        ctx.process_commands(|ctx, command| match &command.action {
            Action::Attack { target } => player_attack(ctx, command, *target),
            _ => Err(misrouted(command)),
        })?;
        mob_attacks(ctx);
        Ok(())
    }
}

fn player_attack(
    ctx: &mut SystemContext<'_>,
    command: &Command,
    target: EntityId,
) -> CommandResult {
    let content = ctx.content;
    let attacker = ctx.acting_player(command)?;
    if attacker == target {
        return Err(RejectReason::WrongTargetKind.into());
    }

    let victim = ctx
        .world
        .store
        .get(target)
        .ok_or(RejectReason::StaleTarget)?;
    if !matches!(victim.kind(), EntityKind::Mob | EntityKind::Player) {
        return Err(RejectReason::WrongTargetKind.into());
    }
    if !victim.is_living_combatant() {
        return Err(RejectReason::StaleTarget.into());
    }

    let state = player_ref(ctx.world, attacker)?;
    ctx.require_range(attacker, target, state.stats.range)?;
    if ctx.tick < state.cooldowns.next_attack_tick {
        return Err(RejectReason::OnCooldown.into());
    }
    let cost = ctx.config.swing_stamina_cost;
    if state.stamina < cost {
        return Err(RejectReason::Exhausted.into());
    }
    let base = state
        .stats
        .attack
        .saturating_add(state.inventory.weapon_bonus(content));
    let amount = buffed_attack(base, &state.statuses);
    let cooldown = u64::from(state.stats.cooldown_ticks);

    let tick = ctx.tick;
    let state = player_mut(ctx.world, attacker)?;
    state.cooldowns.next_attack_tick = tick + cooldown;
    state.stamina -= cost;
    ctx.emit(Event::AttackLanded {
        attacker,
        target,
        amount,
    });
    Ok(())
}

/// Mobs in the attacking phase hit their target when in reach and off cooldown.
fn mob_attacks(ctx: &mut SystemContext<'_>) {
    let tick = ctx.tick;
    for id in ctx.world.store.ids_of_kind(EntityKind::Mob) {
        let Some(entity) = ctx.world.store.get(id) else {
            continue;
        };
        let Some(mob) = entity.as_mob() else {
            continue;
        };
        if mob.health.is_dead() || tick < mob.next_attack_tick {
            continue;
        }
        let MobAiState::Attacking { target } = mob.brain.state else {
            continue;
        };
        let position = entity.position();
        let reach: Fixed = mob.stats.range;
        let amount = buffed_attack(mob.stats.attack, &mob.statuses);
        let cooldown = u64::from(mob.stats.cooldown_ticks.max(1));

        let hit = ctx
            .world
            .store
            .get(target)
            .is_some_and(|t| t.is_living_combatant() && t.position().within(position, reach));
        if !hit {
            continue;
        }
        if let Some(mob) = ctx.world.store.get_mut(id).and_then(Entity::as_mob_mut) {
            mob.next_attack_tick = tick + cooldown;
        }
        ctx.emit(Event::AttackLanded {
            attacker: id,
            target,
            amount,
        });
    }
}
