//! Mob AI state machines.
//!
//! Each mob carries a [`MobBrain`]: an explicit [`MobAiState`] plus its
//! home position. Transitions are a pure function of an [`Observation`]
//! built from the world each tick, so they can be tested without a world.
//!
//! ```text
//! Idle -> Aware -> Pursuing -> Attacking
//!   ^                 |  ^         |
//!   +-- timeout/leash-+  +---------+
//! any -> Fleeing (low health, player near) -> Idle
//! any -> Dead (terminal)
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::content::MobDef;
use crate::entity::{has_status, EntityId, EntityKind, StatusKind};
use crate::error::SystemFault;
use crate::event::Event;
use crate::math::{Facing, Fixed, Vec2Fixed};

use super::{System, SystemContext};

/// AI state with the data each state needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MobAiState {
    /// Wandering home, no player noticed.
    Idle,
    /// Noticed a player; waiting out the awareness delay.
    Aware {
        /// Noticed player.
        target: EntityId,
        /// Tick the player was noticed.
        since: u64,
    },
    /// Chasing a player.
    Pursuing {
        /// Chased player.
        target: EntityId,
        /// Last tick a player was inside the aggro radius.
        last_seen: u64,
    },
    /// In reach of a player; combat resolves the hits.
    Attacking {
        /// Attacked player.
        target: EntityId,
    },
    /// Running away from a player at low health.
    Fleeing {
        /// Threat.
        from: EntityId,
    },
    /// Terminal.
    Dead,
}

/// Data-free tag of an AI state, for events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MobPhase {
    /// See [`MobAiState::Idle`].
    Idle,
    /// See [`MobAiState::Aware`].
    Aware,
    /// See [`MobAiState::Pursuing`].
    Pursuing,
    /// See [`MobAiState::Attacking`].
    Attacking,
    /// See [`MobAiState::Fleeing`].
    Fleeing,
    /// See [`MobAiState::Dead`].
    Dead,
}

/// The nearest living player as seen by a mob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sighting {
    /// Player.
    pub player: EntityId,
    /// Inside the aggro radius.
    pub in_aggro: bool,
    /// Inside attack reach.
    pub in_attack_range: bool,
}

/// What a mob knows about the world this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Current tick.
    pub tick: u64,
    /// Nearest living player, if any.
    pub nearest: Option<Sighting>,
    /// Remaining health as a percentage.
    pub health_percent: u32,
    /// Farther from home than the leash allows.
    pub beyond_leash: bool,
    /// Health reached zero.
    pub dead: bool,
}

/// Timer and threshold values from the mob definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    /// Awareness delay.
    pub awareness_ticks: u32,
    /// Ticks without a sighting before a chase is abandoned.
    pub aggro_timeout_ticks: u32,
    /// Flee at or below this health percentage; zero never flees.
    pub flee_health_percent: u8,
}

impl From<&MobDef> for Tuning {
    fn from(def: &MobDef) -> Self {
        Self {
            awareness_ticks: def.awareness_ticks,
            aggro_timeout_ticks: def.aggro_timeout_ticks,
            flee_health_percent: def.flee_health_percent,
        }
    }
}

impl MobAiState {
    /// Tag of this state.
    #[must_use]
    pub const fn phase(&self) -> MobPhase {
        match self {
            Self::Idle => MobPhase::Idle,
            Self::Aware { .. } => MobPhase::Aware,
            Self::Pursuing { .. } => MobPhase::Pursuing,
            Self::Attacking { .. } => MobPhase::Attacking,
            Self::Fleeing { .. } => MobPhase::Fleeing,
            Self::Dead => MobPhase::Dead,
        }
    }

    /// Transition for one tick.
    #[must_use]
    pub fn next(self, obs: &Observation, tuning: &Tuning) -> Self {
        if obs.dead || self == Self::Dead {
            return Self::Dead;
        }
        let engaged = obs.nearest.filter(|s| s.in_aggro);
        let in_reach = obs.nearest.filter(|s| s.in_attack_range);

        let wounded = tuning.flee_health_percent > 0
            && obs.health_percent <= u32::from(tuning.flee_health_percent);
        if wounded {
            return match engaged {
                Some(s) => Self::Fleeing { from: s.player },
                None => Self::Idle,
            };
        }

        match self {
            Self::Idle | Self::Fleeing { .. } => match engaged {
                Some(s) if tuning.awareness_ticks == 0 => Self::Pursuing {
                    target: s.player,
                    last_seen: obs.tick,
                },
                Some(s) => Self::Aware {
                    target: s.player,
                    since: obs.tick,
                },
                None => Self::Idle,
            },
            Self::Aware { target, since } => match engaged {
                None => Self::Idle,
                Some(s) if obs.tick.saturating_sub(since) >= u64::from(tuning.awareness_ticks) => {
                    Self::Pursuing {
                        target: s.player,
                        last_seen: obs.tick,
                    }
                }
                Some(_) => Self::Aware { target, since },
            },
            Self::Pursuing { target, last_seen } => {
                if obs.beyond_leash {
                    return Self::Idle;
                }
                if let Some(s) = in_reach {
                    return Self::Attacking { target: s.player };
                }
                match engaged {
                    Some(s) => Self::Pursuing {
                        target: s.player,
                        last_seen: obs.tick,
                    },
                    None if obs.tick.saturating_sub(last_seen)
                        >= u64::from(tuning.aggro_timeout_ticks) =>
                    {
                        Self::Idle
                    }
                    None => Self::Pursuing { target, last_seen },
                }
            }
            Self::Attacking { target } => {
                if let Some(s) = in_reach {
                    return Self::Attacking { target: s.player };
                }
                if obs.beyond_leash {
                    return Self::Idle;
                }
                Self::Pursuing {
                    target: engaged.map_or(target, |s| s.player),
                    last_seen: obs.tick,
                }
            }
            Self::Dead => Self::Dead,
        }
    }
}

/// Per-mob AI memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MobBrain {
    /// Current state.
    pub state: MobAiState,
    /// Where the mob returns when idle.
    pub home: Vec2Fixed,
}

impl MobBrain {
    /// Idle brain anchored at `home`.
    #[must_use]
    pub const fn new(home: Vec2Fixed) -> Self {
        Self {
            state: MobAiState::Idle,
            home,
        }
    }
}

/// Drives every mob's state machine and movement.
#[derive(Debug, Default, Clone, Copy)]
pub struct MobAiSystem;

impl System for MobAiSystem {
    fn name(&self) -> &'static str {
        "mob_ai"
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
        let content = ctx.content;
        let tick = ctx.tick;
        let died: BTreeSet<EntityId> = ctx
            .events
            .iter()
            .filter_map(|e| match e {
                Event::EntityDied { entity, .. } => Some(*entity),
                _ => None,
            })
            .collect();

        let mut players: Vec<(EntityId, Vec2Fixed)> = Vec::new();
        ctx.world.store.for_each_of_kind(EntityKind::Player, |e| {
            if e.is_living_combatant() {
                players.push((e.id, e.position()));
            }
        });

        for id in ctx.world.store.ids_of_kind(EntityKind::Mob) {
            let Some(entity) = ctx.world.store.get(id) else {
                continue;
            };
            let Some(mob) = entity.as_mob() else {
                continue;
            };
            let Some(def) = content.mob(&mob.def) else {
                return Err(ctx.fault(format!("mob {id} has unknown definition '{}'", mob.def)));
            };
            let position = entity.position();

            let aggro = Fixed::from_num(def.aggro_radius);
            let nearest = nearest_player(&players, position).map(|(player, at)| Sighting {
                player,
                in_aggro: position.within(at, aggro),
                in_attack_range: position.within(at, mob.stats.range),
            });
            let beyond_leash = def.leash_radius > 0
                && !position.within(mob.brain.home, Fixed::from_num(def.leash_radius));
            let observation = Observation {
                tick,
                nearest,
                health_percent: mob.health.percent(),
                beyond_leash,
                dead: mob.health.is_dead() || died.contains(&id),
            };

            let previous = mob.brain.state;
            let next = previous.next(&observation, &Tuning::from(def));
            let mut speed = def.speed;
            if has_status(&mob.statuses, StatusKind::Slowed) {
                speed /= Fixed::from_num(2);
            }
            let home = mob.brain.home;
            let reach = mob.stats.range;
            let destination = match next {
                MobAiState::Idle => Some(position.step_toward(home, speed)),
                MobAiState::Pursuing { target, .. } => players
                    .iter()
                    .find(|(p, _)| *p == target)
                    .filter(|(_, at)| !position.within(*at, reach))
                    .map(|(_, at)| position.step_toward(*at, speed)),
                MobAiState::Fleeing { from } => players
                    .iter()
                    .find(|(p, _)| *p == from)
                    .map(|(_, at)| position.step_away(*at, speed)),
                _ => None,
            };

            let Some(entity) = ctx.world.store.get_mut(id) else {
                continue;
            };
            if let Some(to) = destination.filter(|to| *to != position) {
                entity.transform.facing = Facing::from_direction(to - position, entity.transform.facing);
                entity.transform.position = to;
            }
            if let Some(mob) = entity.as_mob_mut() {
                mob.brain.state = next;
            }

            if previous.phase() != next.phase() {
                ctx.emit(Event::MobStateChanged {
                    mob: id,
                    from: previous.phase(),
                    to: next.phase(),
                });
            }
        }
        Ok(())
    }
}

/// Closest player; ties go to the lowest id.
fn nearest_player(
    players: &[(EntityId, Vec2Fixed)],
    from: Vec2Fixed,
) -> Option<(EntityId, Vec2Fixed)> {
    let mut best: Option<(EntityId, Vec2Fixed, Fixed)> = None;
    for &(id, at) in players {
        let distance = from.distance_squared(at);
        if best.map_or(true, |(_, _, d)| distance < d) {
            best = Some((id, at, distance));
        }
    }
    best.map(|(id, at, _)| (id, at))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TUNING: Tuning = Tuning {
        awareness_ticks: 2,
        aggro_timeout_ticks: 5,
        flee_health_percent: 20,
    };

    fn obs(tick: u64, nearest: Option<Sighting>) -> Observation {
        Observation {
            tick,
            nearest,
            health_percent: 100,
            beyond_leash: false,
            dead: false,
        }
    }

    fn seen(in_aggro: bool, in_attack_range: bool) -> Option<Sighting> {
        Some(Sighting {
            player: 7,
            in_aggro,
            in_attack_range,
        })
    }

    #[test]
    fn idle_to_attacking() {
        let s = MobAiState::Idle.next(&obs(10, seen(true, false)), &TUNING);
        assert_eq!(s, MobAiState::Aware { target: 7, since: 10 });
        let s = s.next(&obs(11, seen(true, false)), &TUNING);
        assert_eq!(s.phase(), MobPhase::Aware);
        let s = s.next(&obs(12, seen(true, false)), &TUNING);
        assert_eq!(s, MobAiState::Pursuing { target: 7, last_seen: 12 });
        let s = s.next(&obs(13, seen(true, true)), &TUNING);
        assert_eq!(s, MobAiState::Attacking { target: 7 });
    }

    #[test]
    fn aware_drops_back_when_player_leaves() {
        let s = MobAiState::Aware { target: 7, since: 0 };
        assert_eq!(s.next(&obs(1, seen(false, false)), &TUNING), MobAiState::Idle);
    }

    #[test]
    fn pursuit_times_out() {
        let s = MobAiState::Pursuing { target: 7, last_seen: 10 };
        let s = s.next(&obs(14, None), &TUNING);
        assert_eq!(s.phase(), MobPhase::Pursuing);
        assert_eq!(s.next(&obs(15, None), &TUNING), MobAiState::Idle);
    }

    #[test]
    fn leash_ends_pursuit() {
        let mut o = obs(3, seen(true, false));
        o.beyond_leash = true;
        let s = MobAiState::Pursuing { target: 7, last_seen: 2 };
        assert_eq!(s.next(&o, &TUNING), MobAiState::Idle);
    }

    #[test]
    fn low_health_flees() {
        let mut o = obs(3, seen(true, true));
        o.health_percent = 15;
        let s = MobAiState::Attacking { target: 7 }.next(&o, &TUNING);
        assert_eq!(s, MobAiState::Fleeing { from: 7 });
        o.nearest = None;
        assert_eq!(s.next(&o, &TUNING), MobAiState::Idle);
    }

    #[test]
    fn dead_is_terminal() {
        let mut o = obs(3, seen(true, true));
        o.dead = true;
        let s = MobAiState::Attacking { target: 7 }.next(&o, &TUNING);
        assert_eq!(s, MobAiState::Dead);
        o.dead = false;
        assert_eq!(s.next(&o, &TUNING), MobAiState::Dead);
    }

    #[test]
    fn nearest_prefers_lowest_id_on_tie() {
        let players = vec![
            (3, Vec2Fixed::from_ints(1, 0)),
            (5, Vec2Fixed::from_ints(-1, 0)),
            (9, Vec2Fixed::from_ints(4, 0)),
        ];
        assert_eq!(
            nearest_player(&players, Vec2Fixed::ZERO).map(|(id, _)| id),
            Some(3)
        );
        assert!(nearest_player(&[], Vec2Fixed::ZERO).is_none());
    }
}
