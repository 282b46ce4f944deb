//! Scheduled mob waves.
//!
//! A wave waits for its trigger tick, spawns its budget a few mobs per tick
//! (cycling spawn points), then stays active until every mob it spawned is
//! gone or dead. Cleared is terminal.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::content::DefId;
use crate::entity::{Entity, EntityId};
use crate::error::SystemFault;
use crate::event::Event;

use super::{System, SystemContext};

/// Lifecycle phase of a wave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaveState {
    /// Before the trigger tick.
    #[default]
    Waiting,
    /// Spawning its budget.
    Spawning,
    /// Everything spawned; mobs still alive.
    Active,
    /// All spawned mobs are dead.
    Cleared,
}

impl WaveState {
    /// Phase after this tick.
    ///
    /// `remaining` is the unspawned budget and `alive` the number of
    /// tracked mobs still alive, both measured before this tick's spawns.
    #[must_use]
    pub fn next(self, tick: u64, trigger_tick: u64, remaining: u32, alive: usize) -> Self {
        match self {
            Self::Waiting if tick >= trigger_tick => Self::Spawning,
            Self::Spawning if remaining == 0 => Self::Active,
            Self::Active if alive == 0 => Self::Cleared,
            other => other,
        }
    }
}

/// Runtime record of one wave.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaveTracker {
    /// Wave definition.
    pub wave: DefId,
    /// Current phase.
    pub state: WaveState,
    /// Mobs spawned so far.
    pub spawned: u32,
    /// Index of the next spawn point to use.
    pub next_spawn_point: usize,
    /// Mobs this wave spawned.
    pub mobs: Vec<EntityId>,
}

impl WaveTracker {
    /// Tracker waiting for its trigger.
    #[must_use]
    pub fn new(wave: DefId) -> Self {
        Self {
            wave,
            state: WaveState::Waiting,
            spawned: 0,
            next_spawn_point: 0,
            mobs: Vec::new(),
        }
    }
}

/// Advances every wave.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaveSystem;

impl System for WaveSystem {
    fn name(&self) -> &'static str {
        "waves"
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
        let tick = ctx.tick;
        let content = ctx.content;

        for index in 0..ctx.world.waves.len() {
            let tracker = ctx.world.waves[index].clone();
            if tracker.state == WaveState::Cleared {
                continue;
            }
            let def = content
                .wave(&tracker.wave)
                .ok_or_else(|| ctx.fault(format!("unknown wave '{}'", tracker.wave)))?;

            let remaining = def.budget.saturating_sub(tracker.spawned);
            let alive = tracker
                .mobs
                .iter()
                .filter(|id| {
                    ctx.world
                        .store
                        .get(**id)
                        .is_some_and(Entity::is_living_combatant)
                })
                .count();
            let mut state = tracker.state.next(tick, def.trigger_tick, remaining, alive);

            if tracker.state == WaveState::Waiting && state == WaveState::Spawning {
                info!(tick, wave = %def.id, budget = def.budget, "Wave started");
                ctx.emit(Event::WaveStarted {
                    wave: def.id.clone(),
                });
            }

            if state == WaveState::Spawning {
                let batch = def.spawn_per_tick.max(1).min(remaining);
                for _ in 0..batch {
                    if def.spawn_points.is_empty() {
                        return Err(ctx.fault(format!("wave '{}' has no spawn points", def.id)));
                    }
                    let tracker = &mut ctx.world.waves[index];
                    let point = def.spawn_points[tracker.next_spawn_point % def.spawn_points.len()];
                    tracker.next_spawn_point = (tracker.next_spawn_point + 1) % def.spawn_points.len();

                    let Some(mob) =
                        ctx.world
                            .spawn_mob(content, &def.mob, point.to_world(), Some(def.id.clone()))
                    else {
                        return Err(ctx.fault(format!("wave '{}' spawns unknown mob '{}'", def.id, def.mob)));
                    };
                    let tracker = &mut ctx.world.waves[index];
                    tracker.spawned += 1;
                    tracker.mobs.push(mob);
                    ctx.emit(Event::MobSpawned {
                        mob,
                        def: def.mob.clone(),
                        wave: def.id.clone(),
                    });
                }
                let spawned = ctx.world.waves[index].spawned;
                if spawned >= def.budget {
                    state = WaveState::Active;
                    ctx.emit(Event::WaveActive {
                        wave: def.id.clone(),
                        spawned,
                    });
                }
            } else if tracker.state == WaveState::Active && state == WaveState::Cleared {
                info!(tick, wave = %def.id, "Wave cleared");
                ctx.emit(Event::WaveCleared {
                    wave: def.id.clone(),
                });
            }

            let tracker = &mut ctx.world.waves[index];
            tracker.state = state;
            if state == WaveState::Cleared {
                tracker.mobs.clear();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_for_trigger() {
        assert_eq!(WaveState::Waiting.next(9, 10, 5, 0), WaveState::Waiting);
        assert_eq!(WaveState::Waiting.next(10, 10, 5, 0), WaveState::Spawning);
    }

    #[test]
    fn active_until_every_mob_dies() {
        assert_eq!(WaveState::Spawning.next(20, 10, 0, 3), WaveState::Active);
        assert_eq!(WaveState::Active.next(21, 10, 0, 1), WaveState::Active);
        assert_eq!(WaveState::Active.next(22, 10, 0, 0), WaveState::Cleared);
    }

    #[test]
    fn cleared_is_terminal() {
        assert_eq!(WaveState::Cleared.next(99, 10, 0, 0), WaveState::Cleared);
    }
}
