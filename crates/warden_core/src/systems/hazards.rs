//! Environmental hazards and status effect expiry.
//!
//! Each hazard zone pulses every `period` ticks. A pulse hits every living
//! player or mob standing inside the zone with a `HazardDamage` event (the
//! damage system resolves it) and applies the hazard's status effect.

use serde::{Deserialize, Serialize};

use crate::content::{ContentRegistry, DefId};
use crate::entity::{apply_status, Entity, EntityId};
use crate::error::SystemFault;
use crate::event::Event;
use crate::math::TilePos;

use super::{System, SystemContext};

/// One rectangular hazard area with its pulse timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HazardZone {
    /// Hazard definition.
    pub hazard: DefId,
    /// Lowest corner, inclusive.
    pub min: TilePos,
    /// Highest corner, inclusive.
    pub max: TilePos,
    /// Tick of the next pulse.
    pub next_pulse: u64,
}

impl HazardZone {
    /// True when `tile` lies inside the zone.
    #[must_use]
    pub fn contains(&self, tile: TilePos) -> bool {
        (self.min.x..=self.max.x).contains(&tile.x) && (self.min.y..=self.max.y).contains(&tile.y)
    }
}

/// Every hazard zone in the world.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HazardField {
    /// Zones in layout order.
    pub zones: Vec<HazardZone>,
}

impl HazardField {
    /// Zones from the content layout; each first pulses after one period.
    #[must_use]
    pub fn from_layout(content: &ContentRegistry) -> Self {
        let zones = content
            .world()
            .hazard_zones
            .iter()
            .filter_map(|zone| {
                let def = content.hazard(&zone.hazard)?;
                Some(HazardZone {
                    hazard: def.id.clone(),
                    min: zone.min,
                    max: zone.max,
                    next_pulse: u64::from(def.period),
                })
            })
            .collect();
        Self { zones }
    }
}

/// Hazard pulses and status expiry.
#[derive(Debug, Default, Clone, Copy)]
pub struct HazardSystem;

impl System for HazardSystem {
    fn name(&self) -> &'static str {
        "hazards"
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
        expire_statuses(ctx);

        let tick = ctx.tick;
        let content = ctx.content;
        for index in 0..ctx.world.hazards.zones.len() {
            let zone = ctx.world.hazards.zones[index].clone();
            if tick < zone.next_pulse {
                continue;
            }
            let def = content
                .hazard(&zone.hazard)
                .ok_or_else(|| ctx.fault(format!("unknown hazard '{}'", zone.hazard)))?;
            ctx.world.hazards.zones[index].next_pulse = tick + u64::from(def.period.max(1));
            ctx.emit(Event::HazardPulse {
                zone: index,
                hazard: zone.hazard.clone(),
            });

            let victims: Vec<EntityId> = ctx
                .world
                .store
                .iter()
                .filter(|e| e.is_living_combatant() && zone.contains(e.position().to_tile()))
                .map(|e| e.id)
                .collect();

            for victim in victims {
                if def.damage > 0 {
                    ctx.emit(Event::HazardDamage {
                        target: victim,
                        hazard: zone.hazard.clone(),
                        amount: def.damage,
                    });
                }
                let Some(grant) = def.status else {
                    continue;
                };
                let expires_at = tick + u64::from(grant.duration);
                if let Some(statuses) = ctx
                    .world
                    .store
                    .get_mut(victim)
                    .and_then(Entity::statuses_mut)
                {
                    apply_status(statuses, grant.kind, expires_at);
                    ctx.emit(Event::StatusApplied {
                        entity: victim,
                        kind: grant.kind,
                        expires_at,
                    });
                }
            }
        }
        Ok(())
    }
}

fn expire_statuses(ctx: &mut SystemContext<'_>) {
    let tick = ctx.tick;
    let mut expired = Vec::new();
    for id in ctx.world.store.ids() {
        let Some(statuses) = ctx.world.store.get_mut(id).and_then(Entity::statuses_mut) else {
            continue;
        };
        statuses.retain(|s| {
            let keep = s.expires_at > tick;
            if !keep {
                expired.push((id, s.kind));
            }
            keep
        });
    }
    for (entity, kind) in expired {
        ctx.emit(Event::StatusExpired { entity, kind });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_bounds_are_inclusive() {
        let zone = HazardZone {
            hazard: "lava".into(),
            min: TilePos::new(0, 0),
            max: TilePos::new(2, 1),
            next_pulse: 0,
        };
        assert!(zone.contains(TilePos::new(0, 0)));
        assert!(zone.contains(TilePos::new(2, 1)));
        assert!(!zone.contains(TilePos::new(3, 1)));
        assert!(!zone.contains(TilePos::new(1, -1)));
    }
}
