//! Simulation tuning knobs.
//!
//! Loaded from RON by the server; every field has a default so a config
//! file only needs the values it overrides. Fixed-point fields are written
//! as raw bits in RON (`4294967296` is `1.0`).

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::math::{fixed_serde, Fixed};

/// Ticks per second for the simulation.
pub const TICK_RATE: u32 = 20;

/// Simulation configuration shared by every system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Ticks per second the scheduler targets.
    pub tick_rate: u32,
    /// Seed for the world RNG when building a default world.
    pub seed: u64,
    /// Maximum number of stacks a player inventory holds.
    pub inventory_slots: usize,
    /// Consecutive faults before a system is disabled.
    pub fault_threshold: u32,
    /// Reach for mining, planting, harvesting, stations, vendors and pickups.
    #[serde(with = "fixed_serde")]
    pub interaction_range: Fixed,
    /// Maximum player movement per tick.
    #[serde(with = "fixed_serde")]
    pub player_speed: Fixed,
    /// Player health on spawn and respawn.
    pub player_max_health: u32,
    /// Player stamina on spawn and respawn.
    pub player_max_stamina: u32,
    /// Stamina spent per attack or mining swing.
    pub swing_stamina_cost: u32,
    /// Stamina a living player recovers each tick.
    pub stamina_regen: u32,
    /// Unarmed attack damage.
    pub player_attack: u32,
    /// Flat damage reduction per incoming hit.
    pub player_defense: u32,
    /// Melee reach.
    #[serde(with = "fixed_serde")]
    pub player_attack_range: Fixed,
    /// Ticks between player attacks.
    pub player_attack_cooldown: u32,
    /// Ticks between mining swings.
    pub gather_cooldown: u32,
    /// Gold a newly created player starts with.
    pub starting_gold: u32,
    /// Ticks a dropped item stays on the ground.
    pub dropped_item_lifetime: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            seed: 0x5EED,
            inventory_slots: 16,
            fault_threshold: 3,
            interaction_range: Fixed::from_num(2),
            player_speed: Fixed::from_num(1) / Fixed::from_num(4),
            player_max_health: 100,
            player_max_stamina: 100,
            swing_stamina_cost: 5,
            stamina_regen: 1,
            player_attack: 10,
            player_defense: 0,
            player_attack_range: Fixed::from_num(2),
            player_attack_cooldown: 10,
            gather_cooldown: 5,
            starting_gold: 0,
            dropped_item_lifetime: 1200,
        }
    }
}

impl SimConfig {
    /// Parse a config from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| CoreError::ConfigParse(e.to_string()))
    }

    /// Duration of one tick in milliseconds.
    #[must_use]
    pub fn tick_duration_ms(&self) -> u64 {
        1000 / u64::from(self.tick_rate.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_ron_keeps_defaults() {
        let config = SimConfig::from_ron_str("(inventory_slots: 4, fault_threshold: 5)").unwrap();
        assert_eq!(config.inventory_slots, 4);
        assert_eq!(config.fault_threshold, 5);
        assert_eq!(config.tick_rate, TICK_RATE);
        assert_eq!(config.player_attack_range, Fixed::from_num(2));
    }

    #[test]
    fn fixed_fields_are_raw_bits() {
        let config = SimConfig::from_ron_str("(player_speed: 4294967296)").unwrap();
        assert_eq!(config.player_speed, Fixed::ONE);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            SimConfig::from_ron_str("(inventory_slots: \"many\")"),
            Err(CoreError::ConfigParse(_))
        ));
    }

    #[test]
    fn tick_duration() {
        assert_eq!(SimConfig::default().tick_duration_ms(), 50);
    }
}
