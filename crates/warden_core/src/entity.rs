//! Entity definitions.
//!
//! Every world object is an [`Entity`]: an id, a transform and exactly one
//! kind-specific [`Payload`]. The kind tag is derived from the payload so the
//! two can never disagree. Entities reference each other only by
//! [`EntityId`] and re-resolve through the store on every access.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::content::DefId;
use crate::inventory::{Inventory, ItemStack};
use crate::math::{fixed_serde, Facing, Fixed, Vec2Fixed};
use crate::systems::mob_ai::MobBrain;

/// Unique identifier for entities.
pub type EntityId = u64;

/// Identifier of a client connection, assigned by the transport layer.
pub type ConnectionId = u64;

/// Kind tag used for iteration and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// A connected (or parked) player character.
    Player,
    /// A hostile NPC driven by mob AI.
    Mob,
    /// A mineable ore deposit.
    ResourceNode,
    /// A planted crop.
    Crop,
    /// An item stack lying on the ground.
    DroppedItem,
    /// A static interactable: vendor, cooking fire, fishing spot.
    Structure,
}

/// Position and facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Transform {
    /// World position.
    pub position: Vec2Fixed,
    /// Cardinal facing.
    pub facing: Facing,
}

impl Transform {
    /// Transform at a position with the default facing.
    #[must_use]
    pub fn at(position: Vec2Fixed) -> Self {
        Self {
            position,
            facing: Facing::default(),
        }
    }
}

/// Health for damageable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Full health at `max`.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Subtract damage, clamping at zero. Returns the amount actually removed.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let removed = amount.min(self.current);
        self.current -= removed;
        removed
    }

    /// Restore health up to max. Returns the amount actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let restored = amount.min(self.max - self.current.min(self.max));
        self.current += restored;
        restored
    }

    /// True once health has reached zero.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Remaining health as a whole percentage of max.
    #[must_use]
    pub fn percent(&self) -> u32 {
        if self.max == 0 {
            return 0;
        }
        (u64::from(self.current) * 100 / u64::from(self.max)) as u32
    }
}

/// Offensive and defensive numbers for a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombatStats {
    /// Damage per landed attack before mitigation.
    pub attack: u32,
    /// Flat reduction applied to every incoming hit.
    pub defense: u32,
    /// Attack reach.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Ticks between attacks.
    pub cooldown_ticks: u32,
}

/// Kinds of timed status effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusKind {
    /// Movement speed halved.
    Slowed,
    /// Incoming damage +50%.
    Vulnerable,
    /// Outgoing damage +50%.
    Empowered,
    /// Outgoing damage -50%.
    Weakened,
}

/// A status effect with an absolute expiry tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Effect kind.
    pub kind: StatusKind,
    /// First tick on which the effect is no longer active.
    pub expires_at: u64,
}

/// Returns true if `statuses` contains an active effect of `kind`.
#[must_use]
pub fn has_status(statuses: &[StatusEffect], kind: StatusKind) -> bool {
    statuses.iter().any(|s| s.kind == kind)
}

/// Apply or refresh a status; refreshing keeps the later expiry.
pub fn apply_status(statuses: &mut Vec<StatusEffect>, kind: StatusKind, expires_at: u64) {
    if let Some(existing) = statuses.iter_mut().find(|s| s.kind == kind) {
        existing.expires_at = existing.expires_at.max(expires_at);
    } else {
        statuses.push(StatusEffect { kind, expires_at });
        statuses.sort_by_key(|s| s.kind);
    }
}

/// Per-player action cooldowns, stored as the first tick the action is legal again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cooldowns {
    /// Next tick an attack may land.
    pub next_attack_tick: u64,
    /// Next tick a mining swing may land.
    pub next_gather_tick: u64,
}

/// An active fishing line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FishingLine {
    /// Fishing spot structure the line was cast at.
    pub spot: EntityId,
    /// Fishing spot definition.
    pub spot_def: DefId,
    /// Tick the fish bites.
    pub bite_tick: u64,
    /// Last tick reeling in still lands the fish.
    pub window_end: u64,
}

/// Player payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Unique display name; used to re-attach on reconnect.
    pub name: String,
    /// Connection currently controlling this player.
    pub connection: Option<ConnectionId>,
    /// Health.
    pub health: Health,
    /// Stamina.
    pub stamina: u32,
    /// Combat numbers.
    pub stats: CombatStats,
    /// Carried items.
    pub inventory: Inventory,
    /// Currency.
    pub gold: u32,
    /// Action cooldowns.
    pub cooldowns: Cooldowns,
    /// Active status effects, sorted by kind.
    pub statuses: Vec<StatusEffect>,
    /// Active fishing line, if any.
    pub fishing: Option<FishingLine>,
    /// Where the player is walking to.
    pub destination: Option<Vec2Fixed>,
}

impl PlayerState {
    /// Fresh player with configured starting stats and an empty inventory.
    #[must_use]
    pub fn new(name: impl Into<String>, connection: Option<ConnectionId>, config: &SimConfig) -> Self {
        Self {
            name: name.into(),
            connection,
            health: Health::new(config.player_max_health),
            stamina: config.player_max_stamina,
            stats: CombatStats {
                attack: config.player_attack,
                defense: config.player_defense,
                range: config.player_attack_range,
                cooldown_ticks: config.player_attack_cooldown,
            },
            inventory: Inventory::new(config.inventory_slots),
            gold: config.starting_gold,
            cooldowns: Cooldowns::default(),
            statuses: Vec::new(),
            fishing: None,
            destination: None,
        }
    }
}

/// Mob payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobState {
    /// Mob definition.
    pub def: DefId,
    /// Health.
    pub health: Health,
    /// Combat numbers copied from the definition at spawn.
    pub stats: CombatStats,
    /// AI state machine.
    pub brain: MobBrain,
    /// Active status effects, sorted by kind.
    pub statuses: Vec<StatusEffect>,
    /// Next tick an attack may land.
    pub next_attack_tick: u64,
    /// Wave that spawned this mob.
    pub wave: Option<DefId>,
}

/// Resource node payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeState {
    /// Ore definition.
    pub ore: DefId,
    /// Swings left before the node is depleted.
    pub charges: u32,
}

/// Crop payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropState {
    /// Crop definition.
    pub crop: DefId,
    /// Player who planted it.
    pub planter: EntityId,
    /// Current growth stage, starting at zero.
    pub stage: u8,
    /// Ticks spent in the current stage.
    pub ticks_in_stage: u32,
}

/// Dropped item payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DroppedItemState {
    /// The stack on the ground.
    pub stack: ItemStack,
    /// Tick at which cleanup removes it.
    pub despawn_tick: u64,
}

/// Static interactable kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Station {
    /// NPC vendor selling the stock of a vendor definition.
    Vendor(DefId),
    /// Cooking fire for recipes.
    CookingFire,
    /// Fishing spot using a spot definition's catch table.
    FishingSpot(DefId),
}

/// Kind-specific entity data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// Player character.
    Player(PlayerState),
    /// Hostile NPC.
    Mob(MobState),
    /// Ore deposit.
    ResourceNode(NodeState),
    /// Planted crop.
    Crop(CropState),
    /// Item on the ground.
    DroppedItem(DroppedItemState),
    /// Static interactable.
    Structure(Station),
}

impl Payload {
    /// Kind tag of this payload.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Player(_) => EntityKind::Player,
            Self::Mob(_) => EntityKind::Mob,
            Self::ResourceNode(_) => EntityKind::ResourceNode,
            Self::Crop(_) => EntityKind::Crop,
            Self::DroppedItem(_) => EntityKind::DroppedItem,
            Self::Structure(_) => EntityKind::Structure,
        }
    }
}

/// A uniquely identified world object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Identity, assigned by the store.
    pub id: EntityId,
    /// Position and facing.
    pub transform: Transform,
    /// Kind-specific data.
    pub payload: Payload,
}

impl Entity {
    /// Create an entity; the store overwrites `id` on spawn.
    #[must_use]
    pub fn new(id: EntityId, transform: Transform, payload: Payload) -> Self {
        Self {
            id,
            transform,
            payload,
        }
    }

    /// Kind tag.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.payload.kind()
    }

    /// World position.
    #[must_use]
    pub const fn position(&self) -> Vec2Fixed {
        self.transform.position
    }

    /// Health for combatants.
    #[must_use]
    pub fn health(&self) -> Option<&Health> {
        match &self.payload {
            Payload::Player(p) => Some(&p.health),
            Payload::Mob(m) => Some(&m.health),
            _ => None,
        }
    }

    /// Mutable health for combatants.
    pub fn health_mut(&mut self) -> Option<&mut Health> {
        match &mut self.payload {
            Payload::Player(p) => Some(&mut p.health),
            Payload::Mob(m) => Some(&mut m.health),
            _ => None,
        }
    }

    /// Combat stats for combatants.
    #[must_use]
    pub fn stats(&self) -> Option<&CombatStats> {
        match &self.payload {
            Payload::Player(p) => Some(&p.stats),
            Payload::Mob(m) => Some(&m.stats),
            _ => None,
        }
    }

    /// Status effects for combatants (empty otherwise).
    #[must_use]
    pub fn statuses(&self) -> &[StatusEffect] {
        match &self.payload {
            Payload::Player(p) => &p.statuses,
            Payload::Mob(m) => &m.statuses,
            _ => &[],
        }
    }

    /// Mutable status list for combatants.
    pub fn statuses_mut(&mut self) -> Option<&mut Vec<StatusEffect>> {
        match &mut self.payload {
            Payload::Player(p) => Some(&mut p.statuses),
            Payload::Mob(m) => Some(&mut m.statuses),
            _ => None,
        }
    }

    /// True for players and mobs with health above zero.
    #[must_use]
    pub fn is_living_combatant(&self) -> bool {
        self.health().is_some_and(|h| !h.is_dead())
    }

    /// Player payload, if this is a player.
    #[must_use]
    pub fn as_player(&self) -> Option<&PlayerState> {
        match &self.payload {
            Payload::Player(p) => Some(p),
            _ => None,
        }
    }

    /// Mutable player payload, if this is a player.
    pub fn as_player_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.payload {
            Payload::Player(p) => Some(p),
            _ => None,
        }
    }

    /// Mob payload, if this is a mob.
    #[must_use]
    pub fn as_mob(&self) -> Option<&MobState> {
        match &self.payload {
            Payload::Mob(m) => Some(m),
            _ => None,
        }
    }

    /// Mutable mob payload, if this is a mob.
    pub fn as_mob_mut(&mut self) -> Option<&mut MobState> {
        match &mut self.payload {
            Payload::Mob(m) => Some(m),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_clamps_at_zero() {
        let mut health = Health {
            current: 35,
            max: 100,
        };
        assert_eq!(health.apply_damage(40), 35);
        assert_eq!(health.current, 0);
        assert!(health.is_dead());
        assert_eq!(health.apply_damage(10), 0);
    }

    #[test]
    fn heal_caps_at_max() {
        let mut health = Health {
            current: 90,
            max: 100,
        };
        assert_eq!(health.heal(25), 10);
        assert_eq!(health.current, 100);
        assert_eq!(health.percent(), 100);
    }

    #[test]
    fn status_refresh_keeps_later_expiry() {
        let mut statuses = Vec::new();
        apply_status(&mut statuses, StatusKind::Slowed, 10);
        apply_status(&mut statuses, StatusKind::Slowed, 5);
        apply_status(&mut statuses, StatusKind::Empowered, 7);
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].kind, StatusKind::Slowed);
        assert_eq!(statuses[0].expires_at, 10);
        assert!(has_status(&statuses, StatusKind::Empowered));
        assert!(!has_status(&statuses, StatusKind::Weakened));
    }

    #[test]
    fn kind_follows_payload() {
        let entity = Entity::new(
            1,
            Transform::default(),
            Payload::ResourceNode(NodeState {
                ore: "copper".into(),
                charges: 3,
            }),
        );
        assert_eq!(entity.kind(), EntityKind::ResourceNode);
        assert!(entity.health().is_none());
        assert!(!entity.is_living_combatant());
    }
}
