//! Events emitted by systems during a tick.
//!
//! Events are the only channel between systems: a producer appends to the
//! tick's ordered log and later systems in the pipeline read it. The full
//! log is also shipped to clients inside each delta.

use serde::{Deserialize, Serialize};

use crate::content::{DefId, ItemId};
use crate::entity::{ConnectionId, EntityId, EntityKind, StatusKind};
use crate::inventory::ItemStack;
use crate::math::{TilePos, Vec2Fixed};
use crate::systems::mob_ai::MobPhase;

/// Something a system caused this tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// A connection took control of a player.
    PlayerJoined {
        /// Player entity.
        player: EntityId,
        /// Controlling connection.
        connection: ConnectionId,
        /// Whether the player entity was newly created.
        created: bool,
    },
    /// A connection released its player.
    PlayerLeft {
        /// Player entity.
        player: EntityId,
        /// Released connection.
        connection: ConnectionId,
    },
    /// A player moved.
    PlayerMoved {
        /// Player entity.
        player: EntityId,
        /// New position.
        position: Vec2Fixed,
    },

    /// A hazard zone fired.
    HazardPulse {
        /// Zone index in the hazard field.
        zone: usize,
        /// Hazard definition.
        hazard: DefId,
    },
    /// Damage from a hazard pulse, resolved by the damage system.
    HazardDamage {
        /// Entity hit.
        target: EntityId,
        /// Hazard definition.
        hazard: DefId,
        /// Raw damage before mitigation.
        amount: u32,
    },
    /// A status effect was applied or refreshed.
    StatusApplied {
        /// Affected entity.
        entity: EntityId,
        /// Effect kind.
        kind: StatusKind,
        /// First tick the effect is gone.
        expires_at: u64,
    },
    /// A status effect ran out.
    StatusExpired {
        /// Affected entity.
        entity: EntityId,
        /// Effect kind.
        kind: StatusKind,
    },

    /// One mining swing produced ore.
    OreMined {
        /// Node mined.
        node: EntityId,
        /// Miner.
        player: EntityId,
        /// Item produced.
        item: ItemId,
        /// Quantity produced.
        quantity: u32,
    },
    /// A node ran out of charges.
    NodeDepleted {
        /// Node.
        node: EntityId,
    },
    /// A tool wore out.
    ToolBroke {
        /// Owner.
        player: EntityId,
        /// Tool item.
        item: ItemId,
    },

    /// A seed was planted.
    CropPlanted {
        /// New crop entity.
        crop: EntityId,
        /// Planter.
        player: EntityId,
        /// Tile planted on.
        tile: TilePos,
    },
    /// A crop advanced a growth stage.
    CropGrew {
        /// Crop entity.
        crop: EntityId,
        /// New stage.
        stage: u8,
    },
    /// A mature crop was harvested.
    CropHarvested {
        /// Crop entity (removed).
        crop: EntityId,
        /// Harvester.
        player: EntityId,
        /// Produce item.
        item: ItemId,
        /// Quantity produced.
        quantity: u32,
    },

    /// A fishing line was cast.
    LineCast {
        /// Angler.
        player: EntityId,
        /// Fishing spot structure.
        spot: EntityId,
    },
    /// Reeling in landed a fish.
    FishCaught {
        /// Angler.
        player: EntityId,
        /// Item caught.
        item: ItemId,
        /// Quantity caught.
        quantity: u32,
    },
    /// Reeling in missed the bite window.
    FishEscaped {
        /// Angler.
        player: EntityId,
    },

    /// A recipe was cooked.
    ItemCooked {
        /// Cook.
        player: EntityId,
        /// Recipe.
        recipe: DefId,
        /// Item produced.
        item: ItemId,
        /// Quantity produced.
        quantity: u32,
    },
    /// Items were sold to a vendor.
    ItemSold {
        /// Seller.
        player: EntityId,
        /// Vendor structure.
        vendor: EntityId,
        /// Item sold.
        item: ItemId,
        /// Quantity sold.
        quantity: u32,
        /// Gold received.
        gold: u32,
    },
    /// Items were bought from a vendor.
    ItemPurchased {
        /// Buyer.
        player: EntityId,
        /// Vendor structure.
        vendor: EntityId,
        /// Item bought.
        item: ItemId,
        /// Quantity bought.
        quantity: u32,
        /// Gold paid.
        gold: u32,
    },

    /// An attack connected; resolved into damage by the damage system.
    AttackLanded {
        /// Attacker.
        attacker: EntityId,
        /// Target.
        target: EntityId,
        /// Raw damage after attacker buffs.
        amount: u32,
    },
    /// Damage was applied to an entity.
    DamageDealt {
        /// Target.
        target: EntityId,
        /// Total damage applied this tick.
        amount: u32,
        /// Health left.
        remaining: u32,
    },
    /// An entity's health reached zero.
    EntityDied {
        /// Dead entity.
        entity: EntityId,
        /// Attacker credited with the kill, if any.
        killer: Option<EntityId>,
        /// Where it died.
        position: Vec2Fixed,
    },

    /// A mob's AI changed phase.
    MobStateChanged {
        /// Mob.
        mob: EntityId,
        /// Previous phase.
        from: MobPhase,
        /// New phase.
        to: MobPhase,
    },
    /// A mob was spawned by a wave.
    MobSpawned {
        /// New mob entity.
        mob: EntityId,
        /// Mob definition.
        def: DefId,
        /// Spawning wave.
        wave: DefId,
    },
    /// A wave began spawning.
    WaveStarted {
        /// Wave.
        wave: DefId,
    },
    /// A wave finished spawning and is waiting for its mobs to die.
    WaveActive {
        /// Wave.
        wave: DefId,
        /// Mobs spawned in total.
        spawned: u32,
    },
    /// Every mob of a wave is dead.
    WaveCleared {
        /// Wave.
        wave: DefId,
    },

    /// A loot stack was placed on the ground.
    LootDropped {
        /// Entity whose death produced the loot.
        source: EntityId,
        /// New dropped item entity.
        dropped: EntityId,
        /// Stack dropped.
        stack: ItemStack,
    },
    /// Items were credited to a player's inventory.
    ItemGranted {
        /// Recipient.
        player: EntityId,
        /// Item.
        item: ItemId,
        /// Quantity that fit.
        quantity: u32,
    },
    /// A player picked up a dropped item.
    ItemPickedUp {
        /// Player.
        player: EntityId,
        /// Dropped item entity.
        dropped: EntityId,
        /// Quantity taken.
        quantity: u32,
    },
    /// Items left a player's inventory onto the ground.
    ItemDropped {
        /// Player.
        player: EntityId,
        /// New dropped item entity.
        dropped: EntityId,
        /// Stack dropped.
        stack: ItemStack,
    },
    /// A player consumed an item.
    ItemUsed {
        /// Player.
        player: EntityId,
        /// Item consumed.
        item: ItemId,
        /// Health restored.
        healed: u32,
    },

    /// An entity left the world.
    EntityRemoved {
        /// Removed entity.
        entity: EntityId,
        /// Its kind.
        kind: EntityKind,
    },
    /// A dead player came back.
    PlayerRespawned {
        /// Player.
        player: EntityId,
        /// Respawn position.
        position: Vec2Fixed,
    },
}
