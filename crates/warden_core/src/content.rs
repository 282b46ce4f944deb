//! Static content registry.
//!
//! Item, mob, ore, crop, fishing spot, recipe, vendor, hazard, wave and world
//! layout definitions, loaded once from RON and consumed read-only by every
//! system. Definitions are keyed by stable string identifiers.
//!
//! # Example RON
//!
//! ```ron
//! ContentFile(
//!     items: [
//!         ItemDef(id: "copper_ore", name: "Copper Ore", kind: Material, sell_price: 3),
//!         ItemDef(id: "pickaxe", name: "Pickaxe", kind: Tool(tier: 1), max_stack: 1),
//!     ],
//!     ores: [
//!         OreDef(id: "copper", item: "copper_ore", required_tier: 1, charges: 3),
//!     ],
//! )
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Station, StatusKind};
use crate::error::{CoreError, Result};
use crate::math::{fixed_serde, Fixed, TilePos};

/// Identifier of an item definition.
pub type ItemId = String;

/// Identifier of any other definition.
pub type DefId = String;

/// What an item is used for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    /// Crafting or trade material.
    Material,
    /// Plantable seed growing into the named crop.
    Seed {
        /// Crop definition id.
        crop: DefId,
    },
    /// Consumable restoring health.
    Food {
        /// Health restored on use.
        heal: u32,
    },
    /// Gathering tool.
    Tool {
        /// Tool tier, compared against ore requirements.
        tier: u8,
    },
    /// Weapon adding to base attack.
    Weapon {
        /// Bonus attack while carried.
        attack: u32,
    },
}

/// Item definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDef {
    /// Unique id.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Item behaviour.
    pub kind: ItemKind,
    /// Largest quantity a single inventory stack holds.
    #[serde(default = "default_max_stack")]
    pub max_stack: u32,
    /// Gold paid by vendors per unit.
    #[serde(default)]
    pub sell_price: u32,
    /// Gold charged by vendors per unit.
    #[serde(default)]
    pub buy_price: u32,
    /// Uses before a tool breaks; `None` for unbreakable items.
    #[serde(default)]
    pub durability: Option<u32>,
}

fn default_max_stack() -> u32 {
    99
}

/// One row of a loot table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootEntry {
    /// Item dropped.
    pub item: ItemId,
    /// Minimum quantity.
    pub min: u32,
    /// Maximum quantity.
    pub max: u32,
    /// Drop chance in percent.
    #[serde(default = "default_chance")]
    pub chance_percent: u8,
}

fn default_chance() -> u8 {
    100
}

/// Mob definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobDef {
    /// Unique id.
    pub id: DefId,
    /// Display name.
    pub name: String,
    /// Health at spawn.
    pub max_health: u32,
    /// Damage per landed attack.
    pub attack: u32,
    /// Flat damage reduction per hit.
    #[serde(default)]
    pub defense: u32,
    /// Attack reach in tiles.
    pub attack_range: u32,
    /// Ticks between attacks.
    pub attack_cooldown: u32,
    /// Movement per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Distance at which the mob notices players.
    pub aggro_radius: u32,
    /// Distance from home beyond which the mob gives up a chase.
    pub leash_radius: u32,
    /// Health percentage at or below which the mob flees.
    #[serde(default)]
    pub flee_health_percent: u8,
    /// Ticks between noticing a player and starting the chase.
    #[serde(default)]
    pub awareness_ticks: u32,
    /// Ticks without a player in aggro radius before giving up.
    #[serde(default = "default_aggro_timeout")]
    pub aggro_timeout_ticks: u32,
    /// Drops rolled on death.
    #[serde(default)]
    pub loot: Vec<LootEntry>,
}

fn default_aggro_timeout() -> u32 {
    60
}

/// Ore deposit definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OreDef {
    /// Unique id.
    pub id: DefId,
    /// Item produced per swing.
    pub item: ItemId,
    /// Minimum tool tier required.
    #[serde(default)]
    pub required_tier: u8,
    /// Swings before depletion.
    pub charges: u32,
    /// Items produced per swing.
    #[serde(default = "default_one")]
    pub yield_per_swing: u32,
}

fn default_one() -> u32 {
    1
}

/// Crop definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropDef {
    /// Unique id.
    pub id: DefId,
    /// Seed item consumed on planting.
    pub seed: ItemId,
    /// Item produced on harvest.
    pub produce: ItemId,
    /// Number of growth stages; the last stage is mature.
    pub stages: u8,
    /// Ticks spent in each stage before advancing.
    pub ticks_per_stage: u32,
    /// Items produced per harvest.
    #[serde(default = "default_one")]
    pub yield_amount: u32,
}

/// Fishing spot definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FishingSpotDef {
    /// Unique id.
    pub id: DefId,
    /// Catch table; one entry that passes its chance roll is caught.
    pub catches: Vec<LootEntry>,
    /// Earliest bite, in ticks after the cast.
    pub min_bite_ticks: u32,
    /// Latest bite, in ticks after the cast.
    pub max_bite_ticks: u32,
    /// Ticks after the bite during which reeling in succeeds.
    pub reel_window: u32,
}

/// Recipe ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeInput {
    /// Item consumed.
    pub item: ItemId,
    /// Quantity consumed.
    pub quantity: u32,
}

/// Cooking recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeDef {
    /// Unique id.
    pub id: DefId,
    /// Ingredients consumed.
    pub inputs: Vec<RecipeInput>,
    /// Item produced.
    pub output: ItemId,
    /// Quantity produced.
    #[serde(default = "default_one")]
    pub output_quantity: u32,
}

/// NPC vendor definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorDef {
    /// Unique id.
    pub id: DefId,
    /// Display name.
    pub name: String,
    /// Items the vendor sells. Vendors buy anything with a sell price.
    pub stock: Vec<ItemId>,
}

/// Status effect granted by a hazard pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusGrant {
    /// Effect kind.
    pub kind: StatusKind,
    /// Duration in ticks.
    pub duration: u32,
}

/// Environmental hazard definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardDef {
    /// Unique id.
    pub id: DefId,
    /// Damage per pulse.
    pub damage: u32,
    /// Ticks between pulses.
    pub period: u32,
    /// Optional status applied on each pulse.
    #[serde(default)]
    pub status: Option<StatusGrant>,
}

/// Enemy wave definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveDef {
    /// Unique id.
    pub id: DefId,
    /// Mob definition spawned.
    pub mob: DefId,
    /// Tick at which the wave starts spawning.
    pub trigger_tick: u64,
    /// Total mobs spawned.
    pub budget: u32,
    /// Mobs spawned per tick while spawning.
    #[serde(default = "default_one")]
    pub spawn_per_tick: u32,
    /// Spawn points, cycled in order.
    pub spawn_points: Vec<TilePos>,
}

/// A mob placed in the world at boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobPlacement {
    /// Mob definition.
    pub mob: DefId,
    /// Tile.
    pub at: TilePos,
}

/// A resource node placed in the world at boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePlacement {
    /// Ore definition.
    pub ore: DefId,
    /// Tile.
    pub at: TilePos,
}

/// A static structure placed in the world at boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructurePlacement {
    /// Station type.
    pub station: Station,
    /// Tile.
    pub at: TilePos,
}

/// A rectangular hazard area, inclusive of both corners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardZoneDef {
    /// Hazard definition.
    pub hazard: DefId,
    /// Lowest corner.
    pub min: TilePos,
    /// Highest corner.
    pub max: TilePos,
}

/// Initial world layout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorldDef {
    /// Where new and respawning players appear.
    #[serde(default)]
    pub spawn_point: TilePos,
    /// Resource nodes.
    #[serde(default)]
    pub nodes: Vec<NodePlacement>,
    /// Vendors, cooking fires and fishing spots.
    #[serde(default)]
    pub structures: Vec<StructurePlacement>,
    /// Pre-placed mobs.
    #[serde(default)]
    pub mobs: Vec<MobPlacement>,
    /// Hazard areas.
    #[serde(default)]
    pub hazard_zones: Vec<HazardZoneDef>,
    /// Waves scheduled for this world, by id.
    #[serde(default)]
    pub waves: Vec<DefId>,
}

/// Raw content file as written in RON.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentFile {
    /// Items.
    pub items: Vec<ItemDef>,
    /// Mobs.
    pub mobs: Vec<MobDef>,
    /// Ores.
    pub ores: Vec<OreDef>,
    /// Crops.
    pub crops: Vec<CropDef>,
    /// Fishing spots.
    pub fishing_spots: Vec<FishingSpotDef>,
    /// Recipes.
    pub recipes: Vec<RecipeDef>,
    /// Vendors.
    pub vendors: Vec<VendorDef>,
    /// Hazards.
    pub hazards: Vec<HazardDef>,
    /// Waves.
    pub waves: Vec<WaveDef>,
    /// World layout.
    pub world: WorldDef,
}

/// Indexed, validated, immutable content tables.
#[derive(Debug, Clone, Default)]
pub struct ContentRegistry {
    items: BTreeMap<ItemId, ItemDef>,
    mobs: BTreeMap<DefId, MobDef>,
    ores: BTreeMap<DefId, OreDef>,
    crops: BTreeMap<DefId, CropDef>,
    fishing_spots: BTreeMap<DefId, FishingSpotDef>,
    recipes: BTreeMap<DefId, RecipeDef>,
    vendors: BTreeMap<DefId, VendorDef>,
    hazards: BTreeMap<DefId, HazardDef>,
    waves: BTreeMap<DefId, WaveDef>,
    world: WorldDef,
}

fn index<T>(
    kind: &str,
    defs: Vec<T>,
    id: impl Fn(&T) -> &str,
    errors: &mut Vec<String>,
) -> BTreeMap<String, T> {
    let mut map = BTreeMap::new();
    for def in defs {
        let key = id(&def).to_string();
        if map.contains_key(&key) {
            errors.push(format!("Duplicate {kind} id '{key}'"));
            continue;
        }
        map.insert(key, def);
    }
    map
}

impl ContentRegistry {
    /// Index a content file, collecting duplicate-id problems.
    fn index(file: ContentFile) -> (Self, Vec<String>) {
        let mut errors = Vec::new();
        let registry = Self {
            items: index("item", file.items, |d| &d.id, &mut errors),
            mobs: index("mob", file.mobs, |d| &d.id, &mut errors),
            ores: index("ore", file.ores, |d| &d.id, &mut errors),
            crops: index("crop", file.crops, |d| &d.id, &mut errors),
            fishing_spots: index("fishing spot", file.fishing_spots, |d| &d.id, &mut errors),
            recipes: index("recipe", file.recipes, |d| &d.id, &mut errors),
            vendors: index("vendor", file.vendors, |d| &d.id, &mut errors),
            hazards: index("hazard", file.hazards, |d| &d.id, &mut errors),
            waves: index("wave", file.waves, |d| &d.id, &mut errors),
            world: file.world,
        };
        (registry, errors)
    }

    /// Build a validated registry from a parsed content file.
    pub fn from_file(file: ContentFile) -> Result<Self> {
        let (registry, mut errors) = Self::index(file);
        errors.extend(registry.validate());
        if errors.is_empty() {
            Ok(registry)
        } else {
            Err(CoreError::InvalidContent(errors.join("; ")))
        }
    }

    /// Parse and validate a registry from RON text.
    ///
    /// `source_name` is only used in error messages.
    pub fn from_ron_str(source_name: &str, text: &str) -> Result<Self> {
        let file: ContentFile = ron::from_str(text).map_err(|e| CoreError::ContentParse {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;
        Self::from_file(file)
    }

    /// Check every cross-reference in the tables.
    ///
    /// Returns a list of human readable problems; empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let require_item = |owner: String, item: &str, errors: &mut Vec<String>| {
            if !self.items.contains_key(item) {
                errors.push(format!("{owner} references unknown item '{item}'"));
            }
        };

        for item in self.items.values() {
            if item.max_stack == 0 {
                errors.push(format!("Item '{}' has max_stack 0", item.id));
            }
            if let ItemKind::Seed { crop } = &item.kind {
                if !self.crops.contains_key(crop) {
                    errors.push(format!("Seed '{}' grows unknown crop '{crop}'", item.id));
                }
            }
        }

        for mob in self.mobs.values() {
            if mob.max_health == 0 {
                errors.push(format!("Mob '{}' has zero max_health", mob.id));
            }
            for entry in &mob.loot {
                require_item(format!("Mob '{}' loot", mob.id), &entry.item, &mut errors);
                if entry.min > entry.max {
                    errors.push(format!("Mob '{}' loot '{}' has min > max", mob.id, entry.item));
                }
            }
        }

        for ore in self.ores.values() {
            require_item(format!("Ore '{}'", ore.id), &ore.item, &mut errors);
            if ore.charges == 0 {
                errors.push(format!("Ore '{}' has zero charges", ore.id));
            }
        }

        for crop in self.crops.values() {
            require_item(format!("Crop '{}' seed", crop.id), &crop.seed, &mut errors);
            require_item(format!("Crop '{}' produce", crop.id), &crop.produce, &mut errors);
            if crop.stages == 0 {
                errors.push(format!("Crop '{}' has zero stages", crop.id));
            }
        }

        for spot in self.fishing_spots.values() {
            if spot.catches.is_empty() {
                errors.push(format!("Fishing spot '{}' has no catches", spot.id));
            }
            for entry in &spot.catches {
                require_item(format!("Fishing spot '{}'", spot.id), &entry.item, &mut errors);
            }
            if spot.min_bite_ticks > spot.max_bite_ticks {
                errors.push(format!("Fishing spot '{}' has min bite > max bite", spot.id));
            }
        }

        for recipe in self.recipes.values() {
            for input in &recipe.inputs {
                require_item(format!("Recipe '{}' input", recipe.id), &input.item, &mut errors);
            }
            require_item(format!("Recipe '{}' output", recipe.id), &recipe.output, &mut errors);
        }

        for vendor in self.vendors.values() {
            for item in &vendor.stock {
                require_item(format!("Vendor '{}' stock", vendor.id), item, &mut errors);
            }
        }

        for hazard in self.hazards.values() {
            if hazard.period == 0 {
                errors.push(format!("Hazard '{}' has zero period", hazard.id));
            }
        }

        for wave in self.waves.values() {
            if !self.mobs.contains_key(&wave.mob) {
                errors.push(format!("Wave '{}' spawns unknown mob '{}'", wave.id, wave.mob));
            }
            if wave.spawn_points.is_empty() {
                errors.push(format!("Wave '{}' has no spawn points", wave.id));
            }
        }

        let world = &self.world;
        for node in &world.nodes {
            if !self.ores.contains_key(&node.ore) {
                errors.push(format!("World node references unknown ore '{}'", node.ore));
            }
        }
        for placement in &world.structures {
            match &placement.station {
                Station::Vendor(id) if !self.vendors.contains_key(id) => {
                    errors.push(format!("World structure references unknown vendor '{id}'"));
                }
                Station::FishingSpot(id) if !self.fishing_spots.contains_key(id) => {
                    errors.push(format!("World structure references unknown fishing spot '{id}'"));
                }
                _ => {}
            }
        }
        for placement in &world.mobs {
            if !self.mobs.contains_key(&placement.mob) {
                errors.push(format!("World mob references unknown mob '{}'", placement.mob));
            }
        }
        for zone in &world.hazard_zones {
            if !self.hazards.contains_key(&zone.hazard) {
                errors.push(format!("World zone references unknown hazard '{}'", zone.hazard));
            }
        }
        for wave in &world.waves {
            if !self.waves.contains_key(wave) {
                errors.push(format!("World schedules unknown wave '{wave}'"));
            }
        }

        errors
    }

    /// Item definition by id.
    #[must_use]
    pub fn item(&self, id: &str) -> Option<&ItemDef> {
        self.items.get(id)
    }

    /// Mob definition by id.
    #[must_use]
    pub fn mob(&self, id: &str) -> Option<&MobDef> {
        self.mobs.get(id)
    }

    /// Ore definition by id.
    #[must_use]
    pub fn ore(&self, id: &str) -> Option<&OreDef> {
        self.ores.get(id)
    }

    /// Crop definition by id.
    #[must_use]
    pub fn crop(&self, id: &str) -> Option<&CropDef> {
        self.crops.get(id)
    }

    /// Fishing spot definition by id.
    #[must_use]
    pub fn fishing_spot(&self, id: &str) -> Option<&FishingSpotDef> {
        self.fishing_spots.get(id)
    }

    /// Recipe by id.
    #[must_use]
    pub fn recipe(&self, id: &str) -> Option<&RecipeDef> {
        self.recipes.get(id)
    }

    /// Vendor definition by id.
    #[must_use]
    pub fn vendor(&self, id: &str) -> Option<&VendorDef> {
        self.vendors.get(id)
    }

    /// Hazard definition by id.
    #[must_use]
    pub fn hazard(&self, id: &str) -> Option<&HazardDef> {
        self.hazards.get(id)
    }

    /// Wave definition by id.
    #[must_use]
    pub fn wave(&self, id: &str) -> Option<&WaveDef> {
        self.waves.get(id)
    }

    /// Initial world layout.
    #[must_use]
    pub fn world(&self) -> &WorldDef {
        &self.world
    }

    /// Largest stack size for an item; unknown items stack to 1.
    #[must_use]
    pub fn max_stack(&self, item: &str) -> u32 {
        self.items.get(item).map_or(1, |def| def.max_stack)
    }

    /// Number of definitions per table, for logging.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} items, {} mobs, {} ores, {} crops, {} fishing spots, {} recipes, {} vendors, {} hazards, {} waves",
            self.items.len(),
            self.mobs.len(),
            self.ores.len(),
            self.crops.len(),
            self.fishing_spots.len(),
            self.recipes.len(),
            self.vendors.len(),
            self.hazards.len(),
            self.waves.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
ContentFile(
    items: [
        ItemDef(id: "copper_ore", name: "Copper Ore", kind: Material, sell_price: 3),
        ItemDef(id: "pickaxe", name: "Pickaxe", kind: Tool(tier: 1), max_stack: 1),
        ItemDef(id: "wheat_seed", name: "Wheat Seed", kind: Seed(crop: "wheat")),
        ItemDef(id: "wheat", name: "Wheat", kind: Material),
    ],
    ores: [
        OreDef(id: "copper", item: "copper_ore", required_tier: 1, charges: 3),
    ],
    crops: [
        CropDef(id: "wheat", seed: "wheat_seed", produce: "wheat", stages: 3, ticks_per_stage: 4),
    ],
    world: WorldDef(
        spawn_point: TilePos(x: 0, y: 0),
        nodes: [NodePlacement(ore: "copper", at: TilePos(x: 1, y: 0))],
    ),
)
"#;

    #[test]
    fn parses_and_indexes() {
        let registry = ContentRegistry::from_ron_str("sample", SAMPLE).unwrap();
        assert_eq!(registry.ore("copper").unwrap().yield_per_swing, 1);
        assert_eq!(registry.max_stack("copper_ore"), 99);
        assert_eq!(registry.max_stack("pickaxe"), 1);
        assert_eq!(registry.max_stack("nonexistent"), 1);
        assert_eq!(registry.world().nodes.len(), 1);
    }

    #[test]
    fn dangling_reference_is_invalid() {
        let file = ContentFile {
            ores: vec![OreDef {
                id: "tin".into(),
                item: "tin_ore".into(),
                required_tier: 0,
                charges: 2,
                yield_per_swing: 1,
            }],
            ..ContentFile::default()
        };
        let err = ContentRegistry::from_file(file).unwrap_err();
        assert!(err.to_string().contains("tin_ore"));
    }

    #[test]
    fn duplicate_ids_are_invalid() {
        let item = ItemDef {
            id: "rock".into(),
            name: "Rock".into(),
            kind: ItemKind::Material,
            max_stack: 10,
            sell_price: 0,
            buy_price: 0,
            durability: None,
        };
        let file = ContentFile {
            items: vec![item.clone(), item],
            ..ContentFile::default()
        };
        assert!(matches!(
            ContentRegistry::from_file(file),
            Err(CoreError::InvalidContent(msg)) if msg.contains("Duplicate item id 'rock'")
        ));
    }

    #[test]
    fn syntax_error_names_source() {
        let err = ContentRegistry::from_ron_str("broken.ron", "ContentFile(items: [").unwrap_err();
        assert!(matches!(err, CoreError::ContentParse { ref source_name, .. } if source_name == "broken.ron"));
    }
}
