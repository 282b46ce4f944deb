//! Test fixtures and helpers.
//!
//! A small but complete content set (one of everything) laid out around the
//! spawn point so every station is in reach of a freshly joined player.

use std::sync::Arc;

use fixed::types::I32F32;
use warden_core::content::{
    ContentFile, CropDef, FishingSpotDef, HazardDef, HazardZoneDef, ItemDef, ItemKind, LootEntry,
    MobDef, NodePlacement, OreDef, RecipeDef, RecipeInput, StatusGrant, StructurePlacement,
    VendorDef, WaveDef, WorldDef,
};
use warden_core::entity::{Entity, EntityId, Station, StatusKind};
use warden_core::prelude::*;

/// Ore item mined from [`COPPER`] nodes.
pub const COPPER_ORE: &str = "copper_ore";
/// Tier 1 tool with durability.
pub const BRONZE_PICK: &str = "bronze_pick";
/// Seed for [`WHEAT`].
pub const WHEAT_SEED: &str = "wheat_seed";
/// Crop produce item and crop definition id.
pub const WHEAT: &str = "wheat";
/// Fishing catch.
pub const RAW_FISH: &str = "raw_fish";
/// Cooked food, heals 25.
pub const COOKED_FISH: &str = "cooked_fish";
/// Slime loot.
pub const SLIME_GEL: &str = "slime_gel";
/// Weapon adding 5 attack.
pub const IRON_SWORD: &str = "iron_sword";
/// Ore definition with three charges.
pub const COPPER: &str = "copper";
/// Basic melee mob.
pub const SLIME: &str = "slime";
/// Fishing spot definition.
pub const POND: &str = "pond";
/// Recipe turning raw fish into cooked fish.
pub const GRILLED_FISH: &str = "grilled_fish";
/// Vendor definition.
pub const GENERAL_STORE: &str = "general_store";
/// Damaging, slowing hazard.
pub const LAVA: &str = "lava";
/// Wave of three slimes triggering at tick 30.
pub const FIRST_WAVE: &str = "first_wave";

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point ratio without going through floats.
#[must_use]
pub fn fixed_ratio(num: i32, den: i32) -> I32F32 {
    I32F32::from_num(num) / I32F32::from_num(den)
}

/// World position of a tile.
#[must_use]
pub fn tile(x: i32, y: i32) -> Vec2Fixed {
    TilePos::new(x, y).to_world()
}

fn item(id: &str, kind: ItemKind, max_stack: u32, sell: u32, buy: u32) -> ItemDef {
    ItemDef {
        id: id.into(),
        name: id.replace('_', " "),
        kind,
        max_stack,
        sell_price: sell,
        buy_price: buy,
        durability: None,
    }
}

/// The fixture content as a raw file, for tests that tweak it.
#[must_use]
pub fn fixture_file() -> ContentFile {
    let mut pick = item(BRONZE_PICK, ItemKind::Tool { tier: 1 }, 1, 5, 15);
    pick.durability = Some(50);

    ContentFile {
        items: vec![
            item(COPPER_ORE, ItemKind::Material, 99, 2, 0),
            pick,
            item(WHEAT_SEED, ItemKind::Seed { crop: WHEAT.into() }, 99, 0, 1),
            item(WHEAT, ItemKind::Material, 99, 1, 0),
            item(RAW_FISH, ItemKind::Material, 20, 1, 0),
            item(COOKED_FISH, ItemKind::Food { heal: 25 }, 20, 4, 0),
            item(SLIME_GEL, ItemKind::Material, 99, 1, 0),
            item(IRON_SWORD, ItemKind::Weapon { attack: 5 }, 1, 10, 40),
        ],
        mobs: vec![MobDef {
            id: SLIME.into(),
            name: "Slime".into(),
            max_health: 100,
            attack: 6,
            defense: 0,
            attack_range: 1,
            attack_cooldown: 10,
            speed: fixed_ratio(1, 8),
            aggro_radius: 5,
            leash_radius: 15,
            flee_health_percent: 0,
            awareness_ticks: 2,
            aggro_timeout_ticks: 40,
            loot: vec![LootEntry {
                item: SLIME_GEL.into(),
                min: 1,
                max: 2,
                chance_percent: 100,
            }],
        }],
        ores: vec![OreDef {
            id: COPPER.into(),
            item: COPPER_ORE.into(),
            required_tier: 0,
            charges: 3,
            yield_per_swing: 1,
        }],
        crops: vec![CropDef {
            id: WHEAT.into(),
            seed: WHEAT_SEED.into(),
            produce: WHEAT.into(),
            stages: 3,
            ticks_per_stage: 4,
            yield_amount: 2,
        }],
        fishing_spots: vec![FishingSpotDef {
            id: POND.into(),
            catches: vec![LootEntry {
                item: RAW_FISH.into(),
                min: 1,
                max: 1,
                chance_percent: 100,
            }],
            min_bite_ticks: 3,
            max_bite_ticks: 5,
            reel_window: 4,
        }],
        recipes: vec![RecipeDef {
            id: GRILLED_FISH.into(),
            inputs: vec![RecipeInput {
                item: RAW_FISH.into(),
                quantity: 1,
            }],
            output: COOKED_FISH.into(),
            output_quantity: 1,
        }],
        vendors: vec![VendorDef {
            id: GENERAL_STORE.into(),
            name: "General Store".into(),
            stock: vec![BRONZE_PICK.into(), WHEAT_SEED.into()],
        }],
        hazards: vec![HazardDef {
            id: LAVA.into(),
            damage: 5,
            period: 10,
            status: Some(StatusGrant {
                kind: StatusKind::Slowed,
                duration: 15,
            }),
        }],
        waves: vec![WaveDef {
            id: FIRST_WAVE.into(),
            mob: SLIME.into(),
            trigger_tick: 30,
            budget: 3,
            spawn_per_tick: 2,
            spawn_points: vec![TilePos::new(30, 30), TilePos::new(32, 30)],
        }],
        world: WorldDef {
            spawn_point: TilePos::new(0, 0),
            nodes: vec![NodePlacement {
                ore: COPPER.into(),
                at: TilePos::new(1, 0),
            }],
            structures: vec![
                StructurePlacement {
                    station: Station::Vendor(GENERAL_STORE.into()),
                    at: TilePos::new(0, 1),
                },
                StructurePlacement {
                    station: Station::CookingFire,
                    at: TilePos::new(-1, 0),
                },
                StructurePlacement {
                    station: Station::FishingSpot(POND.into()),
                    at: TilePos::new(0, -1),
                },
            ],
            mobs: Vec::new(),
            hazard_zones: vec![HazardZoneDef {
                hazard: LAVA.into(),
                min: TilePos::new(10, 10),
                max: TilePos::new(12, 12),
            }],
            waves: Vec::new(),
        },
    }
}

/// Validated fixture content.
///
/// # Panics
///
/// Panics if the fixture itself is inconsistent.
#[must_use]
pub fn fixture_content() -> ContentRegistry {
    ContentRegistry::from_file(fixture_file()).expect("fixture content is valid")
}

/// Fixture content with [`FIRST_WAVE`] scheduled.
///
/// # Panics
///
/// Panics if the fixture itself is inconsistent.
#[must_use]
pub fn fixture_content_with_wave() -> ContentRegistry {
    let mut file = fixture_file();
    file.world.waves.push(FIRST_WAVE.into());
    ContentRegistry::from_file(file).expect("fixture content is valid")
}

/// Config with a one-tick gather cooldown and a fixed seed.
#[must_use]
pub fn fixture_config() -> SimConfig {
    SimConfig {
        seed: 42,
        gather_cooldown: 1,
        ..SimConfig::default()
    }
}

/// Simulation over the fixture world.
#[must_use]
pub fn fixture_simulation() -> Simulation {
    Simulation::new(Arc::new(fixture_content()), fixture_config())
}

/// Simulation over an arbitrary content set with the fixture config.
#[must_use]
pub fn simulation_with(content: ContentRegistry) -> Simulation {
    Simulation::new(Arc::new(content), fixture_config())
}

/// Join `name` on `connection` and run the tick; returns the player id.
///
/// # Panics
///
/// Panics if the join was rejected.
pub fn join(sim: &mut Simulation, connection: ConnectionId, name: &str) -> EntityId {
    sim.submit(connection, 0, Action::Join { name: name.into() });
    let report = sim.tick();
    assert!(
        report.rejections.iter().all(|r| r.connection != connection),
        "join rejected: {:?}",
        report.rejections
    );
    sim.world()
        .player_for(connection)
        .expect("joined connection has a player")
}

/// First entity of `kind`, in id order.
#[must_use]
pub fn first_of_kind(sim: &Simulation, kind: EntityKind) -> Option<EntityId> {
    sim.world().store.ids_of_kind(kind).first().copied()
}

/// First structure matching `predicate`.
#[must_use]
pub fn find_station(sim: &Simulation, predicate: impl Fn(&Station) -> bool) -> Option<EntityId> {
    sim.world().store.iter().find_map(|e| match &e.payload {
        Payload::Structure(station) if predicate(station) => Some(e.id),
        _ => None,
    })
}

/// Spawn a fixture mob at a tile between ticks.
///
/// # Panics
///
/// Panics if `def` is not in the content set.
pub fn spawn_mob(sim: &mut Simulation, def: &str, at: Vec2Fixed) -> EntityId {
    let content = Arc::clone(sim.content());
    sim.world_mut()
        .spawn_mob(&content, def, at, None)
        .expect("known mob definition")
}

/// Credit items straight into a player's inventory.
///
/// # Panics
///
/// Panics if the player is missing or the items do not fit.
pub fn give(sim: &mut Simulation, player: EntityId, item: &str, quantity: u32) {
    let content = Arc::clone(sim.content());
    let state = sim
        .world_mut()
        .store
        .get_mut(player)
        .and_then(Entity::as_player_mut)
        .expect("player exists");
    match content.item(item).and_then(|d| d.durability) {
        Some(durability) => {
            for _ in 0..quantity {
                let leftover = state
                    .inventory
                    .add_stack(ItemStack::with_durability(item, durability), 1);
                assert!(leftover.is_none(), "inventory full");
            }
        }
        None => {
            let leftover = state.inventory.add(item, quantity, content.max_stack(item));
            assert_eq!(leftover, 0, "inventory full");
        }
    }
}

/// Quantity of `item` a player carries.
///
/// # Panics
///
/// Panics if the player is missing.
#[must_use]
pub fn count(sim: &Simulation, player: EntityId, item: &str) -> u32 {
    sim.world()
        .store
        .get(player)
        .and_then(Entity::as_player)
        .expect("player exists")
        .inventory
        .count(item)
}

/// Teleport an entity between ticks.
///
/// # Panics
///
/// Panics if the entity is missing.
pub fn place(sim: &mut Simulation, entity: EntityId, at: Vec2Fixed) {
    sim.world_mut()
        .store
        .get_mut(entity)
        .expect("entity exists")
        .transform
        .position = at;
}
