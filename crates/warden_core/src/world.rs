//! The single mutable root every system operates on.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use tracing::warn;

use crate::command::SeqMarks;
use crate::config::SimConfig;
use crate::content::ContentRegistry;
use crate::entity::{
    CombatStats, ConnectionId, Entity, EntityId, EntityKind, Health, MobState, NodeState,
    Payload, Transform,
};
use crate::math::{Fixed, TilePos, Vec2Fixed};
use crate::rng::DeterministicRng;
use crate::snapshot::Snapshot;
use crate::store::EntityStateStore;
use crate::systems::hazards::HazardField;
use crate::systems::mob_ai::MobBrain;
use crate::systems::waves::WaveTracker;

/// Aggregate world state.
///
/// `tick` counts completed ticks, which is also the id of the next tick
/// to run. A snapshot of this state is tagged with the same number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldState {
    /// Completed tick count.
    pub tick: u64,
    /// Entity table.
    pub store: EntityStateStore,
    /// Scheduled waves in content order.
    pub waves: Vec<WaveTracker>,
    /// Hazard zones and their pulse timers.
    pub hazards: HazardField,
    /// World random stream.
    pub rng: DeterministicRng,
    /// Connection to controlled player.
    pub sessions: BTreeMap<ConnectionId, EntityId>,
    /// Last accepted command `seq` per bound connection.
    pub last_seq: SeqMarks,
    /// Where players spawn and respawn.
    pub spawn_point: TilePos,
}

impl WorldState {
    /// Empty world at tick zero.
    #[must_use]
    pub fn empty(seed: u64) -> Self {
        Self {
            tick: 0,
            store: EntityStateStore::new(),
            waves: Vec::new(),
            hazards: HazardField::default(),
            rng: DeterministicRng::new(seed),
            sessions: BTreeMap::new(),
            last_seq: SeqMarks::new(),
            spawn_point: TilePos::default(),
        }
    }

    /// Default world built from the content layout.
    #[must_use]
    pub fn initial(content: &ContentRegistry, config: &SimConfig) -> Self {
        let layout = content.world();
        let mut world = Self::empty(config.seed);
        world.spawn_point = layout.spawn_point;

        for placement in &layout.nodes {
            let Some(ore) = content.ore(&placement.ore) else {
                warn!(ore = %placement.ore, "Skipping node with unknown ore");
                continue;
            };
            world.store.spawn(
                Transform::at(placement.at.to_world()),
                Payload::ResourceNode(NodeState {
                    ore: ore.id.clone(),
                    charges: ore.charges,
                }),
            );
        }

        for placement in &layout.structures {
            world.store.spawn(
                Transform::at(placement.at.to_world()),
                Payload::Structure(placement.station.clone()),
            );
        }

        for placement in &layout.mobs {
            if world
                .spawn_mob(content, &placement.mob, placement.at.to_world(), None)
                .is_none()
            {
                warn!(mob = %placement.mob, "Skipping unknown mob placement");
            }
        }

        world.hazards = HazardField::from_layout(content);
        world.waves = layout
            .waves
            .iter()
            .map(|id| WaveTracker::new(id.clone()))
            .collect();
        world
    }

    /// Spawn a mob from its definition. Returns `None` for unknown ids.
    pub fn spawn_mob(
        &mut self,
        content: &ContentRegistry,
        def_id: &str,
        position: Vec2Fixed,
        wave: Option<String>,
    ) -> Option<EntityId> {
        let def = content.mob(def_id)?;
        let state = MobState {
            def: def.id.clone(),
            health: Health::new(def.max_health),
            stats: CombatStats {
                attack: def.attack,
                defense: def.defense,
                range: Fixed::from_num(def.attack_range),
                cooldown_ticks: def.attack_cooldown,
            },
            brain: MobBrain::new(position),
            statuses: Vec::new(),
            next_attack_tick: 0,
            wave,
        };
        Some(self.store.spawn(Transform::at(position), Payload::Mob(state)))
    }

    /// Player controlled by `connection`, if it still exists.
    #[must_use]
    pub fn player_for(&self, connection: ConnectionId) -> Option<EntityId> {
        let id = *self.sessions.get(&connection)?;
        self.store
            .get(id)
            .filter(|e| e.kind() == EntityKind::Player)
            .map(|e| e.id)
    }

    /// Release `connection`'s player. Returns the player it controlled.
    ///
    /// The entity stays in the world with its movement and fishing line
    /// cleared; it may already be gone if a restore removed it.
    pub fn unbind(&mut self, connection: ConnectionId) -> Option<EntityId> {
        let player = self.sessions.remove(&connection)?;
        self.last_seq.remove(&connection);
        if let Some(state) = self.store.get_mut(player).and_then(Entity::as_player_mut) {
            state.connection = None;
            state.destination = None;
            state.fishing = None;
        }
        Some(player)
    }

    /// Raise sequence marks with a batch's accepted commands and drop marks
    /// of connections that no longer control a player.
    pub fn record_accepted(&mut self, accepted: &SeqMarks) {
        for (&connection, &seq) in accepted {
            let mark = self.last_seq.entry(connection).or_insert(seq);
            *mark = (*mark).max(seq);
        }
        let sessions = &self.sessions;
        self.last_seq.retain(|connection, _| sessions.contains_key(connection));
    }

    /// Player entity with the given name.
    #[must_use]
    pub fn find_player_by_name(&self, name: &str) -> Option<EntityId> {
        self.store
            .iter()
            .find(|e| e.as_player().is_some_and(|p| p.name == name))
            .map(|e| e.id)
    }

    /// Hash of the encoded world, for desync detection.
    ///
    /// Two worlds with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        match Snapshot::capture(self).encode() {
            Ok(bytes) => bytes.hash(&mut hasher),
            Err(err) => {
                warn!(error = %err, "Failed to encode world for hashing");
                self.tick.hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentFile, ItemDef, ItemKind, MobDef, NodePlacement, OreDef, WorldDef};

    fn content() -> ContentRegistry {
        ContentRegistry::from_file(ContentFile {
            items: vec![ItemDef {
                id: "stone".into(),
                name: "Stone".into(),
                kind: ItemKind::Material,
                max_stack: 50,
                sell_price: 1,
                buy_price: 2,
                durability: None,
            }],
            ores: vec![OreDef {
                id: "rock".into(),
                item: "stone".into(),
                required_tier: 0,
                charges: 4,
                yield_per_swing: 1,
            }],
            mobs: vec![MobDef {
                id: "rat".into(),
                name: "Rat".into(),
                max_health: 20,
                attack: 2,
                defense: 0,
                attack_range: 1,
                attack_cooldown: 10,
                speed: Fixed::ONE,
                aggro_radius: 5,
                leash_radius: 10,
                flee_health_percent: 0,
                awareness_ticks: 0,
                aggro_timeout_ticks: 20,
                loot: Vec::new(),
            }],
            world: WorldDef {
                spawn_point: TilePos::new(2, 2),
                nodes: vec![NodePlacement {
                    ore: "rock".into(),
                    at: TilePos::new(5, 5),
                }],
                ..WorldDef::default()
            },
            ..ContentFile::default()
        })
        .unwrap()
    }

    #[test]
    fn initial_world_follows_layout() {
        let world = WorldState::initial(&content(), &SimConfig::default());
        assert_eq!(world.tick, 0);
        assert_eq!(world.spawn_point, TilePos::new(2, 2));
        let nodes = world.store.ids_of_kind(EntityKind::ResourceNode);
        assert_eq!(nodes.len(), 1);
        assert_eq!(
            world.store.get(nodes[0]).unwrap().position(),
            Vec2Fixed::from_ints(5, 5)
        );
    }

    #[test]
    fn spawn_mob_copies_definition() {
        let content = content();
        let mut world = WorldState::empty(1);
        let id = world
            .spawn_mob(&content, "rat", Vec2Fixed::ZERO, None)
            .unwrap();
        let mob = world.store.get(id).unwrap().as_mob().unwrap();
        assert_eq!(mob.health, Health::new(20));
        assert_eq!(mob.stats.range, Fixed::ONE);
        assert!(world.spawn_mob(&content, "dragon", Vec2Fixed::ZERO, None).is_none());
    }

    #[test]
    fn marks_follow_sessions() {
        let mut world = WorldState::empty(1);
        let config = SimConfig::default();
        let id = world.store.spawn(
            Transform::at(Vec2Fixed::ZERO),
            Payload::Player(crate::entity::PlayerState::new("ada", Some(1), &config)),
        );
        world.sessions.insert(1, id);

        world.record_accepted(&SeqMarks::from([(1, 4), (2, 9)]));
        world.record_accepted(&SeqMarks::from([(1, 2)]));
        assert_eq!(world.last_seq, SeqMarks::from([(1, 4)]));

        assert_eq!(world.unbind(1), Some(id));
        assert!(world.last_seq.is_empty());
        let player = world.store.get(id).unwrap().as_player().unwrap();
        assert_eq!(player.connection, None);
        assert_eq!(world.unbind(1), None);
    }

    #[test]
    fn hash_tracks_state() {
        let content = content();
        let config = SimConfig::default();
        let a = WorldState::initial(&content, &config);
        let mut b = WorldState::initial(&content, &config);
        assert_eq!(a.state_hash(), b.state_hash());
        b.rng.next_u64();
        assert_ne!(a.state_hash(), b.state_hash());
    }
}
