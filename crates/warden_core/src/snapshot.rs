//! Full and delta world serialization.
//!
//! A [`Snapshot`] is a versioned copy of everything in [`WorldState`],
//! encoded with bincode. Entities are stored in ascending id order and every
//! map is a `BTreeMap`, so identical worlds encode to identical bytes.
//!
//! Steady-state sync sends a [`DeltaPayload`] per tick: entities that changed
//! or appeared, ids that disappeared, the tick's events, and any world-level
//! tables that changed. Applying every delta in order to the join snapshot
//! reproduces the server's latest snapshot exactly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::command::{Rejection, SeqMarks};
use crate::content::ContentRegistry;
use crate::entity::{ConnectionId, Entity, EntityId, Payload, Station};
use crate::error::SnapshotError;
use crate::event::Event;
use crate::math::TilePos;
use crate::rng::DeterministicRng;
use crate::store::EntityStateStore;
use crate::systems::hazards::HazardField;
use crate::systems::waves::WaveTracker;
use crate::world::WorldState;

/// Snapshot format version; bump on any layout change.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Point-in-time copy of the world.
///
/// `version` is the first field so it occupies the first four bytes of the
/// encoding (bincode writes a `u32` as little-endian fixed width).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version.
    pub version: u32,
    /// Completed ticks at capture.
    pub tick: u64,
    /// Entity id allocator cursor.
    pub next_entity_id: EntityId,
    /// Entities in ascending id order.
    pub entities: Vec<Entity>,
    /// Wave trackers.
    pub waves: Vec<WaveTracker>,
    /// Hazard zones.
    pub hazards: HazardField,
    /// World RNG state.
    pub rng: DeterministicRng,
    /// Connection bindings.
    pub sessions: BTreeMap<ConnectionId, EntityId>,
    /// Last accepted command `seq` per bound connection.
    pub last_seq: SeqMarks,
    /// Player spawn point.
    pub spawn_point: TilePos,
}

impl Snapshot {
    /// Copy the world.
    #[must_use]
    pub fn capture(world: &WorldState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            tick: world.tick,
            next_entity_id: world.store.next_id(),
            entities: world.store.snapshot_view(),
            waves: world.waves.clone(),
            hazards: world.hazards.clone(),
            rng: world.rng.clone(),
            sessions: world.sessions.clone(),
            last_seq: world.last_seq.clone(),
            spawn_point: world.spawn_point,
        }
    }

    /// Serialize to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Encode`] if bincode fails.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::Encode(e.to_string()))
    }

    /// Deserialize from bytes, checking the version first.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::VersionMismatch`] for another format version
    /// and [`SnapshotError::Decode`] for anything that is not a snapshot.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let header: [u8; 4] = bytes
            .get(..4)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| SnapshotError::Decode(format!("{} bytes is too short", bytes.len())))?;
        let version = u32::from_le_bytes(header);
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                got: version,
            });
        }
        bincode::deserialize(bytes).map_err(|e| SnapshotError::Decode(e.to_string()))
    }

    /// Structural checks against world invariants and the content tables.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Structure`] describing the first violation.
    pub fn validate(&self, content: &ContentRegistry) -> Result<(), SnapshotError> {
        let fail = |msg: String| Err(SnapshotError::Structure(msg));

        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                got: self.version,
            });
        }

        let mut previous: Option<EntityId> = None;
        for entity in &self.entities {
            if previous.is_some_and(|p| entity.id <= p) {
                return fail(format!("entity {} is duplicated or out of order", entity.id));
            }
            if entity.id == 0 || entity.id >= self.next_entity_id {
                return fail(format!(
                    "entity {} outside allocator range 1..{}",
                    entity.id, self.next_entity_id
                ));
            }
            previous = Some(entity.id);
            check_payload(entity, content).map_err(SnapshotError::Structure)?;
            if let Some(connection) = entity.as_player().and_then(|p| p.connection) {
                if self.sessions.get(&connection) != Some(&entity.id) {
                    return fail(format!(
                        "player {} names connection {connection} without a matching session",
                        entity.id
                    ));
                }
            }
        }

        for (connection, id) in &self.sessions {
            let bound = self
                .entities
                .binary_search_by_key(id, |e| e.id)
                .ok()
                .and_then(|i| self.entities[i].as_player());
            match bound {
                Some(player) if player.connection == Some(*connection) => {}
                Some(_) => {
                    return fail(format!(
                        "connection {connection} bound to player {id} that names another connection"
                    ))
                }
                None => return fail(format!("connection {connection} bound to non-player {id}")),
            }
        }

        if let Some(connection) = self.last_seq.keys().find(|c| !self.sessions.contains_key(*c)) {
            return fail(format!("sequence mark for unbound connection {connection}"));
        }

        for tracker in &self.waves {
            if content.wave(&tracker.wave).is_none() {
                return fail(format!("unknown wave '{}'", tracker.wave));
            }
        }
        for zone in &self.hazards.zones {
            if content.hazard(&zone.hazard).is_none() {
                return fail(format!("unknown hazard '{}'", zone.hazard));
            }
        }
        Ok(())
    }

    /// Rebuild the world this snapshot describes.
    #[must_use]
    pub fn into_world(self) -> WorldState {
        WorldState {
            tick: self.tick,
            store: EntityStateStore::from_parts(self.entities, self.next_entity_id),
            waves: self.waves,
            hazards: self.hazards,
            rng: self.rng,
            sessions: self.sessions,
            last_seq: self.last_seq,
            spawn_point: self.spawn_point,
        }
    }
}

/// Content references and inventory invariants for one entity.
fn check_payload(entity: &Entity, content: &ContentRegistry) -> Result<(), String> {
    let known = |found: bool, what: &str, id: &str| {
        if found {
            Ok(())
        } else {
            Err(format!("entity {} references unknown {what} '{id}'", entity.id))
        }
    };
    match &entity.payload {
        Payload::Player(player) => {
            player
                .inventory
                .validate(content)
                .map_err(|e| format!("player {}: {e}", entity.id))?;
            if player.health.current > player.health.max {
                return Err(format!("player {} health above max", entity.id));
            }
            Ok(())
        }
        Payload::Mob(mob) => {
            known(content.mob(&mob.def).is_some(), "mob", &mob.def)?;
            if mob.health.current > mob.health.max {
                return Err(format!("mob {} health above max", entity.id));
            }
            Ok(())
        }
        Payload::ResourceNode(node) => known(content.ore(&node.ore).is_some(), "ore", &node.ore),
        Payload::Crop(crop) => known(content.crop(&crop.crop).is_some(), "crop", &crop.crop),
        Payload::DroppedItem(drop) => {
            known(content.item(&drop.stack.item).is_some(), "item", &drop.stack.item)?;
            if drop.stack.quantity == 0 {
                return Err(format!("dropped item {} is empty", entity.id));
            }
            if drop.stack.quantity > content.max_stack(&drop.stack.item) {
                return Err(format!("dropped item {} exceeds its max stack", entity.id));
            }
            Ok(())
        }
        Payload::Structure(Station::Vendor(def)) => known(content.vendor(def).is_some(), "vendor", def),
        Payload::Structure(Station::FishingSpot(def)) => {
            known(content.fishing_spot(def).is_some(), "fishing spot", def)
        }
        Payload::Structure(Station::CookingFire) => Ok(()),
    }
}

/// Changes between two snapshots plus the events that caused them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaPayload {
    /// Tick of the snapshot this delta applies to.
    pub base_tick: u64,
    /// Tick after applying.
    pub tick: u64,
    /// Entities that are new or differ from the base, ascending id.
    pub changed: Vec<Entity>,
    /// Ids present in the base but gone now, ascending.
    pub removed: Vec<EntityId>,
    /// Events emitted while producing `tick`.
    pub events: Vec<Event>,
    /// Allocator cursor after the tick.
    pub next_entity_id: EntityId,
    /// Wave trackers, when any changed.
    pub waves: Option<Vec<WaveTracker>>,
    /// Hazard zones, when any changed.
    pub hazards: Option<HazardField>,
    /// Session bindings, when any changed.
    pub sessions: Option<BTreeMap<ConnectionId, EntityId>>,
    /// Sequence marks, when any changed.
    pub last_seq: Option<SeqMarks>,
    /// RNG state, when it advanced.
    pub rng: Option<DeterministicRng>,
}

impl DeltaPayload {
    /// Delta turning `prev` into `next`.
    #[must_use]
    pub fn between(prev: &Snapshot, next: &Snapshot, events: Vec<Event>) -> Self {
        let before: BTreeMap<EntityId, &Entity> = prev.entities.iter().map(|e| (e.id, e)).collect();
        let changed = next
            .entities
            .iter()
            .filter(|e| before.get(&e.id).map_or(true, |old| *old != *e))
            .cloned()
            .collect();
        let removed = prev
            .entities
            .iter()
            .map(|e| e.id)
            .filter(|id| next.entities.binary_search_by_key(id, |e| e.id).is_err())
            .collect();

        Self {
            base_tick: prev.tick,
            tick: next.tick,
            changed,
            removed,
            events,
            next_entity_id: next.next_entity_id,
            waves: (prev.waves != next.waves).then(|| next.waves.clone()),
            hazards: (prev.hazards != next.hazards).then(|| next.hazards.clone()),
            sessions: (prev.sessions != next.sessions).then(|| next.sessions.clone()),
            last_seq: (prev.last_seq != next.last_seq).then(|| next.last_seq.clone()),
            rng: (prev.rng != next.rng).then(|| next.rng.clone()),
        }
    }

    /// Delta from `prev` to the current world.
    #[must_use]
    pub fn delta(prev: &Snapshot, world: &WorldState, events: Vec<Event>) -> Self {
        Self::between(prev, &Snapshot::capture(world), events)
    }

    /// Apply to a replica snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::BaselineMismatch`] if the replica is not at
    /// `base_tick`; the replica is left untouched.
    pub fn apply_to(&self, snapshot: &mut Snapshot) -> Result<(), SnapshotError> {
        if snapshot.tick != self.base_tick {
            return Err(SnapshotError::BaselineMismatch {
                delta_base: self.base_tick,
                snapshot_tick: snapshot.tick,
            });
        }
        let mut entities: BTreeMap<EntityId, Entity> = std::mem::take(&mut snapshot.entities)
            .into_iter()
            .map(|e| (e.id, e))
            .collect();
        for id in &self.removed {
            entities.remove(id);
        }
        for entity in &self.changed {
            entities.insert(entity.id, entity.clone());
        }
        snapshot.entities = entities.into_values().collect();
        snapshot.tick = self.tick;
        snapshot.next_entity_id = self.next_entity_id;
        if let Some(waves) = &self.waves {
            snapshot.waves.clone_from(waves);
        }
        if let Some(hazards) = &self.hazards {
            snapshot.hazards.clone_from(hazards);
        }
        if let Some(sessions) = &self.sessions {
            snapshot.sessions.clone_from(sessions);
        }
        if let Some(last_seq) = &self.last_seq {
            snapshot.last_seq.clone_from(last_seq);
        }
        if let Some(rng) = &self.rng {
            snapshot.rng.clone_from(rng);
        }
        Ok(())
    }
}

/// Per-tick broadcast: the delta plus rejection feedback per connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFrame {
    /// Tick this frame brings replicas to.
    pub tick: u64,
    /// World changes.
    pub delta: DeltaPayload,
    /// Rejected commands, keyed by issuing connection.
    pub rejections: BTreeMap<ConnectionId, Vec<Rejection>>,
}

impl SyncFrame {
    /// Rejections addressed to `connection`.
    #[must_use]
    pub fn rejections_for(&self, connection: ConnectionId) -> &[Rejection] {
        self.rejections
            .get(&connection)
            .map_or(&[], Vec::as_slice)
    }
}

/// Tracks the last published snapshot and produces sync frames.
#[derive(Debug, Clone)]
pub struct SnapshotManager {
    baseline: Snapshot,
}

impl SnapshotManager {
    /// Manager whose baseline is the current world.
    #[must_use]
    pub fn new(world: &WorldState) -> Self {
        Self {
            baseline: Snapshot::capture(world),
        }
    }

    /// Full snapshot for a joining client or for persistence.
    #[must_use]
    pub fn full_snapshot(&self) -> &Snapshot {
        &self.baseline
    }

    /// Produce the frame for a finished tick and advance the baseline.
    pub fn publish(
        &mut self,
        world: &WorldState,
        events: Vec<Event>,
        rejections: &[Rejection],
    ) -> SyncFrame {
        let next = Snapshot::capture(world);
        let delta = DeltaPayload::between(&self.baseline, &next, events);
        self.baseline = next;

        let mut by_connection: BTreeMap<ConnectionId, Vec<Rejection>> = BTreeMap::new();
        for rejection in rejections {
            by_connection
                .entry(rejection.connection)
                .or_default()
                .push(rejection.clone());
        }
        SyncFrame {
            tick: delta.tick,
            delta,
            rejections: by_connection,
        }
    }

    /// Replace the baseline after a reset or restore.
    pub fn rebase(&mut self, world: &WorldState) {
        self.baseline = Snapshot::capture(world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::entity::{PlayerState, Transform};
    use crate::math::Vec2Fixed;

    fn world_with_player() -> WorldState {
        let mut world = WorldState::empty(7);
        let config = SimConfig::default();
        let id = world.store.spawn(
            Transform::at(Vec2Fixed::from_ints(2, 3)),
            Payload::Player(PlayerState::new("ada", Some(1), &config)),
        );
        world.sessions.insert(1, id);
        world
    }

    #[test]
    fn identical_worlds_encode_identically() {
        let a = world_with_player();
        let b = a.clone();
        let bytes = Snapshot::capture(&a).encode().expect("encode");
        assert_eq!(bytes, Snapshot::capture(&b).encode().expect("encode"));
        assert_eq!(&bytes[..4], &SNAPSHOT_VERSION.to_le_bytes());
    }

    #[test]
    fn decode_rejects_other_versions_and_garbage() {
        let mut bytes = Snapshot::capture(&world_with_player()).encode().expect("encode");
        bytes[0] = 9;
        assert_eq!(
            Snapshot::decode(&bytes),
            Err(SnapshotError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                got: 9
            })
        );
        assert!(matches!(Snapshot::decode(&[1, 0]), Err(SnapshotError::Decode(_))));
        assert!(matches!(
            Snapshot::decode(&[1, 0, 0, 0, 0xff]),
            Err(SnapshotError::Decode(_))
        ));
    }

    #[test]
    fn validate_catches_broken_sessions() {
        let content = ContentRegistry::default();
        let mut snapshot = Snapshot::capture(&world_with_player());
        assert_eq!(snapshot.validate(&content), Ok(()));
        snapshot.sessions.insert(2, 99);
        assert!(matches!(
            snapshot.validate(&content),
            Err(SnapshotError::Structure(_))
        ));
    }

    #[test]
    fn validate_catches_unbound_player_connections_and_marks() {
        let content = ContentRegistry::default();
        let world = world_with_player();

        let mut orphan = Snapshot::capture(&world);
        orphan.sessions.clear();
        assert!(matches!(
            orphan.validate(&content),
            Err(SnapshotError::Structure(_))
        ));

        let mut stray_mark = Snapshot::capture(&world);
        stray_mark.last_seq.insert(1, 3);
        assert_eq!(stray_mark.validate(&content), Ok(()));
        stray_mark.last_seq.insert(2, 3);
        assert!(matches!(
            stray_mark.validate(&content),
            Err(SnapshotError::Structure(_))
        ));
    }

    #[test]
    fn validate_catches_ids_beyond_cursor() {
        let content = ContentRegistry::default();
        let mut snapshot = Snapshot::capture(&world_with_player());
        snapshot.next_entity_id = 1;
        assert!(snapshot.validate(&content).is_err());
    }

    #[test]
    fn delta_converges_and_checks_baseline() {
        let mut world = world_with_player();
        let mut manager = SnapshotManager::new(&world);
        let mut replica = manager.full_snapshot().clone();

        world.tick += 1;
        let config = SimConfig::default();
        world.store.spawn(
            Transform::at(Vec2Fixed::ZERO),
            Payload::Player(PlayerState::new("bob", None, &config)),
        );
        let frame = manager.publish(&world, Vec::new(), &[]);
        assert_eq!(frame.delta.changed.len(), 1);
        assert!(frame.delta.sessions.is_none());

        world.tick += 1;
        world.store.remove(1);
        world.sessions.clear();
        let second = manager.publish(&world, Vec::new(), &[]);
        assert_eq!(second.delta.removed, vec![1]);

        assert!(matches!(
            second.delta.apply_to(&mut replica),
            Err(SnapshotError::BaselineMismatch { .. })
        ));
        frame.delta.apply_to(&mut replica).expect("first delta");
        second.delta.apply_to(&mut replica).expect("second delta");
        assert_eq!(&replica, manager.full_snapshot());
    }
}
