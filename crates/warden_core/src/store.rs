//! Authoritative entity table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, EntityKind, Payload, Transform};

/// Storage for all entities in the world.
///
/// Uses a `BTreeMap` so every iteration is in ascending id order. Ids are
/// allocated monotonically and never reused within a world lifetime.
/// Callers hold ids, never references, across system boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStateStore {
    entities: BTreeMap<EntityId, Entity>,
    next_id: EntityId,
}

impl EntityStateStore {
    /// Create an empty store; the first id handed out is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Rebuild a store from snapshot parts.
    ///
    /// The caller is responsible for validating that ids are unique and
    /// below `next_id`.
    #[must_use]
    pub fn from_parts(entities: Vec<Entity>, next_id: EntityId) -> Self {
        Self {
            entities: entities.into_iter().map(|e| (e.id, e)).collect(),
            next_id,
        }
    }

    /// Allocate an id and insert a new entity.
    pub fn spawn(&mut self, transform: Transform, payload: Payload) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        self.entities
            .insert(id, Entity::new(id, transform, payload));
        id
    }

    /// Insert or replace an entity under its own id.
    ///
    /// Ids at or beyond the allocator cursor advance it so they are never
    /// handed out again.
    pub fn upsert(&mut self, entity: Entity) {
        if entity.id >= self.next_id {
            self.next_id = entity.id + 1;
        }
        self.entities.insert(entity.id, entity);
    }

    /// Remove an entity by id.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Get an entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by id.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Next id the allocator will hand out.
    #[must_use]
    pub const fn next_id(&self) -> EntityId {
        self.next_id
    }

    /// All ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Ids of one kind in ascending order.
    #[must_use]
    pub fn ids_of_kind(&self, kind: EntityKind) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.kind() == kind)
            .map(|e| e.id)
            .collect()
    }

    /// Visit every entity of one kind in ascending id order.
    pub fn for_each_of_kind(&self, kind: EntityKind, mut f: impl FnMut(&Entity)) {
        for entity in self.entities.values().filter(|e| e.kind() == kind) {
            f(entity);
        }
    }

    /// Iterate over all entities in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Immutable sorted copy of every entity.
    #[must_use]
    pub fn snapshot_view(&self) -> Vec<Entity> {
        self.entities.values().cloned().collect()
    }
}

impl Default for EntityStateStore {
    fn default() -> Self {
        Self::new()
    }
}
