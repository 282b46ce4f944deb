//! Snapshot inspection.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use warden_core::content::ContentRegistry;
use warden_core::entity::{EntityId, Payload};
use warden_core::snapshot::Snapshot;

use crate::error::{read, Result};

/// One player as seen in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSummary {
    /// Entity id.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Bound to a connection.
    pub online: bool,
    /// Current health.
    pub health: u32,
    /// Gold carried.
    pub gold: u32,
    /// Item totals by id.
    pub items: BTreeMap<String, u32>,
}

/// One wave as seen in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaveSummary {
    /// Wave definition.
    pub wave: String,
    /// Lifecycle phase.
    pub state: String,
    /// Mobs spawned so far.
    pub spawned: u32,
    /// Tracked mobs still in the store.
    pub alive: usize,
}

/// Human- and JSON-friendly digest of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    /// Format version.
    pub version: u32,
    /// Completed ticks.
    pub tick: u64,
    /// Next entity id to allocate.
    pub next_entity_id: EntityId,
    /// Entity count per kind.
    pub entities: BTreeMap<String, usize>,
    /// Players in id order.
    pub players: Vec<PlayerSummary>,
    /// Waves in content order.
    pub waves: Vec<WaveSummary>,
    /// Hazard zones.
    pub hazard_zones: usize,
}

/// Digest a decoded snapshot.
#[must_use]
pub fn summarize(snapshot: &Snapshot) -> SnapshotSummary {
    let mut entities: BTreeMap<String, usize> = BTreeMap::new();
    let mut players = Vec::new();
    for entity in &snapshot.entities {
        *entities.entry(format!("{:?}", entity.kind())).or_default() += 1;
        if let Payload::Player(player) = &entity.payload {
            let mut items: BTreeMap<String, u32> = BTreeMap::new();
            for stack in player.inventory.slots() {
                *items.entry(stack.item.clone()).or_default() += stack.quantity;
            }
            players.push(PlayerSummary {
                id: entity.id,
                name: player.name.clone(),
                online: player.connection.is_some(),
                health: player.health.current,
                gold: player.gold,
                items,
            });
        }
    }

    let waves = snapshot
        .waves
        .iter()
        .map(|w| WaveSummary {
            wave: w.wave.clone(),
            state: format!("{:?}", w.state),
            spawned: w.spawned,
            alive: w
                .mobs
                .iter()
                .filter(|id| snapshot.entities.binary_search_by_key(id, |e| &e.id).is_ok())
                .count(),
        })
        .collect();

    SnapshotSummary {
        version: snapshot.version,
        tick: snapshot.tick,
        next_entity_id: snapshot.next_entity_id,
        entities,
        players,
        waves,
        hazard_zones: snapshot.hazards.zones.len(),
    }
}

/// Decode a snapshot file, optionally checking it against content.
///
/// # Errors
///
/// Returns an error if the file is unreadable, does not decode, or fails the
/// structural check against `content`.
pub fn inspect_snapshot_file(path: &Path, content: Option<&ContentRegistry>) -> Result<SnapshotSummary> {
    let bytes = read(path)?;
    let snapshot = Snapshot::decode(&bytes)?;
    if let Some(content) = content {
        snapshot.validate(content)?;
    }
    Ok(summarize(&snapshot))
}

impl fmt::Display for SnapshotSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "snapshot v{} at tick {}", self.version, self.tick)?;
        writeln!(f, "next entity id: {}", self.next_entity_id)?;
        for (kind, count) in &self.entities {
            writeln!(f, "  {kind}: {count}")?;
        }
        for p in &self.players {
            let status = if p.online { "online" } else { "offline" };
            writeln!(
                f,
                "player {} '{}' ({status}) hp {} gold {} items {:?}",
                p.id, p.name, p.health, p.gold, p.items
            )?;
        }
        for w in &self.waves {
            writeln!(
                f,
                "wave {} {} spawned {} alive {}",
                w.wave, w.state, w.spawned, w.alive
            )?;
        }
        write!(f, "hazard zones: {}", self.hazard_zones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::command::Action;
    use warden_test_utils::fixtures::{fixture_simulation, give, join, COPPER_ORE};

    #[test]
    fn summary_counts_kinds_and_players() {
        let mut sim = fixture_simulation();
        let player = join(&mut sim, 1, "ada");
        give(&mut sim, player, COPPER_ORE, 4);
        sim.submit(2, 0, Action::Join { name: "bob".into() });
        sim.tick();
        sim.submit(2, 1, Action::Leave);
        sim.tick();

        let summary = summarize(sim.full_snapshot());
        assert_eq!(summary.tick, 3);
        assert_eq!(summary.entities.get("Player"), Some(&2));
        assert_eq!(summary.entities.get("Structure"), Some(&3));
        assert_eq!(summary.players.len(), 2);
        assert!(summary.players[0].online);
        assert!(!summary.players[1].online);
        assert_eq!(summary.players[0].items.get(COPPER_ORE), Some(&4));
        assert!(summary.to_string().contains("'ada' (online)"));
    }
}
