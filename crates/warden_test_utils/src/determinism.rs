//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! The authority must be reproducible from its initial snapshot plus the
//! command log. Sources of non-determinism include:
//!
//! - **Floating-point math**: positions and distances use
//!   [`warden_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: the store, sessions and every other
//!   observable map are `BTreeMap`s, iterated in ascending key order.
//!
//! - **System randomness**: loot, catches and bite timing draw from the
//!   seeded RNG carried inside the world.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual system behavior
//! 2. **Property tests**: random command scripts still produce deterministic outputs
//! 3. **Integration tests**: full scenarios are reproducible
//! 4. **Parallel tests**: running N simulations on threads all match

use std::thread;

use warden_core::command::Command;
use warden_core::event::Event;
use warden_core::simulation::Simulation;
use warden_core::snapshot::Snapshot;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
    /// First tick whose event log differed between runs, if any.
    pub event_divergence: Option<u64>,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes or event logs
    /// across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}\n\
                 Event logs diverged at tick: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes,
                self.event_divergence
            );
        }
    }
}

/// Run a setup multiple times and verify every run ends on the same hash.
///
/// `step` receives the state and the tick index about to run.
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S, u64),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for tick in 0..ticks {
            step(&mut state, tick);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
        event_divergence: None,
    }
}

/// Outcome of running a command script once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRun {
    /// State hash after the last tick.
    pub final_hash: u64,
    /// Events of every tick, in tick order.
    pub events: Vec<Vec<Event>>,
}

/// Run `script` against a fresh simulation, keeping every tick's events.
///
/// `script[i]` is submitted before tick `i`; ticks beyond the script run
/// with no commands.
pub fn run_script<F>(setup_fn: F, script: &[Vec<Command>], num_ticks: u64) -> ScriptRun
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();
    let mut events = Vec::new();
    for tick in 0..num_ticks {
        let report = sim.run_batch(script_commands(script, tick));
        events.push(report.events().to_vec());
    }
    ScriptRun {
        final_hash: sim.state_hash(),
        events,
    }
}

fn script_commands(script: &[Vec<Command>], tick: u64) -> Vec<Command> {
    usize::try_from(tick)
        .ok()
        .and_then(|i| script.get(i))
        .cloned()
        .unwrap_or_default()
}

/// Index of the first tick whose event logs differ.
#[must_use]
pub fn first_event_divergence(a: &[Vec<Event>], b: &[Vec<Event>]) -> Option<u64> {
    let differs = a.iter().zip(b).position(|(x, y)| x != y).or_else(|| {
        (a.len() != b.len()).then(|| a.len().min(b.len()))
    })?;
    u64::try_from(differs).ok()
}

/// Run the same command script against two fresh simulations.
///
/// Both the final state hashes and the per-tick event logs must match.
pub fn verify_script_determinism<F>(setup_fn: F, script: &[Vec<Command>], num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> Simulation,
{
    let first = run_script(&setup_fn, script, num_ticks);
    let second = run_script(&setup_fn, script, num_ticks);
    let event_divergence = first_event_divergence(&first.events, &second.events);
    DeterminismResult {
        is_deterministic: first.final_hash == second.final_hash && event_divergence.is_none(),
        hashes: vec![first.final_hash, second.final_hash],
        ticks: num_ticks,
        event_divergence,
    }
}

/// Run N simulations on scoped threads and collect their final hashes.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> Vec<u64>
where
    F: Fn() -> Simulation + Sync,
{
    thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    })
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if the runs agree on every tick, `Some(tick)` for the first
/// completed-tick count whose hashes or events differ.
pub fn find_first_divergence<F>(setup_fn: F, script: &[Vec<Command>], num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 0..num_ticks {
        let commands = script_commands(script, tick);
        let first = sim1.run_batch(commands.clone());
        let second = sim2.run_batch(commands);

        if first.events() != second.events() || sim1.state_hash() != sim2.state_hash() {
            tracing::warn!(tick = sim1.current_tick(), "Simulations diverged");
            return Some(sim1.current_tick());
        }
    }

    None
}

/// Encode, decode, validate and rebuild the world; it must come back equal.
///
/// # Errors
///
/// Returns a description of the first step that failed.
pub fn verify_snapshot_roundtrip(sim: &Simulation) -> Result<(), String> {
    let bytes = sim.encode_snapshot().map_err(|e| e.to_string())?;
    let decoded = Snapshot::decode(&bytes).map_err(|e| e.to_string())?;
    decoded.validate(sim.content()).map_err(|e| e.to_string())?;
    let again = decoded.encode().map_err(|e| e.to_string())?;
    if again != bytes {
        return Err("re-encoding changed the bytes".into());
    }
    let world = decoded.into_world();
    if &world != sim.world() {
        return Err(format!("restored world differs at tick {}", world.tick));
    }
    if world.state_hash() != sim.state_hash() {
        return Err("restored world hashes differently".into());
    }
    Ok(())
}

/// Proptest strategies for command scripts.
///
/// Entity ids are drawn from a small range so scripts hit live entities,
/// stale ids and wrong kinds alike.
pub mod strategies {
    use proptest::prelude::*;
    use warden_core::command::{Action, Command};
    use warden_core::math::{TilePos, Vec2Fixed};

    use crate::fixtures::{
        BRONZE_PICK, COOKED_FISH, GRILLED_FISH, RAW_FISH, WHEAT_SEED,
    };

    /// Small entity id, including ids that never exist.
    pub fn arb_entity_id() -> impl Strategy<Value = u64> {
        0u64..24
    }

    /// Destination near the spawn point.
    pub fn arb_destination() -> impl Strategy<Value = Vec2Fixed> {
        (-6i32..6, -6i32..6).prop_map(|(x, y)| Vec2Fixed::from_ints(x, y))
    }

    /// Item id from the fixture content, plus one unknown id.
    pub fn arb_item() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(BRONZE_PICK.to_string()),
            Just(WHEAT_SEED.to_string()),
            Just(RAW_FISH.to_string()),
            Just(COOKED_FISH.to_string()),
            Just("no_such_item".to_string()),
        ]
    }

    /// Any gameplay action except joining and leaving.
    pub fn arb_action() -> impl Strategy<Value = Action> {
        prop_oneof![
            arb_destination().prop_map(|destination| Action::Move { destination }),
            arb_entity_id().prop_map(|target| Action::Attack { target }),
            arb_entity_id().prop_map(|node| Action::Mine { node }),
            (-2i32..3, -2i32..3).prop_map(|(x, y)| Action::Plant {
                seed: WHEAT_SEED.to_string(),
                tile: TilePos::new(x, y),
            }),
            arb_entity_id().prop_map(|crop| Action::Harvest { crop }),
            arb_entity_id().prop_map(|spot| Action::CastLine { spot }),
            Just(Action::ReelIn),
            arb_entity_id().prop_map(|station| Action::Cook {
                station,
                recipe: GRILLED_FISH.to_string(),
            }),
            (arb_entity_id(), arb_item(), 0u32..4).prop_map(|(vendor, item, quantity)| {
                Action::Buy {
                    vendor,
                    item,
                    quantity,
                }
            }),
            (arb_entity_id(), arb_item(), 0u32..4).prop_map(|(vendor, item, quantity)| {
                Action::Sell {
                    vendor,
                    item,
                    quantity,
                }
            }),
            arb_entity_id().prop_map(|item| Action::PickUp { item }),
            (0usize..4).prop_map(|slot| Action::Drop { slot }),
            (0usize..4).prop_map(|slot| Action::Use { slot }),
        ]
    }

    /// A tick's worth of commands from connections `1..=connections`.
    pub fn arb_tick_commands(connections: u64) -> impl Strategy<Value = Vec<Command>> {
        proptest::collection::vec((1..=connections, 0u64..6, arb_action()), 0..6).prop_map(
            |raw| {
                raw.into_iter()
                    .map(|(connection, seq, action)| Command::new(connection, seq, action))
                    .collect()
            },
        )
    }

    /// A script whose first tick joins every connection.
    ///
    /// Sequence numbers rise from tick to tick, as a client's would, but may
    /// repeat within a tick.
    pub fn arb_script(connections: u64, ticks: usize) -> impl Strategy<Value = Vec<Vec<Command>>> {
        proptest::collection::vec(arb_tick_commands(connections), ticks).prop_map(move |mut ticks| {
            for (offset, commands) in (1u64..).step_by(8).zip(ticks.iter_mut()) {
                for command in commands {
                    command.seq += offset;
                }
            }
            let joins = (1..=connections).map(|c| {
                Command::new(
                    c,
                    0,
                    Action::Join {
                        name: format!("player{c}"),
                    },
                )
            });
            if let Some(first) = ticks.first_mut() {
                first.splice(0..0, joins);
            }
            ticks
        })
    }
}
