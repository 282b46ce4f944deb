//! # Warden Core
//!
//! Authoritative tick simulation for a shared multiplayer world.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO (content and snapshots arrive as strings/bytes)
//! - No system randomness (the world carries a seeded RNG)
//! - No floating-point math (positions use fixed-point)
//!
//! This separation enables:
//! - Headless authority servers
//! - Crash recovery from snapshots
//! - Replay of recorded command logs
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`store`] - Authoritative entity table
//! - [`command`] - Client intents and the per-tick command queue
//! - [`systems`] - Domain systems run once per tick
//! - [`scheduler`] - Ordered pipeline with fault containment
//! - [`snapshot`] - Full and delta serialization
//! - [`reset`] - Default and snapshot-based world restoration
//! - [`simulation`] - Facade owning all of the above

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod command;
pub mod config;
pub mod content;
pub mod entity;
pub mod error;
pub mod event;
pub mod inventory;
pub mod math;
pub mod replay;
pub mod reset;
pub mod rng;
pub mod scheduler;
pub mod simulation;
pub mod snapshot;
pub mod store;
pub mod systems;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::command::{
        Action, Command, CommandBatch, CommandQueue, CommandSender, Domain, RejectReason,
        Rejection,
    };
    pub use crate::config::SimConfig;
    pub use crate::content::{ContentFile, ContentRegistry, ItemId};
    pub use crate::entity::{ConnectionId, Entity, EntityId, EntityKind, Payload};
    pub use crate::error::{CoreError, Result, SnapshotError, SystemFault};
    pub use crate::event::Event;
    pub use crate::inventory::{Inventory, ItemStack};
    pub use crate::math::{Fixed, TilePos, Vec2Fixed};
    pub use crate::reset::{RestoreReport, StateResetManager};
    pub use crate::scheduler::{SystemHealth, SystemStatus, TickScheduler};
    pub use crate::simulation::{Simulation, TickReport};
    pub use crate::snapshot::{DeltaPayload, Snapshot, SnapshotManager, SyncFrame};
    pub use crate::world::WorldState;
}
