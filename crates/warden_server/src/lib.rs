//! # Warden Authority Server
//!
//! Hosts the authoritative simulation:
//! - Drives ticks at the configured rate
//! - Broadcasts one sync frame per tick to subscribers
//! - Checkpoints snapshots to disk and restores them on boot
//! - Serves admin requests (reset, restore, status, re-enable systems)
//!
//! Transport is out of scope; connections submit through a
//! [`warden_core::command::CommandSender`] obtained from the handle.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod config;
pub mod error;
pub mod server;
pub mod shutdown;
pub mod storage;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::{AdminReply, AdminRequest, Server, ServerHandle, ServerStatus};
pub use storage::{CheckpointFile, FileSnapshotStore, SnapshotStore};
