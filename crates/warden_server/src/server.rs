//! The authority tick loop.
//!
//! One task owns the [`Simulation`]. Everything else talks to it through a
//! [`ServerHandle`]: commands go into the shared queue without waiting for
//! the tick, frames come back on a broadcast channel, and admin requests are
//! served between ticks so they never observe a half-run tick.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use warden_core::command::CommandSender;
use warden_core::content::ContentRegistry;
use warden_core::reset::{RestoreReport, StateResetManager};
use warden_core::scheduler::SystemHealth;
use warden_core::simulation::{Simulation, TickReport};
use warden_core::snapshot::SyncFrame;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::shutdown::ShutdownRx;
use crate::storage::{FileSnapshotStore, SnapshotStore};

const ADMIN_QUEUE: usize = 16;

/// Operator requests served between ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminRequest {
    /// Rebuild the world from content defaults.
    ResetToDefaults,
    /// Restore the newest checkpoint.
    RestoreLatest,
    /// Restore from encoded snapshot bytes.
    RestoreFrom(Vec<u8>),
    /// Report tick, population and system health.
    Status,
    /// Re-enable a disabled system by name.
    EnableSystem(String),
    /// Write a checkpoint now.
    Checkpoint,
    /// Encoded full snapshot, for resynchronizing a subscriber.
    FullSnapshot,
}

/// Answer to an [`AdminRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminReply {
    /// Outcome of a reset or restore.
    Restore(RestoreReport),
    /// Current status.
    Status(ServerStatus),
    /// Whether the named system exists.
    SystemEnabled(bool),
    /// Checkpoint written for this tick.
    Checkpointed(u64),
    /// Encoded full snapshot.
    Snapshot(Vec<u8>),
    /// The request could not be carried out.
    Failed(String),
}

/// Point-in-time server status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatus {
    /// Completed ticks.
    pub tick: u64,
    /// Entities in the world.
    pub entities: usize,
    /// Connections bound to a player.
    pub players_online: usize,
    /// Commands waiting for the next tick.
    pub pending_commands: usize,
    /// World state hash.
    pub state_hash: u64,
    /// Tick of the last checkpoint written by this process.
    pub last_checkpoint: Option<u64>,
    /// Per-system health.
    pub systems: Vec<SystemHealth>,
}

#[derive(Debug)]
struct AdminMessage {
    request: AdminRequest,
    reply: oneshot::Sender<AdminReply>,
}

/// Cloneable access to a running server.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    commands: CommandSender,
    admin: mpsc::Sender<AdminMessage>,
    frames: broadcast::Sender<Arc<SyncFrame>>,
}

impl ServerHandle {
    /// Producer for client commands.
    #[must_use]
    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    /// Receive every frame published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SyncFrame>> {
        self.frames.subscribe()
    }

    /// Send an admin request and wait for the reply.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ShutDown`] if the tick loop has stopped.
    pub async fn admin(&self, request: AdminRequest) -> Result<AdminReply> {
        let (reply, response) = oneshot::channel();
        self.admin
            .send(AdminMessage { request, reply })
            .await
            .map_err(|_| ServerError::ShutDown)?;
        response.await.map_err(|_| ServerError::ShutDown)
    }

    /// Current status.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ShutDown`] if the tick loop has stopped.
    pub async fn status(&self) -> Result<ServerStatus> {
        match self.admin(AdminRequest::Status).await? {
            AdminReply::Status(status) => Ok(status),
            _ => Err(ServerError::ShutDown),
        }
    }
}

/// Authority server owning the simulation and its checkpoint store.
pub struct Server {
    config: ServerConfig,
    sim: Simulation,
    store: Box<dyn SnapshotStore>,
    frames: broadcast::Sender<Arc<SyncFrame>>,
    admin_tx: mpsc::Sender<AdminMessage>,
    admin_rx: mpsc::Receiver<AdminMessage>,
    last_checkpoint: Option<u64>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("tick", &self.sim.current_tick())
            .field("last_checkpoint", &self.last_checkpoint)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Load content from disk, open the checkpoint directory and restore.
    ///
    /// # Errors
    ///
    /// Returns an error if the content file is unreadable or invalid, or the
    /// checkpoint directory cannot be created.
    pub fn boot(config: ServerConfig) -> Result<Self> {
        let content = load_content(&config)?;
        let store = FileSnapshotStore::open(&config.snapshot_dir, config.keep_snapshots)?;
        Ok(Self::with_parts(config, Arc::new(content), Box::new(store)))
    }

    /// Assemble a server from already loaded parts.
    ///
    /// With `restore_on_boot`, the newest checkpoint is restored; a bad
    /// checkpoint leaves the server on content defaults. Sessions in a
    /// restored checkpoint belonged to connections of the previous process,
    /// so they are released and their players wait to be rejoined by name.
    #[must_use]
    pub fn with_parts(
        config: ServerConfig,
        content: Arc<ContentRegistry>,
        store: Box<dyn SnapshotStore>,
    ) -> Self {
        let mut sim = Simulation::new(content, config.sim.clone());
        if config.restore_on_boot {
            match store.load_latest() {
                Ok(Some((tick, bytes))) => {
                    let report = StateResetManager::restore_from(&mut sim, &bytes);
                    if report.succeeded() {
                        let released = sim.release_sessions();
                        info!(tick, released, "Restored checkpoint");
                    } else {
                        warn!(tick, ?report, "Checkpoint unusable, starting from defaults");
                    }
                }
                Ok(None) => info!("No checkpoint found, starting from defaults"),
                Err(e) => warn!("Failed to read checkpoints, starting from defaults: {e}"),
            }
        }

        let (frames, _) = broadcast::channel(config.frame_capacity.max(1));
        let (admin_tx, admin_rx) = mpsc::channel(ADMIN_QUEUE);
        Self {
            config,
            sim,
            store,
            frames,
            admin_tx,
            admin_rx,
            last_checkpoint: None,
        }
    }

    /// Handle for submitting commands, subscribing and admin requests.
    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            commands: self.sim.command_sender(),
            admin: self.admin_tx.clone(),
            frames: self.frames.clone(),
        }
    }

    /// The simulation.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run one tick, publish its frame and checkpoint when due.
    pub fn step(&mut self) -> TickReport {
        let report = self.sim.tick();
        // No subscribers is not an error.
        let _ = self.frames.send(Arc::new(report.frame.clone()));

        let interval = self.config.checkpoint_interval;
        if interval > 0 && report.frame.tick % interval == 0 {
            if let Err(e) = self.checkpoint() {
                error!(tick = report.frame.tick, "Checkpoint failed: {e}");
            }
        }
        report
    }

    /// Write a checkpoint of the current world.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn checkpoint(&mut self) -> Result<u64> {
        let tick = self.sim.current_tick();
        let bytes = self.sim.encode_snapshot()?;
        self.store.save(tick, &bytes)?;
        self.last_checkpoint = Some(tick);
        Ok(tick)
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ServerStatus {
        let world = self.sim.world();
        ServerStatus {
            tick: world.tick,
            entities: world.store.len(),
            players_online: world.sessions.len(),
            pending_commands: self.sim.pending_commands(),
            state_hash: self.sim.state_hash(),
            last_checkpoint: self.last_checkpoint,
            systems: self.sim.system_health(),
        }
    }

    /// Serve one admin request.
    pub fn handle_admin(&mut self, request: AdminRequest) -> AdminReply {
        match request {
            AdminRequest::ResetToDefaults => {
                AdminReply::Restore(StateResetManager::reset_to_defaults(&mut self.sim))
            }
            AdminRequest::RestoreLatest => match self.store.load_latest() {
                Ok(Some((_, bytes))) => {
                    AdminReply::Restore(StateResetManager::restore_from(&mut self.sim, &bytes))
                }
                Ok(None) => AdminReply::Failed("no checkpoint available".into()),
                Err(e) => AdminReply::Failed(e.to_string()),
            },
            AdminRequest::RestoreFrom(bytes) => {
                AdminReply::Restore(StateResetManager::restore_from(&mut self.sim, &bytes))
            }
            AdminRequest::Status => AdminReply::Status(self.status()),
            AdminRequest::EnableSystem(name) => {
                AdminReply::SystemEnabled(self.sim.enable_system(&name))
            }
            AdminRequest::Checkpoint => match self.checkpoint() {
                Ok(tick) => AdminReply::Checkpointed(tick),
                Err(e) => AdminReply::Failed(e.to_string()),
            },
            AdminRequest::FullSnapshot => match self.sim.encode_snapshot() {
                Ok(bytes) => AdminReply::Snapshot(bytes),
                Err(e) => AdminReply::Failed(e.to_string()),
            },
        }
    }

    /// Tick at the configured rate until shutdown, then write a final
    /// checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the final checkpoint fails.
    pub async fn run(mut self, mut shutdown: ShutdownRx) -> Result<()> {
        let period = Duration::from_millis(self.config.sim.tick_duration_ms().max(1));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            tick = self.sim.current_tick(),
            rate = self.config.tick_rate(),
            "Tick loop running"
        );

        loop {
            tokio::select! {
                biased;
                () = shutdown.wait() => break,
                Some(message) = self.admin_rx.recv() => {
                    debug!(request = ?message.request, "Admin request");
                    let reply = self.handle_admin(message.request);
                    let _ = message.reply.send(reply);
                }
                _ = ticker.tick() => {
                    self.step();
                }
            }
        }

        let tick = self.checkpoint()?;
        info!(tick, "Tick loop stopped");
        Ok(())
    }
}

/// Read and validate the content file named in the config.
///
/// # Errors
///
/// Returns an error if the file is unreadable or the content is invalid.
pub fn load_content(config: &ServerConfig) -> Result<ContentRegistry> {
    let path = &config.content_path;
    let text = fs::read_to_string(path).map_err(|e| ServerError::io(path, e))?;
    let content = ContentRegistry::from_ron_str(&path.display().to_string(), &text)?;
    info!("Loaded content: {}", content.summary());
    Ok(content)
}
