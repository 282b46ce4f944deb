//! Client intents and the per-tick command queue.
//!
//! Any number of producers push commands through cloned [`CommandSender`]
//! handles. Once per tick the scheduler freezes the queue, which drains the
//! buffer into an immutable [`CommandBatch`]. Commands arriving after the
//! freeze land in the next tick's batch.
//!
//! Freezing resolves conflicts deterministically:
//! - A repeated `(connection, seq)` pair is the same command object and is
//!   rejected as [`RejectReason::Duplicate`]. So is any `seq` at or below the
//!   connection's last accepted one, which catches resubmission in a later
//!   tick.
//! - Movement and attack target are action slots: the last command per
//!   connection per slot wins, earlier ones are [`RejectReason::Superseded`].
//! - Everything else keeps ingress order, so the first enqueued of two
//!   conflicting commands is the one that succeeds.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::{DefId, ItemId};
use crate::entity::{ConnectionId, EntityId};
use crate::math::{TilePos, Vec2Fixed};

/// What a client wants to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Take control of (or create) the named player.
    Join {
        /// Player name.
        name: String,
    },
    /// Release the controlled player.
    Leave,
    /// Walk toward a point.
    Move {
        /// Destination.
        destination: Vec2Fixed,
    },
    /// Attack a mob or player.
    Attack {
        /// Target entity.
        target: EntityId,
    },
    /// Swing at a resource node.
    Mine {
        /// Node entity.
        node: EntityId,
    },
    /// Plant a seed on a tile.
    Plant {
        /// Seed item.
        seed: ItemId,
        /// Tile.
        tile: TilePos,
    },
    /// Harvest a mature crop.
    Harvest {
        /// Crop entity.
        crop: EntityId,
    },
    /// Cast a fishing line at a spot.
    CastLine {
        /// Fishing spot structure.
        spot: EntityId,
    },
    /// Reel in the active line.
    ReelIn,
    /// Cook a recipe at a station.
    Cook {
        /// Cooking fire structure.
        station: EntityId,
        /// Recipe.
        recipe: DefId,
    },
    /// Sell items to a vendor.
    Sell {
        /// Vendor structure.
        vendor: EntityId,
        /// Item.
        item: ItemId,
        /// Quantity.
        quantity: u32,
    },
    /// Buy items from a vendor.
    Buy {
        /// Vendor structure.
        vendor: EntityId,
        /// Item.
        item: ItemId,
        /// Quantity.
        quantity: u32,
    },
    /// Pick up a dropped item.
    PickUp {
        /// Dropped item entity.
        item: EntityId,
    },
    /// Drop the stack in an inventory slot.
    Drop {
        /// Slot index.
        slot: usize,
    },
    /// Consume one item from an inventory slot.
    Use {
        /// Slot index.
        slot: usize,
    },
}

/// Gameplay domain owning a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Domain {
    /// Join and leave.
    Session,
    /// Locomotion.
    Movement,
    /// Resource nodes.
    Mining,
    /// Crops.
    Farming,
    /// Fishing lines.
    Fishing,
    /// Recipes.
    Cooking,
    /// Buying and selling.
    Vendor,
    /// Attacks.
    Combat,
    /// Pickup, drop and use.
    Inventory,
}

/// Per-connection slot where only the latest intent in a tick counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionSlot {
    /// Movement destination.
    Movement,
    /// Attack target.
    Target,
}

impl Action {
    /// Domain whose system handles this action.
    #[must_use]
    pub const fn domain(&self) -> Domain {
        match self {
            Self::Join { .. } | Self::Leave => Domain::Session,
            Self::Move { .. } => Domain::Movement,
            Self::Attack { .. } => Domain::Combat,
            Self::Mine { .. } => Domain::Mining,
            Self::Plant { .. } | Self::Harvest { .. } => Domain::Farming,
            Self::CastLine { .. } | Self::ReelIn => Domain::Fishing,
            Self::Cook { .. } => Domain::Cooking,
            Self::Sell { .. } | Self::Buy { .. } => Domain::Vendor,
            Self::PickUp { .. } | Self::Drop { .. } | Self::Use { .. } => Domain::Inventory,
        }
    }

    /// Action slot, for intents where the last one per tick wins.
    #[must_use]
    pub const fn slot(&self) -> Option<ActionSlot> {
        match self {
            Self::Move { .. } => Some(ActionSlot::Movement),
            Self::Attack { .. } => Some(ActionSlot::Target),
            _ => None,
        }
    }
}

/// A client intent bound to its connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Issuing connection.
    pub connection: ConnectionId,
    /// Client-assigned sequence number identifying this command.
    pub seq: u64,
    /// Client's idea of the current tick; advisory only.
    pub client_tick: Option<u64>,
    /// Requested action.
    pub action: Action,
}

impl Command {
    /// Build a command without a client tick stamp.
    #[must_use]
    pub fn new(connection: ConnectionId, seq: u64, action: Action) -> Self {
        Self {
            connection,
            seq,
            client_tick: None,
            action,
        }
    }
}

/// Highest accepted `seq` per bound connection.
pub type SeqMarks = BTreeMap<ConnectionId, u64>;

/// Why a command had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum RejectReason {
    /// The connection has no player.
    #[error("connection has not joined")]
    NotJoined,
    /// The connection already controls a player.
    #[error("connection already joined")]
    AlreadyJoined,
    /// The named player is controlled by another connection.
    #[error("player is controlled by another connection")]
    NameTaken,
    /// The referenced entity no longer exists.
    #[error("target no longer exists")]
    StaleTarget,
    /// The referenced entity is the wrong kind.
    #[error("target is the wrong kind")]
    WrongTargetKind,
    /// The target is too far away.
    #[error("target out of range")]
    OutOfRange,
    /// The action's cooldown has not elapsed.
    #[error("action on cooldown")]
    OnCooldown,
    /// Not enough stamina for the action.
    #[error("not enough stamina")]
    Exhausted,
    /// The resource node has no charges left.
    #[error("resource depleted")]
    Depleted,
    /// No carried tool has a high enough tier.
    #[error("tool tier too low")]
    InsufficientTool,
    /// Required items are missing.
    #[error("missing required items")]
    MissingItems,
    /// No room in the inventory.
    #[error("inventory full")]
    InventoryFull,
    /// The crop is not ready to harvest.
    #[error("crop not mature")]
    NotMature,
    /// Another crop already occupies the tile.
    #[error("tile occupied")]
    TileOccupied,
    /// No line is cast, or one already is.
    #[error("fishing line state does not allow this")]
    LineState,
    /// Not enough gold.
    #[error("not enough gold")]
    InsufficientGold,
    /// The vendor does not sell or buy this item.
    #[error("vendor does not trade this item")]
    NotStocked,
    /// The item cannot be used this way.
    #[error("item cannot be used")]
    NotUsable,
    /// The owning system is disabled after repeated faults.
    #[error("system disabled")]
    SystemDisabled,
    /// The same command object was already submitted.
    #[error("duplicate command")]
    Duplicate,
    /// A later command for the same action slot replaced this one.
    #[error("superseded by a later command")]
    Superseded,
    /// Quantity was zero.
    #[error("invalid quantity")]
    InvalidQuantity,
    /// The acting player is dead.
    #[error("player is dead")]
    Dead,
    /// The command names content that does not exist.
    #[error("unknown content id")]
    UnknownContent,
    /// The owning system faulted before handling the command.
    #[error("system fault")]
    Faulted,
}

/// A command that produced no effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Issuing connection.
    pub connection: ConnectionId,
    /// Sequence number of the rejected command.
    pub seq: u64,
    /// Reason.
    pub reason: RejectReason,
}

impl Rejection {
    /// Rejection for `command`.
    #[must_use]
    pub fn of(command: &Command, reason: RejectReason) -> Self {
        Self {
            connection: command.connection,
            seq: command.seq,
            reason,
        }
    }
}

/// Immutable commands for one tick, after conflict resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBatch {
    tick: u64,
    commands: Vec<Command>,
    #[serde(skip)]
    rejections: Vec<Rejection>,
    #[serde(skip)]
    accepted: SeqMarks,
}

impl CommandBatch {
    /// Resolve raw commands in ingress order into a batch for `tick`.
    ///
    /// `marks` holds each connection's highest previously accepted `seq`.
    #[must_use]
    pub fn from_commands(tick: u64, raw: Vec<Command>, marks: &SeqMarks) -> Self {
        let mut rejections = Vec::new();
        let mut seen = BTreeSet::new();
        let mut unique = Vec::with_capacity(raw.len());
        for command in raw {
            let replayed = marks
                .get(&command.connection)
                .is_some_and(|mark| command.seq <= *mark);
            if !replayed && seen.insert((command.connection, command.seq)) {
                unique.push(command);
            } else {
                rejections.push(Rejection::of(&command, RejectReason::Duplicate));
            }
        }

        // Last writer wins per (connection, slot).
        let mut last_in_slot: BTreeMap<(ConnectionId, ActionSlot), usize> = BTreeMap::new();
        for (index, command) in unique.iter().enumerate() {
            if let Some(slot) = command.action.slot() {
                last_in_slot.insert((command.connection, slot), index);
            }
        }

        let mut commands = Vec::with_capacity(unique.len());
        for (index, command) in unique.into_iter().enumerate() {
            let superseded = command.action.slot().is_some_and(|slot| {
                last_in_slot.get(&(command.connection, slot)) != Some(&index)
            });
            if superseded {
                rejections.push(Rejection::of(&command, RejectReason::Superseded));
            } else {
                commands.push(command);
            }
        }

        let mut accepted = SeqMarks::new();
        for command in &commands {
            let mark = accepted.entry(command.connection).or_insert(command.seq);
            *mark = (*mark).max(command.seq);
        }

        Self {
            tick,
            commands,
            rejections,
            accepted,
        }
    }

    /// Tick this batch belongs to.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Surviving commands in ingress order.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Surviving commands owned by `domain`, in ingress order.
    pub fn for_domain(&self, domain: Domain) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .filter(move |c| c.action.domain() == domain)
    }

    /// Commands dropped during resolution.
    #[must_use]
    pub fn rejections(&self) -> &[Rejection] {
        &self.rejections
    }

    /// Highest surviving `seq` per connection in this batch.
    #[must_use]
    pub fn accepted_seqs(&self) -> &SeqMarks {
        &self.accepted
    }

    /// Number of surviving commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True when no command survived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

type Pending = Arc<Mutex<Vec<Command>>>;

/// Locks the buffer; a producer that panicked mid-push cannot corrupt a `Vec`.
fn lock(pending: &Pending) -> std::sync::MutexGuard<'_, Vec<Command>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Producer handle; cheap to clone and safe to share across threads.
#[derive(Debug, Clone)]
pub struct CommandSender {
    pending: Pending,
}

impl CommandSender {
    /// Enqueue a command for the next freeze. Never blocks on the tick.
    pub fn submit(
        &self,
        connection: ConnectionId,
        seq: u64,
        action: Action,
        client_tick: Option<u64>,
    ) {
        self.push(Command {
            connection,
            seq,
            client_tick,
            action,
        });
    }

    /// Enqueue a prebuilt command.
    pub fn push(&self, command: Command) {
        lock(&self.pending).push(command);
    }
}

/// Buffer between concurrent producers and the tick path.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    pending: Pending,
}

impl CommandQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// New producer handle.
    #[must_use]
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            pending: Arc::clone(&self.pending),
        }
    }

    /// Enqueue directly.
    pub fn push(&self, command: Command) {
        lock(&self.pending).push(command);
    }

    /// Commands waiting for the next freeze.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Drain everything received so far into the batch for `tick`.
    #[must_use]
    pub fn freeze(&self, tick: u64, marks: &SeqMarks) -> CommandBatch {
        let raw = std::mem::take(&mut *lock(&self.pending));
        CommandBatch::from_commands(tick, raw, marks)
    }

    /// Discard all pending commands, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut pending = lock(&self.pending);
        let dropped = pending.len();
        pending.clear();
        dropped
    }
}
