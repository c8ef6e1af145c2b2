//! Domain Model Module
//!
//! Entity kinds, lifecycle states, and the `DomainManager` seam the
//! scheduler and router drive. Managers own their entities; the scheduler
//! only observes and triggers finalization.

mod manager;
mod store;

pub use manager::StoreBackedManager;
pub use store::{EntityStore, MemoryStore};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::router::{Action, Interaction};

// == Entity Kind ==
/// The kinds of managed entities. The first three are time-boxed and
/// scanned by the expiry scheduler; tickets and voice channels are
/// interaction-driven only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Poll,
    Giveaway,
    Quarantine,
    Ticket,
    Voice,
}

impl EntityKind {
    /// Kinds the expiry scheduler scans for.
    pub fn is_expirable(self) -> bool {
        matches!(self, Self::Poll | Self::Giveaway | Self::Quarantine)
    }

    /// The stable prefix used in custom ids and event type names.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Poll => "poll",
            Self::Giveaway => "giveaway",
            Self::Quarantine => "quarantine",
            Self::Ticket => "ticket",
            Self::Voice => "voice",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for EntityKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "poll" => Ok(Self::Poll),
            "giveaway" => Ok(Self::Giveaway),
            "quarantine" => Ok(Self::Quarantine),
            "ticket" => Ok(Self::Ticket),
            "voice" => Ok(Self::Voice),
            _ => Err(()),
        }
    }
}

// == Entity Status ==
/// Lifecycle state of an expirable entity. Transitions out of `Active`
/// happen exactly once, enforced by the storage layer's conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Active,
    Ended,
    Cancelled,
}

// == Expirable Entity ==
/// A time-boxed entity owned by a domain manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirableEntity {
    /// Opaque identifier, unique per kind and guild
    pub id: String,
    /// Owning guild
    pub guild_id: String,
    /// Which manager owns this entity
    pub kind: EntityKind,
    /// When the entity stops being active
    pub ends_at: DateTime<Utc>,
    /// Current lifecycle state
    pub status: EntityStatus,
}

impl ExpirableEntity {
    /// True when the entity is active and its deadline has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == EntityStatus::Active && self.ends_at <= now
    }
}

// == Final State ==
/// Outcome of a finalize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalState {
    /// The entity transitioned from active to ended
    Ended,
    /// The entity transitioned from active to cancelled
    Cancelled,
    /// The entity was already finalized; nothing happened (not an error)
    AlreadyFinal,
}

// == Domain Manager ==
/// One manager per entity kind. `finalize` is idempotent: it performs a
/// conditional update guarded by the active status and reports
/// [`FinalState::AlreadyFinal`] when zero rows were affected, so overlapping
/// scan cycles or restarts can never finalize an entity twice.
#[async_trait]
pub trait DomainManager: Send + Sync {
    /// The kind this manager owns.
    fn kind(&self) -> EntityKind;

    /// Active entities in `guild_id` whose deadline is at or before `now`.
    async fn expiring(&self, guild_id: &str, now: DateTime<Utc>) -> Result<Vec<ExpirableEntity>>;

    /// Transitions the entity out of the active state, exactly once.
    async fn finalize(&self, id: &str) -> Result<FinalState>;

    /// Number of active entities in the guild, for stats refresh.
    async fn active_count(&self, guild_id: &str) -> Result<u64>;

    /// Handles a routed UI interaction. Errors are contained by the router.
    async fn handle_interaction(
        &self,
        action: &Action,
        interaction: &mut dyn Interaction,
    ) -> Result<()>;
}

/// Shared handle to a domain manager.
pub type ManagerRef = Arc<dyn DomainManager>;
