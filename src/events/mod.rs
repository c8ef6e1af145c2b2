//! Event Bus Module
//!
//! In-process publish point for state-change events. Delivery is
//! best-effort: publishing with no subscribers is not an error, slow
//! subscribers may observe lag, and nothing is replayed. Events for a single
//! guild arrive in publication order because publication happens on a single
//! control flow; there is no ordering guarantee across guilds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

// == Realtime Event ==
/// A state-change notification relayed to dashboard clients.
///
/// Immutable once published; constructed, relayed, and discarded. Never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeEvent {
    /// Namespaced type, e.g. `"giveaway:ended"` or `"guild:stats"`
    #[serde(rename = "type")]
    pub event_type: String,
    /// The guild whose room receives this event
    pub guild_id: String,
    /// Opaque structured payload
    #[serde(rename = "data")]
    pub payload: serde_json::Value,
    /// Publication time (ISO 8601 on the wire)
    pub timestamp: DateTime<Utc>,
}

impl RealtimeEvent {
    /// Creates an event stamped with the current time.
    pub fn now(
        event_type: impl Into<String>,
        guild_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            guild_id: guild_id.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

// == Event Bus ==
/// Broadcast-backed publish point. Cheap to clone; clones publish into the
/// same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RealtimeEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` undelivered events per
    /// subscriber before lag kicks in.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event to all current subscribers, best-effort.
    pub fn publish(&self, event: RealtimeEvent) {
        debug!(
            event_type = %event.event_type,
            guild_id = %event.guild_id,
            "publishing event"
        );
        // No subscribers just means nobody is listening yet.
        let _ = self.tx.send(event);
    }

    /// Opens a subscription receiving events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
