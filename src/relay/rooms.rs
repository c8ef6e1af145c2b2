//! Room Registry
//!
//! Tracks live relay connections and their guild-room membership. A
//! connection joins a room only through a validated join request; delivery
//! to a room never reaches connections outside it. Removal cleans up every
//! room the connection was in, so rooms never hold dead ids.

use std::fmt;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::relay::wire::Frame;

/// Outbound frame queue for one connection.
pub type FrameSender = mpsc::UnboundedSender<Frame>;

// == Room Registry ==
pub struct RoomRegistry {
    /// Active connections mapped by connection id
    connections: DashMap<Uuid, FrameSender>,
    /// Guild id to member connection ids
    rooms: DashMap<String, Vec<Uuid>>,
}

impl fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("connection_count", &self.connections.len())
            .field("room_count", &self.rooms.len())
            .finish()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    /// Registers a new connection. It belongs to no room until it joins.
    pub fn add_connection(&self, conn_id: Uuid, sender: FrameSender) {
        self.connections.insert(conn_id, sender);
        debug!(%conn_id, total = self.connections.len(), "connection registered");
    }

    /// Removes a connection and scrubs it from every room.
    pub fn remove_connection(&self, conn_id: Uuid) {
        self.connections.remove(&conn_id);

        for mut room in self.rooms.iter_mut() {
            room.value_mut().retain(|id| id != &conn_id);
        }
        self.rooms.retain(|_, members| !members.is_empty());

        debug!(%conn_id, total = self.connections.len(), "connection removed");
    }

    /// Adds a connection to a guild room. Joining twice is a no-op.
    pub fn join(&self, guild_id: &str, conn_id: Uuid) {
        let mut members = self.rooms.entry(guild_id.to_string()).or_default();
        if !members.contains(&conn_id) {
            members.push(conn_id);
        }
        debug!(%conn_id, %guild_id, members = members.len(), "joined room");
    }

    /// Delivers a frame to every member of one guild room. Members whose
    /// queue is gone are dropped from the registry on the spot.
    pub fn deliver(&self, guild_id: &str, frame: &Frame) {
        let members: Vec<Uuid> = self
            .rooms
            .get(guild_id)
            .map(|room| room.clone())
            .unwrap_or_default();

        for conn_id in members {
            let Some(sender) = self.connections.get(&conn_id).map(|s| s.clone()) else {
                continue;
            };
            if sender.send(frame.clone()).is_err() {
                warn!(%conn_id, %guild_id, "outbound queue closed, dropping connection");
                drop(sender);
                self.remove_connection(conn_id);
            }
        }
    }

    /// Number of live members in a guild room.
    pub fn subscriber_count(&self, guild_id: &str) -> usize {
        self.rooms.get(guild_id).map(|room| room.len()).unwrap_or(0)
    }

    /// Whether anyone is listening to a guild room at all.
    pub fn has_subscribers(&self, guild_id: &str) -> bool {
        self.subscriber_count(guild_id) > 0
    }

    /// Total live connections, joined or not.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
