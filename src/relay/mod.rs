//! Relay Module
//!
//! Moves [`RealtimeEvent`](crate::events::RealtimeEvent)s out of the bot
//! process and into browsers, in two hops: the bot-side relay server fans
//! the event bus out to guild rooms; the dashboard-side bridge subscribes
//! to one guild over a single outbound websocket and re-delivers into its
//! own local rooms for browser clients. Delivery is best-effort end to end.

mod backoff;
mod bridge;
mod rooms;
mod server;
mod wire;

pub use backoff::Backoff;
pub use bridge::Bridge;
pub use rooms::{FrameSender, RoomRegistry};
pub use server::{create_router, spawn_fanout, GuildFilter, RelayState};
pub use wire::Frame;
