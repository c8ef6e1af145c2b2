//! Warden - entity lifecycle scheduler and real-time event relay
//!
//! Core services for a community management bot: a bounded TTL cache with
//! fetch coalescing, periodic expiry scheduling over pluggable domain
//! managers, typed interaction routing, and a two-hop websocket relay that
//! carries state-change events from the bot process to dashboard browsers.

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod relay;
pub mod router;
pub mod scheduler;

pub use cache::EntityCache;
pub use config::Config;
pub use domain::{DomainManager, EntityKind, ManagerRef};
pub use error::{CoreError, Result};
pub use events::{EventBus, RealtimeEvent};
pub use router::InteractionRouter;
pub use scheduler::ExpiryScheduler;
