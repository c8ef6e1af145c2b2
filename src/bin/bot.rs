//! Warden Bot - scheduler, event bus, and bot-side relay server
//!
//! Owns the domain managers, runs the periodic expiry scheduler, and fans
//! published events out to relay rooms over the bot-side websocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warden::cache::EntityCache;
use warden::config::Config;
use warden::domain::{EntityKind, EntityStore, ManagerRef, MemoryStore, StoreBackedManager};
use warden::events::EventBus;
use warden::relay::{create_router, spawn_fanout, GuildFilter, RelayState, RoomRegistry};
use warden::scheduler::{ExpiryScheduler, SchedulerConfig};

/// Main entry point for the bot process.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Construct store, managers, cache, bus, and rooms
/// 4. Start the expiry scheduler and the event fan-out task
/// 5. Serve the relay router on the configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warden=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Warden bot process");

    let config = Config::from_env();
    info!(
        "Configuration loaded: relay_port={}, guilds={}, scan_interval={}s, batch_limit={}",
        config.relay_port,
        config.guild_ids.len(),
        config.scan_interval_secs,
        config.scan_batch_limit
    );
    if config.guild_ids.is_empty() {
        warn!("GUILD_IDS is empty; the scheduler has no guilds to scan");
    }

    // Shared infrastructure
    let bus = EventBus::new(config.event_buffer);
    let rooms = Arc::new(RoomRegistry::new());
    let cache = EntityCache::new(config.cache_max_entries);

    // Domain managers, one per entity kind, over a shared store
    let store: Arc<dyn EntityStore> = Arc::new(MemoryStore::new());
    let managers: Vec<ManagerRef> = [
        EntityKind::Poll,
        EntityKind::Giveaway,
        EntityKind::Quarantine,
        EntityKind::Ticket,
        EntityKind::Voice,
    ]
    .into_iter()
    .map(|kind| {
        Arc::new(
            StoreBackedManager::new(kind, store.clone(), bus.clone())
                .with_candidate_cache(cache.clone()),
        ) as ManagerRef
    })
    .collect();

    // The gateway adapter in the command layer builds its
    // InteractionRouter from these same managers.

    // Periodic tasks
    let mut scheduler = ExpiryScheduler::new(
        managers,
        cache,
        bus.clone(),
        rooms.clone(),
        SchedulerConfig::from(&config),
    );
    scheduler.start(config.guild_ids.clone());

    // Relay server: the bridge hop is trusted, joins follow the guild list
    let fanout = spawn_fanout(&bus, rooms.clone());
    let filter = GuildFilter::from_allow_list(config.guild_ids.clone());
    let app = create_router(RelayState::new(rooms, filter));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.relay_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind relay port {}", config.relay_port))?;
    info!("Relay server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(scheduler, fanout))
        .await
        .context("relay server exited with an error")?;

    info!("Bot shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, stops the scheduler and the fan-out task; bodies
/// already in flight run to completion.
async fn shutdown_signal(mut scheduler: ExpiryScheduler, fanout: JoinHandle<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    scheduler.stop();
    fanout.abort();
    warn!("Background tasks stopped");

    // Give in-flight cycle bodies a moment before the server drops
    tokio::time::sleep(Duration::from_millis(100)).await;
}
