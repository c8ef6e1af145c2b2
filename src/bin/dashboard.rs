//! Warden Dashboard - bridge client and browser-facing relay server
//!
//! Connects outbound to the bot relay, mirrors the target guild's events
//! into local rooms, and serves them to browser clients over a websocket
//! endpoint pinned to that one guild.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warden::config::Config;
use warden::relay::{create_router, Backoff, Bridge, GuildFilter, RelayState, RoomRegistry};

/// Main entry point for the dashboard process.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Start the bridge connection to the bot relay
/// 4. Serve the browser-facing relay router on the configured port
/// 5. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warden=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Warden dashboard process");

    let config = Config::from_env();
    info!(
        "Configuration loaded: dashboard_port={}, bot_relay_url={}, target_guild={}",
        config.dashboard_port, config.bot_relay_url, config.target_guild_id
    );
    if config.target_guild_id.is_empty() {
        warn!("TARGET_GUILD_ID is empty; the bridge will join an empty room");
    }

    let rooms = Arc::new(RoomRegistry::new());

    // Bridge to the bot relay; reconnects forever with capped backoff
    let backoff = Backoff::new(
        Duration::from_millis(config.backoff_base_ms),
        Duration::from_millis(config.backoff_max_ms),
    );
    let bridge = Bridge::spawn(
        config.bot_relay_url.clone(),
        config.target_guild_id.clone(),
        rooms.clone(),
        backoff,
    );

    // Browser-facing relay, pinned to the single target guild
    let filter = GuildFilter::One(config.target_guild_id.clone());
    let app = create_router(RelayState::new(rooms, filter));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.dashboard_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind dashboard port {}", config.dashboard_port))?;
    info!("Dashboard relay listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(bridge))
        .await
        .context("dashboard relay exited with an error")?;

    info!("Dashboard shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the bridge.
async fn shutdown_signal(bridge: Bridge) {
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

    bridge.stop();
    warn!("Bridge stopped");
}
