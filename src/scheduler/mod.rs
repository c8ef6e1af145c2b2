//! Expiry Scheduler Module
//!
//! Owns the periodic background work of the bot process: scanning for
//! expired entities across guilds, refreshing per-guild stats for connected
//! dashboards, and sweeping the entity cache. Each task runs on its own
//! interval behind an overlap guard; a failure anywhere degrades the cycle
//! (skip the item, skip the guild) and never crashes the process.

mod task;

pub use task::ScheduledTask;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::cache::EntityCache;
use crate::config::Config;
use crate::domain::{EntityKind, ExpirableEntity, FinalState, ManagerRef};
use crate::events::{EventBus, RealtimeEvent};
use crate::relay::RoomRegistry;

// == Scheduler Config ==
/// Intervals and limits for the periodic tasks.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Expiry scan interval (short)
    pub scan_interval: Duration,
    /// Stats refresh interval (medium)
    pub stats_interval: Duration,
    /// Cache sweep interval (long)
    pub cleanup_interval: Duration,
    /// Maximum finalize calls per scan cycle across all guilds
    pub batch_limit: usize,
    /// TTL for cached candidate reads
    pub cache_ttl: Duration,
}

impl From<&Config> for SchedulerConfig {
    fn from(config: &Config) -> Self {
        Self {
            scan_interval: Duration::from_secs(config.scan_interval_secs),
            stats_interval: Duration::from_secs(config.stats_interval_secs),
            cleanup_interval: Duration::from_secs(config.cleanup_interval_secs),
            batch_limit: config.scan_batch_limit,
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
        }
    }
}

/// Cache of candidate reads, shared with interactive handlers.
pub type CandidateCache = EntityCache<Vec<ExpirableEntity>>;

/// Cache key for one guild's expiring candidates of one kind. Shared with
/// the managers so interactive cancels can invalidate the scan's view.
pub fn candidate_key(guild_id: &str, kind: EntityKind) -> String {
    format!("expiring:{}:{}", guild_id, kind)
}

struct SchedulerCtx {
    managers: Vec<ManagerRef>,
    cache: CandidateCache,
    bus: EventBus,
    rooms: Arc<RoomRegistry>,
    cfg: SchedulerConfig,
    guild_ids: Vec<String>,
}

// == Expiry Scheduler ==
/// Drives the three periodic tasks. The scheduler only observes entities
/// and triggers finalization; it never creates or deletes them.
pub struct ExpiryScheduler {
    managers: Vec<ManagerRef>,
    cache: CandidateCache,
    bus: EventBus,
    rooms: Arc<RoomRegistry>,
    cfg: SchedulerConfig,
    tasks: Vec<ScheduledTask>,
}

impl ExpiryScheduler {
    pub fn new(
        managers: Vec<ManagerRef>,
        cache: CandidateCache,
        bus: EventBus,
        rooms: Arc<RoomRegistry>,
        cfg: SchedulerConfig,
    ) -> Self {
        Self {
            managers,
            cache,
            bus,
            rooms,
            cfg,
            tasks: Vec::new(),
        }
    }

    // == Start ==
    /// Spawns the expiry scan, stats refresh, and cleanup tasks over the
    /// given guilds. Calling start twice replaces the previous tasks.
    pub fn start(&mut self, guild_ids: Vec<String>) {
        self.stop();

        let ctx = Arc::new(SchedulerCtx {
            managers: self.managers.clone(),
            cache: self.cache.clone(),
            bus: self.bus.clone(),
            rooms: self.rooms.clone(),
            cfg: self.cfg.clone(),
            guild_ids,
        });

        let scan_ctx = ctx.clone();
        let stats_ctx = ctx.clone();
        let cleanup_ctx = ctx;

        self.tasks = vec![
            ScheduledTask::spawn("expiry-scan", self.cfg.scan_interval, move || {
                run_scan(scan_ctx.clone())
            }),
            ScheduledTask::spawn("stats-refresh", self.cfg.stats_interval, move || {
                run_stats(stats_ctx.clone())
            }),
            ScheduledTask::spawn("cache-cleanup", self.cfg.cleanup_interval, move || {
                run_cleanup(cleanup_ctx.clone())
            }),
        ];

        info!(tasks = self.tasks.len(), "expiry scheduler started");
    }

    // == Stop ==
    /// Clears all intervals. In-flight cycle bodies run to completion;
    /// nothing is rolled back.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            debug!(task = task.name(), "stopping scheduled task");
            task.stop();
        }
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

// == Expiry Scan ==
/// One scan cycle: walk guilds in order, read candidates through the
/// cache, and finalize each, capped at `batch_limit` finalize calls so a
/// backlog cannot overload storage. Per-item failures are logged and the
/// entity stays active for the next cycle.
async fn run_scan(ctx: Arc<SchedulerCtx>) {
    let now = Utc::now();
    let mut processed = 0usize;

    'guilds: for guild_id in &ctx.guild_ids {
        for manager in &ctx.managers {
            if processed >= ctx.cfg.batch_limit {
                debug!(limit = ctx.cfg.batch_limit, "scan batch limit reached");
                break 'guilds;
            }

            let kind = manager.kind();
            if !kind.is_expirable() {
                continue;
            }

            let key = candidate_key(guild_id, kind);
            let candidates = match ctx
                .cache
                .get_or_fetch(&key, ctx.cfg.cache_ttl, || manager.expiring(guild_id, now))
                .await
            {
                Ok(candidates) => candidates,
                Err(read_error) => {
                    warn!(
                        %guild_id,
                        %kind,
                        error = %read_error,
                        "candidate read failed, retrying next cycle"
                    );
                    continue;
                }
            };

            let mut finalized_any = false;
            for entity in candidates {
                if processed >= ctx.cfg.batch_limit {
                    break;
                }
                processed += 1;

                match manager.finalize(&entity.id).await {
                    Ok(FinalState::Ended) => {
                        finalized_any = true;
                        ctx.bus.publish(RealtimeEvent::now(
                            format!("{}:ended", kind),
                            guild_id.clone(),
                            json!({ "id": entity.id }),
                        ));
                    }
                    Ok(FinalState::Cancelled) => {
                        finalized_any = true;
                        ctx.bus.publish(RealtimeEvent::now(
                            format!("{}:cancelled", kind),
                            guild_id.clone(),
                            json!({ "id": entity.id }),
                        ));
                    }
                    Ok(FinalState::AlreadyFinal) => {
                        // Finalized by an overlapping cycle or an
                        // interactive cancel; nothing to publish.
                        debug!(entity_id = %entity.id, %kind, "already finalized");
                    }
                    Err(finalize_error) => {
                        error!(
                            entity_id = %entity.id,
                            %guild_id,
                            %kind,
                            error = %finalize_error,
                            "finalize failed, entity stays active for retry"
                        );
                    }
                }
            }

            // Drop the cached candidate list once it no longer reflects
            // storage, so the next cycle re-reads.
            if finalized_any {
                ctx.cache.invalidate(&key).await;
            }
        }
    }

    if processed > 0 {
        debug!(processed, "expiry scan cycle complete");
    }
}

// == Stats Refresh ==
/// Recomputes lightweight per-guild counters and publishes a
/// `"guild:stats"` event, but only for guilds that currently have at least
/// one live room subscriber. Everyone else costs nothing.
async fn run_stats(ctx: Arc<SchedulerCtx>) {
    for guild_id in &ctx.guild_ids {
        if !ctx.rooms.has_subscribers(guild_id) {
            continue;
        }

        let mut counts = serde_json::Map::new();
        for manager in &ctx.managers {
            match manager.active_count(guild_id).await {
                Ok(count) => {
                    counts.insert(manager.kind().to_string(), json!(count));
                }
                Err(count_error) => {
                    warn!(%guild_id, kind = %manager.kind(), error = %count_error, "stat count failed");
                }
            }
        }

        ctx.bus.publish(RealtimeEvent::now(
            "guild:stats",
            guild_id.clone(),
            Value::Object(counts),
        ));
    }
}

// == Cache Cleanup ==
/// Best-effort sweep of expired cache entries.
async fn run_cleanup(ctx: Arc<SchedulerCtx>) {
    let purged = ctx.cache.purge_expired().await;
    if purged > 0 {
        info!(purged, "cache cleanup removed expired entries");
    } else {
        debug!("cache cleanup found nothing to remove");
    }
}
