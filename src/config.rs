//! Configuration Module
//!
//! Handles loading bot and dashboard configuration from environment variables.

use std::env;

/// Configuration for both the bot and dashboard processes.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bot-side relay server port
    pub relay_port: u16,
    /// Dashboard-side relay server port
    pub dashboard_port: u16,
    /// WebSocket URL the dashboard bridge dials to reach the bot relay
    pub bot_relay_url: String,
    /// The single guild the dashboard process serves
    pub target_guild_id: String,
    /// Guilds the bot manages; also the relay join allow-list (empty = allow any)
    pub guild_ids: Vec<String>,
    /// Expiry scan interval in seconds (short)
    pub scan_interval_secs: u64,
    /// Stats refresh interval in seconds (medium)
    pub stats_interval_secs: u64,
    /// Cache cleanup interval in seconds (long)
    pub cleanup_interval_secs: u64,
    /// Maximum finalize calls per scan cycle, across all guilds
    pub scan_batch_limit: usize,
    /// TTL in seconds for cached storage reads
    pub cache_ttl_secs: u64,
    /// Maximum number of cache entries
    pub cache_max_entries: usize,
    /// Initial bridge reconnect delay in milliseconds
    pub backoff_base_ms: u64,
    /// Bridge reconnect delay ceiling in milliseconds
    pub backoff_max_ms: u64,
    /// EventBus broadcast channel capacity
    pub event_buffer: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `RELAY_PORT` - Bot relay server port (default: 4600)
    /// - `DASHBOARD_PORT` - Dashboard relay server port (default: 4601)
    /// - `BOT_RELAY_URL` - Bridge dial URL (default: ws://127.0.0.1:4600/ws)
    /// - `TARGET_GUILD_ID` - Guild served by the dashboard (default: empty)
    /// - `GUILD_IDS` - Comma-separated managed guild ids (default: empty)
    /// - `SCAN_INTERVAL_SECS` - Expiry scan frequency (default: 15)
    /// - `STATS_INTERVAL_SECS` - Stats refresh frequency (default: 60)
    /// - `CLEANUP_INTERVAL_SECS` - Cache sweep frequency (default: 300)
    /// - `SCAN_BATCH_LIMIT` - Finalize calls per cycle (default: 10)
    /// - `CACHE_TTL_SECS` - Cached read TTL (default: 30)
    /// - `CACHE_MAX_ENTRIES` - Cache capacity (default: 1000)
    /// - `BACKOFF_BASE_MS` - Initial reconnect delay (default: 500)
    /// - `BACKOFF_MAX_MS` - Reconnect delay ceiling (default: 30000)
    /// - `EVENT_BUFFER` - EventBus channel capacity (default: 1024)
    pub fn from_env() -> Self {
        Self {
            relay_port: parse_env("RELAY_PORT", 4600),
            dashboard_port: parse_env("DASHBOARD_PORT", 4601),
            bot_relay_url: env::var("BOT_RELAY_URL")
                .unwrap_or_else(|_| "ws://127.0.0.1:4600/ws".to_string()),
            target_guild_id: env::var("TARGET_GUILD_ID").unwrap_or_default(),
            guild_ids: env::var("GUILD_IDS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            scan_interval_secs: parse_env("SCAN_INTERVAL_SECS", 15),
            stats_interval_secs: parse_env("STATS_INTERVAL_SECS", 60),
            cleanup_interval_secs: parse_env("CLEANUP_INTERVAL_SECS", 300),
            scan_batch_limit: parse_env("SCAN_BATCH_LIMIT", 10),
            cache_ttl_secs: parse_env("CACHE_TTL_SECS", 30),
            cache_max_entries: parse_env("CACHE_MAX_ENTRIES", 1000),
            backoff_base_ms: parse_env("BACKOFF_BASE_MS", 500),
            backoff_max_ms: parse_env("BACKOFF_MAX_MS", 30_000),
            event_buffer: parse_env("EVENT_BUFFER", 1024),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay_port: 4600,
            dashboard_port: 4601,
            bot_relay_url: "ws://127.0.0.1:4600/ws".to_string(),
            target_guild_id: String::new(),
            guild_ids: Vec::new(),
            scan_interval_secs: 15,
            stats_interval_secs: 60,
            cleanup_interval_secs: 300,
            scan_batch_limit: 10,
            cache_ttl_secs: 30,
            cache_max_entries: 1000,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
            event_buffer: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.relay_port, 4600);
        assert_eq!(config.scan_interval_secs, 15);
        assert_eq!(config.scan_batch_limit, 10);
        assert_eq!(config.cache_max_entries, 1000);
        assert!(config.guild_ids.is_empty());
    }

    #[test]
    fn test_guild_ids_parsing() {
        env::set_var("GUILD_IDS", "g1, g2 ,,g3");
        let config = Config::from_env();
        env::remove_var("GUILD_IDS");

        assert_eq!(config.guild_ids, vec!["g1", "g2", "g3"]);
    }

    #[test]
    fn test_invalid_number_falls_back_to_default() {
        env::set_var("SCAN_BATCH_LIMIT", "not-a-number");
        let config = Config::from_env();
        env::remove_var("SCAN_BATCH_LIMIT");

        assert_eq!(config.scan_batch_limit, 10);
    }
}
