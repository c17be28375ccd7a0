use crate::services::SettlementConfig;
use std::env;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database path.
    pub database_path: String,
    /// Starting balance for new demo accounts.
    pub starting_balance: f64,
    /// Permitted trade durations in seconds.
    pub trade_durations: Vec<u32>,
    /// In-settle retry attempts for oracle/store failures.
    pub settle_max_retries: u32,
    /// Base backoff between settlement retries (ms).
    pub settle_retry_backoff_ms: u64,
    /// Delay before re-attempting a deferred settlement (ms).
    pub settle_requeue_delay_ms: u64,
    /// Cached prices older than this are treated as unavailable (ms).
    pub price_stale_threshold_ms: i64,
    /// Whether the demo price feed runs.
    pub price_feed_enabled: bool,
    /// Demo price feed tick interval (ms).
    pub price_feed_interval_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        // Format: comma-separated seconds, e.g. "60,300,900"
        let trade_durations = env::var("TRADE_DURATIONS")
            .ok()
            .map(|s| {
                s.split(',')
                    .filter_map(|d| d.trim().parse().ok())
                    .collect::<Vec<u32>>()
            })
            .filter(|durations| !durations.is_empty())
            .unwrap_or_else(|| vec![60, 300, 900, 1800, 3600]);

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "strike.db".to_string()),
            starting_balance: env::var("STARTING_BALANCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000.0),
            trade_durations,
            settle_max_retries: env::var("SETTLE_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            settle_retry_backoff_ms: env::var("SETTLE_RETRY_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            settle_requeue_delay_ms: env::var("SETTLE_REQUEUE_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5_000),
            price_stale_threshold_ms: env::var("PRICE_STALE_THRESHOLD_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120_000),
            price_feed_enabled: env::var("PRICE_FEED_ENABLED")
                .ok()
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            price_feed_interval_ms: env::var("PRICE_FEED_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1_000),
        }
    }

    /// Settlement scheduler tuning derived from this configuration.
    pub fn settlement(&self) -> SettlementConfig {
        SettlementConfig {
            allowed_durations: self.trade_durations.clone(),
            max_retries: self.settle_max_retries,
            retry_backoff: Duration::from_millis(self.settle_retry_backoff_ms),
            requeue_delay: Duration::from_millis(self.settle_requeue_delay_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_durations() {
        let config = Config::from_env();
        if env::var("TRADE_DURATIONS").is_err() {
            assert_eq!(config.trade_durations, vec![60, 300, 900, 1800, 3600]);
        }
    }

    #[test]
    fn test_settlement_config_conversion() {
        let mut config = Config::from_env();
        config.trade_durations = vec![60, 120];
        config.settle_max_retries = 5;
        config.settle_retry_backoff_ms = 250;
        config.settle_requeue_delay_ms = 2_000;

        let settlement = config.settlement();
        assert_eq!(settlement.allowed_durations, vec![60, 120]);
        assert_eq!(settlement.max_retries, 5);
        assert_eq!(settlement.retry_backoff, Duration::from_millis(250));
        assert_eq!(settlement.requeue_delay, Duration::from_secs(2));
    }
}
