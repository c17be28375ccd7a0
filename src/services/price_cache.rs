//! Latest-price cache.
//!
//! Holds the most recent known price per symbol and re-broadcasts updates
//! to local consumers. The settlement scheduler reads it through the
//! [`PriceOracle`] seam; entries older than the configured staleness
//! threshold are treated as unavailable rather than served as live prices.

use crate::services::settlement::PriceOracle;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// A price observation pushed into the cache.
#[derive(Debug, Clone)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: f64,
    /// Observation timestamp (ms)
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
struct CachedPrice {
    price: f64,
    timestamp: i64,
}

/// Thread-safe latest-price cache with staleness tracking.
pub struct PriceCache {
    prices: DashMap<String, CachedPrice>,
    /// Entries older than this many milliseconds are treated as missing.
    stale_threshold_ms: i64,
    tx: broadcast::Sender<PriceUpdate>,
}

impl PriceCache {
    /// Create a new price cache.
    pub fn new(stale_threshold_ms: i64) -> Arc<Self> {
        let (tx, _) = broadcast::channel(1024);
        Arc::new(Self {
            prices: DashMap::new(),
            stale_threshold_ms,
            tx,
        })
    }

    /// Subscribe to price updates.
    pub fn subscribe(&self) -> broadcast::Receiver<PriceUpdate> {
        self.tx.subscribe()
    }

    /// Record a new price observation for a symbol.
    pub fn update_price(&self, symbol: &str, price: f64) {
        let symbol_lower = symbol.to_lowercase();
        let timestamp = chrono::Utc::now().timestamp_millis();

        self.prices
            .insert(symbol_lower.clone(), CachedPrice { price, timestamp });

        // Ignore send errors when nobody is listening.
        let _ = self.tx.send(PriceUpdate {
            symbol: symbol_lower,
            price,
            timestamp,
        });
    }

    /// Get the latest non-stale price for a symbol.
    pub fn latest(&self, symbol: &str) -> Option<f64> {
        let entry = self.prices.get(&symbol.to_lowercase())?;
        let now = chrono::Utc::now().timestamp_millis();
        if now - entry.timestamp > self.stale_threshold_ms {
            return None;
        }
        Some(entry.price)
    }

    /// All symbols with a cached price, with their latest values.
    pub fn all_prices(&self) -> Vec<(String, f64)> {
        self.prices
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().price))
            .collect()
    }
}

impl PriceOracle for PriceCache {
    fn get_price(&self, symbol: &str) -> Option<f64> {
        self.latest(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_returns_most_recent() {
        let cache = PriceCache::new(120_000);
        cache.update_price("BTC", 50_000.0);
        cache.update_price("btc", 50_100.0);

        assert_eq!(cache.latest("btc"), Some(50_100.0));
        assert_eq!(cache.latest("BTC"), Some(50_100.0));
    }

    #[test]
    fn test_missing_symbol_is_none() {
        let cache = PriceCache::new(120_000);
        assert_eq!(cache.latest("eth"), None);
    }

    #[test]
    fn test_stale_price_is_unavailable() {
        // Zero threshold: anything already recorded counts as stale.
        let cache = PriceCache::new(-1);
        cache.update_price("eurusd", 1.1);
        assert_eq!(cache.latest("eurusd"), None);
    }

    #[tokio::test]
    async fn test_updates_are_broadcast() {
        let cache = PriceCache::new(120_000);
        let mut rx = cache.subscribe();

        cache.update_price("eth", 3000.0);

        let update = rx.recv().await.unwrap();
        assert_eq!(update.symbol, "eth");
        assert_eq!(update.price, 3000.0);
    }
}
