//! Demo price feed.
//!
//! Drives the price cache with a small bounded random walk per active
//! asset so the demo settles trades end-to-end without a market-data
//! subsystem. The settlement scheduler never reads this directly; it only
//! ever sees the cache through the oracle seam.

use crate::services::asset_service::AssetService;
use crate::services::price_cache::PriceCache;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Seed prices for the default demo assets.
fn seed_price(symbol: &str) -> f64 {
    match symbol {
        "eurusd" => 1.0850,
        "gbpusd" => 1.2700,
        "usdjpy" => 148.50,
        "btc" => 60_000.0,
        "eth" => 3_000.0,
        "xauusd" => 2_350.0,
        _ => 100.0,
    }
}

/// Simulated price feed over the active asset catalog.
pub struct PriceFeed {
    cache: Arc<PriceCache>,
    assets: Arc<AssetService>,
    interval: Duration,
    /// Maximum per-tick move as a fraction of the current price.
    max_step_pct: f64,
    shutdown_tx: broadcast::Sender<()>,
}

impl PriceFeed {
    pub fn new(cache: Arc<PriceCache>, assets: Arc<AssetService>, interval: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            cache,
            assets,
            interval,
            max_step_pct: 0.0008,
            shutdown_tx,
        }
    }

    /// Start the feed task. Prices are seeded immediately so trades can be
    /// placed before the first tick.
    pub fn start(&self) {
        let cache = self.cache.clone();
        let assets = self.assets.clone();
        let interval = self.interval;
        let max_step_pct = self.max_step_pct;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let mut prices: HashMap<String, f64> = HashMap::new();
        for asset in assets.active() {
            let price = seed_price(&asset.symbol);
            prices.insert(asset.symbol.clone(), price);
            cache.update_price(&asset.symbol, price);
        }

        info!(
            "Starting demo price feed for {} assets every {:?}",
            prices.len(),
            interval
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.recv() => {
                        debug!("Price feed stopped");
                        return;
                    }
                }

                let mut rng = rand::thread_rng();
                for (symbol, price) in prices.iter_mut() {
                    let step = rng.gen_range(-max_step_pct..=max_step_pct);
                    *price *= 1.0 + step;
                    cache.update_price(symbol, *price);
                }
            }
        });
    }

    /// Stop the feed task.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_feed_seeds_prices_on_start() {
        let cache = PriceCache::new(120_000);
        let assets = AssetService::new();
        let feed = PriceFeed::new(cache.clone(), assets, Duration::from_secs(60));

        feed.start();

        assert!(cache.latest("eurusd").is_some());
        assert!(cache.latest("btc").is_some());
        feed.stop();
    }

    #[tokio::test]
    async fn test_feed_ticks_move_prices() {
        let cache = PriceCache::new(120_000);
        let assets = AssetService::new();
        let feed = PriceFeed::new(cache.clone(), assets, Duration::from_millis(10));

        feed.start();
        let mut rx = cache.subscribe();

        // Seed updates arrive first; wait for a post-seed tick.
        let mut updates = 0;
        while updates < 10 {
            rx.recv().await.unwrap();
            updates += 1;
        }

        feed.stop();
        assert!(cache.latest("eth").is_some());
    }
}
