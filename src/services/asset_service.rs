//! Asset catalog.
//!
//! Reference data for the assets the demo accepts wagers on. The scheduler
//! reads payout and bounds here once, at trade creation.

use crate::types::Asset;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory asset catalog.
pub struct AssetService {
    assets: DashMap<String, Asset>,
}

impl AssetService {
    /// Create a catalog seeded with the default demo assets.
    pub fn new() -> Arc<Self> {
        let service = Self {
            assets: DashMap::new(),
        };

        for asset in default_assets() {
            service.assets.insert(asset.symbol.clone(), asset);
        }

        Arc::new(service)
    }

    /// Create an empty catalog (for tests).
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            assets: DashMap::new(),
        })
    }

    /// Look up an asset by symbol.
    pub fn get(&self, symbol: &str) -> Option<Asset> {
        self.assets.get(&symbol.to_lowercase()).map(|a| a.clone())
    }

    /// Insert or replace an asset.
    pub fn upsert(&self, asset: Asset) {
        self.assets.insert(asset.symbol.clone(), asset);
    }

    /// All assets, active ones first, then by symbol.
    pub fn list(&self) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self.assets.iter().map(|a| a.clone()).collect();
        assets.sort_by(|a, b| b.active.cmp(&a.active).then(a.symbol.cmp(&b.symbol)));
        assets
    }

    /// All active assets.
    pub fn active(&self) -> Vec<Asset> {
        self.assets
            .iter()
            .filter(|a| a.active)
            .map(|a| a.clone())
            .collect()
    }
}

fn default_assets() -> Vec<Asset> {
    vec![
        Asset::new("eurusd", "EUR/USD", 0.80, 1.0, 1000.0),
        Asset::new("gbpusd", "GBP/USD", 0.80, 1.0, 1000.0),
        Asset::new("usdjpy", "USD/JPY", 0.78, 1.0, 1000.0),
        Asset::new("btc", "Bitcoin", 0.85, 1.0, 500.0),
        Asset::new("eth", "Ethereum", 0.85, 1.0, 500.0),
        Asset::new("xauusd", "Gold", 0.75, 1.0, 1000.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_seeded() {
        let service = AssetService::new();
        assert!(!service.list().is_empty());

        let eurusd = service.get("eurusd").unwrap();
        assert!(eurusd.active);
        assert!((eurusd.payout_rate - 0.80).abs() < f64::EPSILON);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let service = AssetService::new();
        assert!(service.get("EURUSD").is_some());
        assert!(service.get("EurUsd").is_some());
    }

    #[test]
    fn test_inactive_assets_excluded_from_active() {
        let service = AssetService::empty();
        let mut asset = Asset::new("test", "Test", 0.8, 1.0, 100.0);
        asset.active = false;
        service.upsert(asset);

        assert_eq!(service.active().len(), 0);
        assert_eq!(service.list().len(), 1);
    }
}
