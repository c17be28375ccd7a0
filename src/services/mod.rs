//! Core services: settlement scheduling, outcome evaluation, persistence,
//! price caching, and the demo feed.

pub mod asset_service;
pub mod outcome;
pub mod price_cache;
pub mod price_feed;
pub mod settlement;
pub mod sqlite_store;
pub mod timer;

pub use asset_service::AssetService;
pub use outcome::{evaluate, Outcome, OutcomeError};
pub use price_cache::{PriceCache, PriceUpdate};
pub use price_feed::PriceFeed;
pub use settlement::{
    AccountLedger, Notifier, PriceOracle, SettlementConfig, SettlementScheduler, TradeError,
    TradeStore,
};
pub use sqlite_store::SqliteStore;
pub use timer::TimerHandle;
