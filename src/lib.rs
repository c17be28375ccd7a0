//! Strike - Binary-options trade settlement server
//!
//! Clients open CALL/PUT wagers on an asset with a fixed duration; at
//! expiry the settlement scheduler fetches an exit price, computes the
//! win/loss outcome, persists it exactly once, updates the owning
//! account, and pushes the result to subscribed WebSocket clients.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod types;
pub mod websocket;

use config::Config;
use services::{AssetService, PriceCache, SettlementScheduler, SqliteStore};
use std::sync::Arc;
use websocket::RoomManager;

// Re-export commonly used types
pub use types::*;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
    pub scheduler: Arc<SettlementScheduler>,
    pub price_cache: Arc<PriceCache>,
    pub asset_service: Arc<AssetService>,
    pub room_manager: Arc<RoomManager>,
}
