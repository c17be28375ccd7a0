//! WebSocket message types.

use serde::{Deserialize, Serialize};

use super::{AccountSnapshot, Trade};

/// Messages sent from clients to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to settlement events for the given account IDs
    Subscribe { accounts: Vec<String> },
    /// Unsubscribe from the given account IDs
    Unsubscribe { accounts: Vec<String> },
}

/// Messages sent from the server to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Subscribed {
        accounts: Vec<String>,
    },
    Unsubscribed {
        accounts: Vec<String>,
    },
    /// A trade owned by a subscribed account was settled
    Settlement {
        data: SettlementEvent,
    },
    Error {
        error: String,
    },
}

/// Payload pushed when a trade settles: the settled trade plus the owning
/// account's updated balance and statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementEvent {
    pub trade: Trade,
    pub account: AccountSnapshot,
    /// When the event was emitted (ms)
    pub timestamp: i64,
}

impl SettlementEvent {
    pub fn new(trade: Trade, account: AccountSnapshot) -> Self {
        Self {
            trade,
            account,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
