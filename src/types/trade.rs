//! Trade types for binary-options wagers.

use serde::{Deserialize, Serialize};

/// Direction of a binary-options wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    /// Wins when the exit price is above the entry price.
    Call,
    /// Wins when the exit price is below the entry price.
    Put,
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeDirection::Call => write!(f, "call"),
            TradeDirection::Put => write!(f, "put"),
        }
    }
}

/// Outcome of a settled trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeResult {
    Win,
    Loss,
}

impl std::fmt::Display for TradeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeResult::Win => write!(f, "win"),
            TradeResult::Loss => write!(f, "loss"),
        }
    }
}

/// A binary-options trade.
///
/// Entry price and payout rate are frozen at creation; the expiration
/// timestamp is always `created_at + duration_secs * 1000`. Settlement
/// fields are write-once: after `settled` flips to true no field changes
/// again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    /// Unique trade ID
    pub id: String,
    /// Owning account ID
    pub account_id: String,
    /// Asset symbol (lowercase)
    pub symbol: String,
    /// Wager direction
    pub direction: TradeDirection,
    /// Wager amount in account currency
    pub amount: f64,
    /// Duration of the wager in seconds
    pub duration_secs: u32,
    /// Price captured when the trade was opened
    pub entry_price: f64,
    /// Payout fraction frozen from the asset at creation (e.g. 0.80)
    pub payout_rate: f64,
    /// Creation timestamp (ms)
    pub created_at: i64,
    /// Expiration timestamp (ms), derived from creation + duration
    pub expires_at: i64,
    /// Whether the trade has been settled
    #[serde(default)]
    pub settled: bool,
    /// Price observed at settlement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    /// Win or loss
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TradeResult>,
    /// Signed profit: +amount * payout_rate on win, -amount on loss
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit: Option<f64>,
    /// Settlement timestamp (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<i64>,
}

impl Trade {
    /// Create a new pending trade, stamping creation and expiration times.
    pub fn new(
        account_id: String,
        symbol: String,
        direction: TradeDirection,
        amount: f64,
        duration_secs: u32,
        entry_price: f64,
        payout_rate: f64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account_id,
            symbol: symbol.to_lowercase(),
            direction,
            amount,
            duration_secs,
            entry_price,
            payout_rate,
            created_at: now,
            expires_at: now + duration_secs as i64 * 1000,
            settled: false,
            exit_price: None,
            result: None,
            profit: None,
            settled_at: None,
        }
    }

    /// Whether the trade's expiration instant has passed.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }

    /// Milliseconds remaining until expiry (zero when overdue).
    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        (self.expires_at - now_ms).max(0)
    }
}

/// Request body for placing a trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceTradeRequest {
    /// Owning account ID
    pub account_id: String,
    /// Asset symbol
    pub symbol: String,
    /// Wager direction
    pub direction: TradeDirection,
    /// Wager amount
    pub amount: f64,
    /// Duration in seconds (must be one of the configured durations)
    pub duration_secs: u32,
}
