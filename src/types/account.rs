//! Account types: balance plus aggregate trading statistics.

use serde::{Deserialize, Serialize};

/// A demo trading account.
///
/// The stake for a trade is debited when the trade is opened; settlement
/// only ever credits, so settlement math cannot drive the balance negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Unique account ID
    pub id: String,
    /// Current cash balance
    pub balance: f64,
    /// Number of settled trades
    #[serde(default)]
    pub total_trades: u64,
    /// Number of winning trades
    #[serde(default)]
    pub winning_trades: u64,
    /// Cumulative signed profit across settled trades
    #[serde(default)]
    pub total_profit: f64,
    /// When the account was created (ms)
    pub created_at: i64,
    /// When the account was last updated (ms)
    pub updated_at: i64,
}

impl Account {
    /// Create a new account with the given starting balance.
    pub fn new(starting_balance: f64) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            balance: starting_balance,
            total_trades: 0,
            winning_trades: 0,
            total_profit: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Win rate across settled trades (0.0 when nothing settled yet).
    pub fn win_rate(&self) -> f64 {
        if self.total_trades > 0 {
            self.winning_trades as f64 / self.total_trades as f64
        } else {
            0.0
        }
    }

    /// Snapshot of the account's balance and statistics.
    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            account_id: self.id.clone(),
            balance: self.balance,
            total_trades: self.total_trades,
            winning_trades: self.winning_trades,
            total_profit: self.total_profit,
            win_rate: self.win_rate(),
        }
    }
}

/// Point-in-time view of an account's balance and statistics, returned by
/// the ledger after a settlement is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub account_id: String,
    pub balance: f64,
    pub total_trades: u64,
    pub winning_trades: u64,
    pub total_profit: f64,
    pub win_rate: f64,
}
