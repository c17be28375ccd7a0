//! Asset reference data.

use serde::{Deserialize, Serialize};

/// A tradable asset.
///
/// Owned by the market-data side of the system; the scheduler only reads
/// payout and bounds at trade creation and never assumes the record is
/// unchanged afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Symbol (lowercase)
    pub symbol: String,
    /// Display name
    pub name: String,
    /// Payout fraction applied to winning wagers (e.g. 0.80)
    pub payout_rate: f64,
    /// Minimum wager amount
    pub min_amount: f64,
    /// Maximum wager amount
    pub max_amount: f64,
    /// Whether the asset currently accepts trades
    pub active: bool,
}

impl Asset {
    pub fn new(symbol: &str, name: &str, payout_rate: f64, min_amount: f64, max_amount: f64) -> Self {
        Self {
            symbol: symbol.to_lowercase(),
            name: name.to_string(),
            payout_rate,
            min_amount,
            max_amount,
            active: true,
        }
    }
}
