//! Settlement Scheduler
//!
//! The core of the server: guarantees that every accepted trade is settled
//! exactly once, as close as possible to its expiration instant, across
//! concurrent timer fires and process restarts.
//!
//! The scheduler owns an in-memory registry of pending trades and their
//! timers and talks to the rest of the system through four narrow seams:
//! the trade store, the account ledger, the price oracle, and the
//! notifier. The conditional mark-settled write in the trade store is the
//! single serialization point that keeps racing settlement attempts from
//! applying ledger or notification side effects twice.

use crate::services::asset_service::AssetService;
use crate::services::timer::{self, TimerHandle};
use crate::services::outcome;
use crate::types::{
    AccountSnapshot, PlaceTradeRequest, SettlementEvent, Trade, TradeResult,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Trading and settlement errors.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Trade not found: {0}")]
    TradeNotFound(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Asset is not accepting trades: {0}")]
    AssetInactive(String),

    #[error("Invalid amount {amount}: must be between {min} and {max}")]
    InvalidAmount { amount: f64, min: f64, max: f64 },

    #[error("Unsupported duration: {0}s")]
    InvalidDuration(u32),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: f64, available: f64 },

    #[error("No price data available for {0}")]
    NoPriceData(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<rusqlite::Error> for TradeError {
    fn from(e: rusqlite::Error) -> Self {
        TradeError::DatabaseError(e.to_string())
    }
}

/// Durable store of trade records.
pub trait TradeStore: Send + Sync {
    /// Persist a new pending trade.
    fn create_trade(&self, trade: &Trade) -> Result<(), TradeError>;

    /// Atomically transition a trade to settled.
    ///
    /// Returns true iff this call performed the transition; false when the
    /// trade was already settled. This is the exactly-once gate.
    fn mark_settled(
        &self,
        id: &str,
        exit_price: f64,
        result: TradeResult,
        profit: f64,
        settled_at: i64,
    ) -> Result<bool, TradeError>;

    /// All trades that have not been settled yet.
    fn find_pending(&self) -> Result<Vec<Trade>, TradeError>;

    /// Look up a single trade.
    fn get_trade(&self, id: &str) -> Option<Trade>;
}

/// Durable store of account balances and aggregate statistics.
pub trait AccountLedger: Send + Sync {
    /// Debit the stake for a new trade. Fails without side effects when the
    /// balance is insufficient. Returns the new balance.
    fn reserve_stake(&self, account_id: &str, amount: f64) -> Result<f64, TradeError>;

    /// Credit a reserved stake back (trade creation failed after the debit).
    fn release_stake(&self, account_id: &str, amount: f64) -> Result<f64, TradeError>;

    /// Apply a settlement: a win credits stake + profit, a loss credits
    /// nothing (the stake was debited at creation). Updates trade counters
    /// and returns the resulting snapshot. Atomic per account.
    fn apply_settlement(
        &self,
        account_id: &str,
        stake: f64,
        profit: f64,
        is_win: bool,
    ) -> Result<AccountSnapshot, TradeError>;
}

/// Source of settlement prices.
pub trait PriceOracle: Send + Sync {
    /// Latest known price for a symbol. `None` is a transient failure and
    /// is retried; it is never treated as a price of zero.
    fn get_price(&self, symbol: &str) -> Option<f64>;
}

/// Push channel for settlement events. Fire-and-forget: delivery failure
/// never blocks or fails settlement.
pub trait Notifier: Send + Sync {
    fn notify(&self, account_id: &str, event: &SettlementEvent);
}

/// Tuning for the settlement scheduler.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Permitted trade durations in seconds.
    pub allowed_durations: Vec<u32>,
    /// In-settle retry attempts for oracle/store failures.
    pub max_retries: u32,
    /// Base backoff between retries (doubled per attempt).
    pub retry_backoff: Duration,
    /// Delay before re-attempting a settlement that exhausted its retries.
    pub requeue_delay: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            allowed_durations: vec![60, 300, 900, 1800, 3600],
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            requeue_delay: Duration::from_secs(5),
        }
    }
}

/// Registry entry: a snapshot of the pending trade plus its armed timer.
struct PendingTrade {
    trade: Trade,
    timer: Option<TimerHandle>,
}

/// The settlement scheduler.
pub struct SettlementScheduler {
    /// Pending trades keyed by trade id. Rebuilt from the store on startup.
    pending: DashMap<String, PendingTrade>,
    trades: Arc<dyn TradeStore>,
    ledger: Arc<dyn AccountLedger>,
    oracle: Arc<dyn PriceOracle>,
    notifier: Arc<dyn Notifier>,
    assets: Arc<AssetService>,
    config: SettlementConfig,
    /// Broadcast of settlement events for local consumers.
    settlement_tx: broadcast::Sender<SettlementEvent>,
}

impl SettlementScheduler {
    /// Create a new scheduler over the given collaborators.
    pub fn new(
        trades: Arc<dyn TradeStore>,
        ledger: Arc<dyn AccountLedger>,
        oracle: Arc<dyn PriceOracle>,
        notifier: Arc<dyn Notifier>,
        assets: Arc<AssetService>,
        config: SettlementConfig,
    ) -> Arc<Self> {
        let (settlement_tx, _) = broadcast::channel(1024);
        Arc::new(Self {
            pending: DashMap::new(),
            trades,
            ledger,
            oracle,
            notifier,
            assets,
            config,
            settlement_tx,
        })
    }

    /// Subscribe to settlement events.
    pub fn subscribe_settlements(&self) -> broadcast::Receiver<SettlementEvent> {
        self.settlement_tx.subscribe()
    }

    /// Number of trades currently awaiting settlement in memory.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // ==========================================================================
    // Trade Creation
    // ==========================================================================

    /// Validate and open a new trade, then schedule its settlement.
    ///
    /// Entry price and payout rate are captured here and never re-read at
    /// settlement time. The stake is debited from the account as part of
    /// creation.
    pub fn place_trade(self: &Arc<Self>, request: PlaceTradeRequest) -> Result<Trade, TradeError> {
        let asset = self
            .assets
            .get(&request.symbol)
            .ok_or_else(|| TradeError::AssetNotFound(request.symbol.clone()))?;

        if !asset.active {
            return Err(TradeError::AssetInactive(asset.symbol));
        }

        if request.amount < asset.min_amount || request.amount > asset.max_amount {
            return Err(TradeError::InvalidAmount {
                amount: request.amount,
                min: asset.min_amount,
                max: asset.max_amount,
            });
        }

        if !self.config.allowed_durations.contains(&request.duration_secs) {
            return Err(TradeError::InvalidDuration(request.duration_secs));
        }

        let entry_price = self
            .oracle
            .get_price(&asset.symbol)
            .ok_or_else(|| TradeError::NoPriceData(asset.symbol.clone()))?;

        self.ledger.reserve_stake(&request.account_id, request.amount)?;

        let trade = Trade::new(
            request.account_id,
            asset.symbol,
            request.direction,
            request.amount,
            request.duration_secs,
            entry_price,
            asset.payout_rate,
        );

        if let Err(e) = self.trades.create_trade(&trade) {
            // The stake is already gone; hand it back before surfacing the
            // failure.
            if let Err(refund_err) = self.ledger.release_stake(&trade.account_id, trade.amount) {
                error!(
                    "Failed to refund stake for account {} after create failure: {}",
                    trade.account_id, refund_err
                );
            }
            return Err(e);
        }

        self.schedule(trade.clone());

        info!(
            "Opened trade {} ({} {} {} for {}s at {})",
            trade.id, trade.direction, trade.amount, trade.symbol, trade.duration_secs, trade.entry_price
        );
        Ok(trade)
    }

    // ==========================================================================
    // Scheduling
    // ==========================================================================

    /// Register a persisted pending trade for settlement at its expiry.
    ///
    /// Overdue trades (expiry already passed, e.g. loaded after a restart)
    /// are triggered immediately instead of waiting. This operation cannot
    /// lose a trade: the registry entry is inserted before the timer is
    /// armed.
    pub fn schedule(self: &Arc<Self>, trade: Trade) {
        if trade.settled {
            debug!("Ignoring already-settled trade {}", trade.id);
            return;
        }

        let now = chrono::Utc::now().timestamp_millis();
        let delay = Duration::from_millis(trade.remaining_ms(now) as u64);
        let trade_id = trade.id.clone();

        self.pending.insert(
            trade_id.clone(),
            PendingTrade {
                trade,
                timer: None,
            },
        );

        let handle = self.arm_timer(trade_id.clone(), delay);

        // A zero-delay timer may have fired and removed the entry already;
        // the handle is then simply dropped.
        if let Some(mut entry) = self.pending.get_mut(&trade_id) {
            entry.timer = Some(handle);
        }

        debug!("Scheduled trade {} in {:?}", trade_id, delay);
    }

    fn arm_timer(self: &Arc<Self>, trade_id: String, delay: Duration) -> TimerHandle {
        let scheduler = Arc::clone(self);
        timer::after(delay, async move {
            scheduler.settle(&trade_id).await;
        })
    }

    /// Re-arm a settlement attempt that could not complete.
    fn requeue(self: &Arc<Self>, trade_id: &str) {
        if let Some(mut entry) = self.pending.get_mut(trade_id) {
            let handle = self.arm_timer(trade_id.to_string(), self.config.requeue_delay);
            entry.timer = Some(handle);
            warn!(
                "Deferred settlement of trade {} by {:?}",
                trade_id, self.config.requeue_delay
            );
        }
    }

    // ==========================================================================
    // Settlement
    // ==========================================================================

    /// Settle a trade by id.
    ///
    /// Safe to invoke multiple times (duplicate timer fires, racing manual
    /// triggers): the conditional store write arbitrates, and losers leave
    /// no side effects. The trade stays in the registry until settlement is
    /// durably persisted.
    pub async fn settle(self: &Arc<Self>, trade_id: &str) {
        // Clone out of the registry; the guard must not be held across
        // any await below.
        let trade = match self.pending.get(trade_id) {
            Some(entry) => entry.trade.clone(),
            None => {
                debug!("Settle called for unknown or settled trade {}", trade_id);
                return;
            }
        };

        // Never settle before expiry; if the timer fired early, re-arm for
        // the remainder.
        let now = chrono::Utc::now().timestamp_millis();
        if now < trade.expires_at {
            let remainder = Duration::from_millis((trade.expires_at - now) as u64);
            if let Some(mut entry) = self.pending.get_mut(trade_id) {
                let handle = self.arm_timer(trade_id.to_string(), remainder);
                entry.timer = Some(handle);
            }
            return;
        }

        let exit_price = match self.fetch_price_with_retry(&trade.symbol).await {
            Some(price) => price,
            None => {
                warn!(
                    "Price for {} unavailable, trade {} stays pending",
                    trade.symbol, trade_id
                );
                self.requeue(trade_id);
                return;
            }
        };

        let outcome = match outcome::evaluate(
            trade.direction,
            trade.entry_price,
            exit_price,
            trade.amount,
            trade.payout_rate,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                // A trade with unusable parameters can never settle; leave
                // it pending in the store for reconciliation but stop
                // retrying it.
                error!("Cannot evaluate trade {}: {}", trade_id, e);
                self.pending.remove(trade_id);
                return;
            }
        };

        let settled_at = chrono::Utc::now().timestamp_millis();

        let performed = match self
            .mark_settled_with_retry(trade_id, exit_price, outcome.result, outcome.profit, settled_at)
            .await
        {
            Some(performed) => performed,
            None => {
                self.requeue(trade_id);
                return;
            }
        };

        if !performed {
            // Another path settled this trade first; no further side
            // effects.
            debug!("Trade {} was already settled, skipping", trade_id);
            self.pending.remove(trade_id);
            return;
        }

        let is_win = outcome.result == TradeResult::Win;
        match self
            .ledger
            .apply_settlement(&trade.account_id, trade.amount, outcome.profit, is_win)
        {
            Ok(snapshot) => {
                let mut settled = trade.clone();
                settled.settled = true;
                settled.exit_price = Some(exit_price);
                settled.result = Some(outcome.result);
                settled.profit = Some(outcome.profit);
                settled.settled_at = Some(settled_at);

                let event = SettlementEvent::new(settled, snapshot);
                self.notifier.notify(&trade.account_id, &event);
                let _ = self.settlement_tx.send(event);
            }
            Err(e) => {
                // The trade is durably settled; the missing credit needs
                // reconciliation, not a second settlement attempt.
                error!(
                    "Ledger update failed for account {} after settling trade {}: {}",
                    trade.account_id, trade_id, e
                );
            }
        }

        self.pending.remove(trade_id);
        info!(
            "Settled trade {} ({} {} at {} -> {}, {:?}, profit {:.2})",
            trade_id, trade.direction, trade.symbol, trade.entry_price, exit_price,
            outcome.result, outcome.profit
        );
    }

    /// Query the oracle with bounded exponential backoff.
    async fn fetch_price_with_retry(&self, symbol: &str) -> Option<f64> {
        let mut backoff = self.config.retry_backoff;

        for attempt in 0..=self.config.max_retries {
            if let Some(price) = self.oracle.get_price(symbol) {
                return Some(price);
            }

            if attempt < self.config.max_retries {
                debug!(
                    "No price for {} (attempt {}), retrying in {:?}",
                    symbol,
                    attempt + 1,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        None
    }

    /// Attempt the conditional settled-mark with bounded backoff.
    ///
    /// `Some(bool)` is the store's verdict; `None` means the store stayed
    /// unreachable and the caller should defer.
    async fn mark_settled_with_retry(
        &self,
        trade_id: &str,
        exit_price: f64,
        result: TradeResult,
        profit: f64,
        settled_at: i64,
    ) -> Option<bool> {
        let mut backoff = self.config.retry_backoff;

        for attempt in 0..=self.config.max_retries {
            match self
                .trades
                .mark_settled(trade_id, exit_price, result, profit, settled_at)
            {
                Ok(performed) => return Some(performed),
                Err(e) => {
                    warn!(
                        "Failed to persist settlement of {} (attempt {}): {}",
                        trade_id,
                        attempt + 1,
                        e
                    );
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        None
    }

    // ==========================================================================
    // Lifecycle
    // ==========================================================================

    /// Rebuild the registry from the store after a restart.
    ///
    /// Overdue trades settle immediately via `schedule`. A single bad
    /// record is logged and skipped; it never aborts the recovery batch.
    /// Returns the number of trades scheduled.
    pub fn load_pending(self: &Arc<Self>) -> Result<usize, TradeError> {
        let pending = self.trades.find_pending()?;
        let total = pending.len();
        let mut scheduled = 0usize;

        for trade in pending {
            if trade.amount <= 0.0 || trade.entry_price <= 0.0 || trade.payout_rate <= 0.0 {
                warn!(
                    "Skipping corrupt pending trade {} (amount {}, entry {}, payout {})",
                    trade.id, trade.amount, trade.entry_price, trade.payout_rate
                );
                continue;
            }
            self.schedule(trade);
            scheduled += 1;
        }

        info!("Recovered {}/{} pending trades from storage", scheduled, total);
        Ok(scheduled)
    }

    /// Cancel all outstanding timers without settling and clear the
    /// registry. A graceful shutdown never force-settles trades early;
    /// `load_pending` resumes them on the next start.
    pub fn cleanup(&self) {
        let count = self.pending.len();
        for entry in self.pending.iter() {
            if let Some(timer) = &entry.timer {
                timer.cancel();
            }
        }
        self.pending.clear();
        info!("Cancelled {} pending settlement timers", count);
    }
}
