//! SQLite persistence for accounts and trades.
//!
//! Backs both collaborator seams of the settlement scheduler: the trade
//! store (including the conditional mark-settled write that guards
//! exactly-once settlement) and the account ledger. All access goes
//! through a single mutex-held connection, so per-account ledger updates
//! are atomic with respect to concurrent settlements.

use crate::services::settlement::{AccountLedger, TradeError, TradeStore};
use crate::types::{Account, AccountSnapshot, Trade, TradeDirection, TradeResult};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// SQLite store for accounts and trades.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                balance REAL NOT NULL,
                total_trades INTEGER NOT NULL DEFAULT 0,
                winning_trades INTEGER NOT NULL DEFAULT 0,
                total_profit REAL NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                direction TEXT NOT NULL,
                amount REAL NOT NULL,
                duration_secs INTEGER NOT NULL,
                entry_price REAL NOT NULL,
                payout_rate REAL NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                settled INTEGER NOT NULL DEFAULT 0,
                exit_price REAL,
                result TEXT,
                profit REAL,
                settled_at INTEGER
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_trades_account ON trades(account_id, created_at DESC)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_trades_pending ON trades(settled, expires_at)",
            [],
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }

    // ========== Account Methods ==========

    /// Persist a new account.
    pub fn create_account(&self, account: &Account) -> Result<(), TradeError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO accounts (id, balance, total_trades, winning_trades, total_profit, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                account.id,
                account.balance,
                account.total_trades as i64,
                account.winning_trades as i64,
                account.total_profit,
                account.created_at,
                account.updated_at,
            ],
        )?;
        debug!("Created account {}", account.id);
        Ok(())
    }

    /// Get an account by ID.
    pub fn get_account(&self, id: &str) -> Option<Account> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, balance, total_trades, winning_trades, total_profit, created_at, updated_at
             FROM accounts WHERE id = ?1",
            params![id],
            |row| {
                Ok(Account {
                    id: row.get(0)?,
                    balance: row.get(1)?,
                    total_trades: row.get::<_, i64>(2)? as u64,
                    winning_trades: row.get::<_, i64>(3)? as u64,
                    total_profit: row.get(4)?,
                    created_at: row.get(5)?,
                    updated_at: row.get(6)?,
                })
            },
        )
        .ok()
    }

    // ========== Trade Methods ==========

    /// Get all trades for an account, newest first.
    pub fn get_account_trades(&self, account_id: &str, limit: usize) -> Vec<Trade> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = match conn.prepare(
            "SELECT id, account_id, symbol, direction, amount, duration_secs, entry_price,
                    payout_rate, created_at, expires_at, settled, exit_price, result, profit, settled_at
             FROM trades WHERE account_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        ) {
            Ok(stmt) => stmt,
            Err(e) => {
                warn!("Error preparing trade history query: {}", e);
                return Vec::new();
            }
        };

        stmt.query_map(params![account_id, limit as i64], trade_from_row)
            .map(|rows| rows.filter_map(log_bad_row).collect())
            .unwrap_or_default()
    }

    /// Number of unsettled trades (used by health reporting).
    pub fn pending_count(&self) -> usize {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM trades WHERE settled = 0", [], |row| {
            row.get(0)
        })
        .unwrap_or(0)
    }
}

impl TradeStore for SqliteStore {
    fn create_trade(&self, trade: &Trade) -> Result<(), TradeError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO trades
             (id, account_id, symbol, direction, amount, duration_secs, entry_price,
              payout_rate, created_at, expires_at, settled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)",
            params![
                trade.id,
                trade.account_id,
                trade.symbol,
                trade.direction.to_string(),
                trade.amount,
                trade.duration_secs,
                trade.entry_price,
                trade.payout_rate,
                trade.created_at,
                trade.expires_at,
            ],
        )?;
        debug!("Created trade {} ({} {})", trade.id, trade.direction, trade.symbol);
        Ok(())
    }

    fn mark_settled(
        &self,
        id: &str,
        exit_price: f64,
        result: TradeResult,
        profit: f64,
        settled_at: i64,
    ) -> Result<bool, TradeError> {
        let conn = self.conn.lock().unwrap();

        // Conditional write: only the caller that flips settled 0 -> 1
        // observes a changed row. This is the exactly-once gate.
        let changed = conn.execute(
            "UPDATE trades
             SET settled = 1, exit_price = ?1, result = ?2, profit = ?3, settled_at = ?4
             WHERE id = ?5 AND settled = 0",
            params![exit_price, result.to_string(), profit, settled_at, id],
        )?;

        Ok(changed == 1)
    }

    fn find_pending(&self) -> Result<Vec<Trade>, TradeError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, account_id, symbol, direction, amount, duration_secs, entry_price,
                    payout_rate, created_at, expires_at, settled, exit_price, result, profit, settled_at
             FROM trades WHERE settled = 0
             ORDER BY expires_at ASC",
        )?;

        let trades = stmt
            .query_map([], trade_from_row)?
            .filter_map(log_bad_row)
            .collect();

        Ok(trades)
    }

    fn get_trade(&self, id: &str) -> Option<Trade> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, account_id, symbol, direction, amount, duration_secs, entry_price,
                    payout_rate, created_at, expires_at, settled, exit_price, result, profit, settled_at
             FROM trades WHERE id = ?1",
            params![id],
            trade_from_row,
        )
        .ok()
    }
}

impl AccountLedger for SqliteStore {
    fn reserve_stake(&self, account_id: &str, amount: f64) -> Result<f64, TradeError> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().timestamp_millis();

        // Conditional decrement: never drives the balance negative.
        let changed = conn.execute(
            "UPDATE accounts SET balance = balance - ?1, updated_at = ?2
             WHERE id = ?3 AND balance >= ?1",
            params![amount, now, account_id],
        )?;

        if changed == 0 {
            let available: Option<f64> = conn
                .query_row(
                    "SELECT balance FROM accounts WHERE id = ?1",
                    params![account_id],
                    |row| row.get(0),
                )
                .ok();

            return match available {
                Some(balance) => Err(TradeError::InsufficientFunds {
                    needed: amount,
                    available: balance,
                }),
                None => Err(TradeError::AccountNotFound(account_id.to_string())),
            };
        }

        let balance: f64 = conn.query_row(
            "SELECT balance FROM accounts WHERE id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;

        Ok(balance)
    }

    fn release_stake(&self, account_id: &str, amount: f64) -> Result<f64, TradeError> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().timestamp_millis();

        let changed = conn.execute(
            "UPDATE accounts SET balance = balance + ?1, updated_at = ?2 WHERE id = ?3",
            params![amount, now, account_id],
        )?;

        if changed == 0 {
            return Err(TradeError::AccountNotFound(account_id.to_string()));
        }

        let balance: f64 = conn.query_row(
            "SELECT balance FROM accounts WHERE id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;

        Ok(balance)
    }

    fn apply_settlement(
        &self,
        account_id: &str,
        stake: f64,
        profit: f64,
        is_win: bool,
    ) -> Result<AccountSnapshot, TradeError> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().timestamp_millis();

        // Stake was debited at creation, so a win credits stake + profit
        // and a loss credits nothing.
        let credit = if is_win { stake + profit } else { 0.0 };
        let win_increment: i64 = if is_win { 1 } else { 0 };

        let changed = conn.execute(
            "UPDATE accounts SET
                balance = balance + ?1,
                total_trades = total_trades + 1,
                winning_trades = winning_trades + ?2,
                total_profit = total_profit + ?3,
                updated_at = ?4
             WHERE id = ?5",
            params![credit, win_increment, profit, now, account_id],
        )?;

        if changed == 0 {
            return Err(TradeError::AccountNotFound(account_id.to_string()));
        }

        let snapshot = conn.query_row(
            "SELECT id, balance, total_trades, winning_trades, total_profit
             FROM accounts WHERE id = ?1",
            params![account_id],
            |row| {
                let total_trades: i64 = row.get(2)?;
                let winning_trades: i64 = row.get(3)?;
                Ok(AccountSnapshot {
                    account_id: row.get(0)?,
                    balance: row.get(1)?,
                    total_trades: total_trades as u64,
                    winning_trades: winning_trades as u64,
                    total_profit: row.get(4)?,
                    win_rate: if total_trades > 0 {
                        winning_trades as f64 / total_trades as f64
                    } else {
                        0.0
                    },
                })
            },
        )?;

        Ok(snapshot)
    }
}

/// Map a trades row to a Trade.
fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<Trade> {
    let direction: String = row.get(3)?;
    let result: Option<String> = row.get(12)?;

    Ok(Trade {
        id: row.get(0)?,
        account_id: row.get(1)?,
        symbol: row.get(2)?,
        direction: parse_direction(&direction).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown direction '{}'", direction).into(),
            )
        })?,
        amount: row.get(4)?,
        duration_secs: row.get(5)?,
        entry_price: row.get(6)?,
        payout_rate: row.get(7)?,
        created_at: row.get(8)?,
        expires_at: row.get(9)?,
        settled: row.get::<_, i64>(10)? != 0,
        exit_price: row.get(11)?,
        result: result.as_deref().and_then(parse_result),
        profit: row.get(13)?,
        settled_at: row.get(14)?,
    })
}

/// Drop unreadable rows with a warning instead of failing the whole query.
fn log_bad_row(row: rusqlite::Result<Trade>) -> Option<Trade> {
    match row {
        Ok(trade) => Some(trade),
        Err(e) => {
            warn!("Skipping unreadable trade record: {}", e);
            None
        }
    }
}

fn parse_direction(s: &str) -> Option<TradeDirection> {
    match s {
        "call" => Some(TradeDirection::Call),
        "put" => Some(TradeDirection::Put),
        _ => None,
    }
}

fn parse_result(s: &str) -> Option<TradeResult> {
    match s {
        "win" => Some(TradeResult::Win),
        "loss" => Some(TradeResult::Loss),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_account(balance: f64) -> (SqliteStore, Account) {
        let store = SqliteStore::new_in_memory().unwrap();
        let account = Account::new(balance);
        store.create_account(&account).unwrap();
        (store, account)
    }

    #[test]
    fn test_account_crud() {
        let (store, account) = store_with_account(10_000.0);

        let loaded = store.get_account(&account.id).unwrap();
        assert_eq!(loaded.id, account.id);
        assert_eq!(loaded.balance, 10_000.0);
        assert_eq!(loaded.total_trades, 0);

        assert!(store.get_account("missing").is_none());
    }

    #[test]
    fn test_trade_roundtrip() {
        let (store, account) = store_with_account(10_000.0);

        let trade = Trade::new(
            account.id.clone(),
            "eurusd".to_string(),
            TradeDirection::Call,
            100.0,
            60,
            1.1000,
            0.80,
        );
        store.create_trade(&trade).unwrap();

        let loaded = store.get_trade(&trade.id).unwrap();
        assert_eq!(loaded.symbol, "eurusd");
        assert_eq!(loaded.direction, TradeDirection::Call);
        assert_eq!(loaded.expires_at, trade.created_at + 60_000);
        assert!(!loaded.settled);
        assert!(loaded.result.is_none());
    }

    #[test]
    fn test_mark_settled_is_conditional() {
        let (store, account) = store_with_account(10_000.0);

        let trade = Trade::new(
            account.id.clone(),
            "btc".to_string(),
            TradeDirection::Put,
            50.0,
            60,
            50_000.0,
            0.85,
        );
        store.create_trade(&trade).unwrap();

        let now = chrono::Utc::now().timestamp_millis();
        let first = store
            .mark_settled(&trade.id, 49_900.0, TradeResult::Win, 42.5, now)
            .unwrap();
        assert!(first);

        // Second attempt loses the race.
        let second = store
            .mark_settled(&trade.id, 51_000.0, TradeResult::Loss, -50.0, now)
            .unwrap();
        assert!(!second);

        // First writer's values stick.
        let loaded = store.get_trade(&trade.id).unwrap();
        assert!(loaded.settled);
        assert_eq!(loaded.exit_price, Some(49_900.0));
        assert_eq!(loaded.result, Some(TradeResult::Win));
        assert_eq!(loaded.profit, Some(42.5));
    }

    #[test]
    fn test_find_pending_excludes_settled() {
        let (store, account) = store_with_account(10_000.0);

        let open = Trade::new(
            account.id.clone(),
            "eurusd".to_string(),
            TradeDirection::Call,
            100.0,
            60,
            1.1,
            0.8,
        );
        let done = Trade::new(
            account.id.clone(),
            "eth".to_string(),
            TradeDirection::Put,
            25.0,
            300,
            3000.0,
            0.85,
        );
        store.create_trade(&open).unwrap();
        store.create_trade(&done).unwrap();
        store
            .mark_settled(
                &done.id,
                2990.0,
                TradeResult::Win,
                21.25,
                chrono::Utc::now().timestamp_millis(),
            )
            .unwrap();

        let pending = store.find_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, open.id);
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn test_reserve_stake_rejects_insufficient_funds() {
        let (store, account) = store_with_account(100.0);

        let balance = store.reserve_stake(&account.id, 60.0).unwrap();
        assert_eq!(balance, 40.0);

        let err = store.reserve_stake(&account.id, 60.0).unwrap_err();
        match err {
            TradeError::InsufficientFunds { needed, available } => {
                assert_eq!(needed, 60.0);
                assert_eq!(available, 40.0);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Balance untouched by the failed reservation.
        assert_eq!(store.get_account(&account.id).unwrap().balance, 40.0);
    }

    #[test]
    fn test_reserve_stake_unknown_account() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert!(matches!(
            store.reserve_stake("nobody", 10.0),
            Err(TradeError::AccountNotFound(_))
        ));
    }

    #[test]
    fn test_apply_settlement_win_returns_stake_plus_profit() {
        let (store, account) = store_with_account(1000.0);

        store.reserve_stake(&account.id, 100.0).unwrap();
        let snapshot = store
            .apply_settlement(&account.id, 100.0, 80.0, true)
            .unwrap();

        assert_eq!(snapshot.balance, 1080.0);
        assert_eq!(snapshot.total_trades, 1);
        assert_eq!(snapshot.winning_trades, 1);
        assert_eq!(snapshot.total_profit, 80.0);
        assert_eq!(snapshot.win_rate, 1.0);
    }

    #[test]
    fn test_apply_settlement_loss_credits_nothing() {
        let (store, account) = store_with_account(1000.0);

        store.reserve_stake(&account.id, 100.0).unwrap();
        let snapshot = store
            .apply_settlement(&account.id, 100.0, -100.0, false)
            .unwrap();

        assert_eq!(snapshot.balance, 900.0);
        assert_eq!(snapshot.total_trades, 1);
        assert_eq!(snapshot.winning_trades, 0);
        assert_eq!(snapshot.total_profit, -100.0);
        assert_eq!(snapshot.win_rate, 0.0);
    }

    #[test]
    fn test_win_rate_over_mixed_outcomes() {
        let (store, account) = store_with_account(10_000.0);

        store.apply_settlement(&account.id, 100.0, 80.0, true).unwrap();
        store.apply_settlement(&account.id, 100.0, -100.0, false).unwrap();
        let snapshot = store.apply_settlement(&account.id, 100.0, 80.0, true).unwrap();

        assert_eq!(snapshot.total_trades, 3);
        assert_eq!(snapshot.winning_trades, 2);
        assert!((snapshot.win_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((snapshot.total_profit - 60.0).abs() < 1e-9);
    }
}
