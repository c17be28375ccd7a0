//! Trading API
//!
//! Accounts:
//! - POST /api/trading/accounts - Create a demo account
//! - GET /api/trading/accounts/:id - Get account balance and statistics
//!
//! Trades:
//! - POST /api/trading/trades - Place a CALL/PUT wager
//! - GET /api/trading/trades/:id - Get a single trade
//! - GET /api/trading/trades?accountId=&limit= - Trade history, newest first

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::services::TradeError;
use crate::types::{Account, AccountSnapshot, PlaceTradeRequest, Trade};
use crate::AppState;

/// Create trading router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/accounts", post(create_account))
        .route("/accounts/:id", get(get_account))
        .route("/trades", post(place_trade))
        .route("/trades", get(list_trades))
        .route("/trades/:id", get(get_trade))
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Convert TradeError to HTTP response.
impl IntoResponse for TradeError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            TradeError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
            TradeError::TradeNotFound(_) => (StatusCode::NOT_FOUND, "TRADE_NOT_FOUND"),
            TradeError::AssetNotFound(_) => (StatusCode::NOT_FOUND, "ASSET_NOT_FOUND"),
            TradeError::AssetInactive(_) => (StatusCode::BAD_REQUEST, "ASSET_INACTIVE"),
            TradeError::InvalidAmount { .. } => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
            TradeError::InvalidDuration(_) => (StatusCode::BAD_REQUEST, "INVALID_DURATION"),
            TradeError::InsufficientFunds { .. } => {
                (StatusCode::BAD_REQUEST, "INSUFFICIENT_FUNDS")
            }
            TradeError::NoPriceData(_) => (StatusCode::SERVICE_UNAVAILABLE, "NO_PRICE_DATA"),
            TradeError::DatabaseError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR")
            }
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

// =============================================================================
// Account Handlers
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    /// Override the configured starting balance (demo convenience).
    pub starting_balance: Option<f64>,
}

/// POST /api/trading/accounts
async fn create_account(
    State(state): State<AppState>,
    request: Option<Json<CreateAccountRequest>>,
) -> Result<Json<ApiResponse<Account>>, TradeError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let balance = request
        .starting_balance
        .unwrap_or(state.config.starting_balance);

    let account = Account::new(balance);
    state.store.create_account(&account)?;

    Ok(Json(ApiResponse { data: account }))
}

/// GET /api/trading/accounts/:id
async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<AccountSnapshot>>, TradeError> {
    let account = state
        .store
        .get_account(&id)
        .ok_or_else(|| TradeError::AccountNotFound(id))?;

    Ok(Json(ApiResponse {
        data: account.snapshot(),
    }))
}

// =============================================================================
// Trade Handlers
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTradesQuery {
    pub account_id: String,
    pub limit: Option<usize>,
}

/// POST /api/trading/trades
async fn place_trade(
    State(state): State<AppState>,
    Json(request): Json<PlaceTradeRequest>,
) -> Result<Json<ApiResponse<Trade>>, TradeError> {
    let trade = state.scheduler.place_trade(request)?;
    Ok(Json(ApiResponse { data: trade }))
}

/// GET /api/trading/trades/:id
async fn get_trade(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Trade>>, TradeError> {
    use crate::services::TradeStore;

    let trade = state
        .store
        .get_trade(&id)
        .ok_or_else(|| TradeError::TradeNotFound(id))?;

    Ok(Json(ApiResponse { data: trade }))
}

/// GET /api/trading/trades?accountId=&limit=
async fn list_trades(
    State(state): State<AppState>,
    Query(query): Query<ListTradesQuery>,
) -> Json<ApiResponse<Vec<Trade>>> {
    let limit = query.limit.unwrap_or(100).min(500);
    let trades = state.store.get_account_trades(&query.account_id, limit);
    Json(ApiResponse { data: trades })
}
