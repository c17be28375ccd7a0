//! Market API
//!
//! - GET /api/market/assets - Asset catalog with payout rates and bounds
//! - GET /api/market/price/:symbol - Latest cached price for a symbol

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::types::Asset;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/assets", get(list_assets))
        .route("/price/:symbol", get(get_price))
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub symbol: String,
    pub price: f64,
}

/// GET /api/market/assets
async fn list_assets(State(state): State<AppState>) -> Json<ApiResponse<Vec<Asset>>> {
    Json(ApiResponse {
        data: state.asset_service.list(),
    })
}

/// GET /api/market/price/:symbol
async fn get_price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<PriceResponse>>> {
    let price = state
        .price_cache
        .latest(&symbol)
        .ok_or_else(|| AppError::NotFound(format!("No price data for {}", symbol)))?;

    Ok(Json(ApiResponse {
        data: PriceResponse {
            symbol: symbol.to_lowercase(),
            price,
        },
    }))
}
