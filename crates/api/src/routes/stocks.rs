//! Stock availability endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use common::Sku;
use order_store::OrderStore;
use serde::{Deserialize, Serialize};
use stock_ledger::StockLedger;

use crate::error::ApiError;
use crate::routes::orders::AppState;

#[derive(Debug, Deserialize)]
pub struct StockInfoQuery {
    pub sku: u32,
}

#[derive(Serialize)]
pub struct StockInfoResponse {
    pub count: u64,
}

/// GET /stock/info?sku= — units of a SKU available for reservation.
#[tracing::instrument(skip(state))]
pub async fn info<O, L>(
    State(state): State<Arc<AppState<O, L>>>,
    Query(query): Query<StockInfoQuery>,
) -> Result<Json<StockInfoResponse>, ApiError>
where
    O: OrderStore + 'static,
    L: StockLedger + 'static,
{
    if query.sku == 0 {
        return Err(ApiError::BadRequest("sku must be positive".to_string()));
    }

    let count = state.engine.info_stocks(Sku::new(query.sku)).await?;
    Ok(Json(StockInfoResponse { count }))
}
