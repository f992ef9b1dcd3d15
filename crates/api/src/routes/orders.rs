//! Order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use common::{OrderId, UserId};
use domain::OrderItem;
use engine::ReservationEngine;
use order_store::OrderStore;
use serde::{Deserialize, Serialize};
use stock_ledger::StockLedger;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<O, L>
where
    O: OrderStore,
    L: StockLedger,
{
    pub engine: Arc<ReservationEngine<O, L>>,
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user: i64,
    pub items: Vec<ItemPayload>,
}

#[derive(Debug, Deserialize)]
pub struct OrderIdRequest {
    #[serde(rename = "orderID")]
    pub order_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct OrderInfoQuery {
    #[serde(rename = "orderID")]
    pub order_id: i64,
}

// -- Response types --

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ItemPayload {
    pub sku: u32,
    pub count: u32,
}

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    #[serde(rename = "orderID")]
    pub order_id: i64,
}

#[derive(Serialize)]
pub struct OrderInfoResponse {
    pub status: String,
    pub user: i64,
    pub items: Vec<ItemPayload>,
}

#[derive(Serialize)]
pub struct EmptyResponse {}

fn validate_order_id(order_id: i64) -> Result<OrderId, ApiError> {
    if order_id <= 0 {
        return Err(ApiError::BadRequest(format!(
            "orderID must be positive, got {order_id}"
        )));
    }
    Ok(OrderId::new(order_id))
}

fn validate_create(req: &CreateOrderRequest) -> Result<(UserId, Vec<OrderItem>), ApiError> {
    if req.user <= 0 {
        return Err(ApiError::BadRequest(format!(
            "user must be positive, got {}",
            req.user
        )));
    }
    if req.items.is_empty() {
        return Err(ApiError::BadRequest("items must not be empty".to_string()));
    }

    let items: Vec<OrderItem> = req
        .items
        .iter()
        .map(|item| OrderItem::new(item.sku, item.count))
        .collect();
    if let Some(item) = items.iter().find(|item| !item.is_valid()) {
        return Err(ApiError::BadRequest(format!(
            "invalid item: sku {} count {}",
            item.sku, item.count
        )));
    }

    Ok((UserId::new(req.user), items))
}

// -- Handlers --

/// POST /order/create — record an order and reserve its stock.
#[tracing::instrument(skip(state))]
pub async fn create<O, L>(
    State(state): State<Arc<AppState<O, L>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<OrderCreatedResponse>, ApiError>
where
    O: OrderStore + 'static,
    L: StockLedger + 'static,
{
    let (user_id, items) = validate_create(&req)?;
    let order_id = state.engine.create_order(user_id, items).await?;

    Ok(Json(OrderCreatedResponse {
        order_id: order_id.get(),
    }))
}

/// POST /order/pay — commit the reservation and mark the order payed.
#[tracing::instrument(skip(state))]
pub async fn pay<O, L>(
    State(state): State<Arc<AppState<O, L>>>,
    Json(req): Json<OrderIdRequest>,
) -> Result<Json<EmptyResponse>, ApiError>
where
    O: OrderStore + 'static,
    L: StockLedger + 'static,
{
    let order_id = validate_order_id(req.order_id)?;
    state.engine.pay_order(order_id).await?;
    Ok(Json(EmptyResponse {}))
}

/// POST /order/cancel — release the reservation and cancel the order.
#[tracing::instrument(skip(state))]
pub async fn cancel<O, L>(
    State(state): State<Arc<AppState<O, L>>>,
    Json(req): Json<OrderIdRequest>,
) -> Result<Json<EmptyResponse>, ApiError>
where
    O: OrderStore + 'static,
    L: StockLedger + 'static,
{
    let order_id = validate_order_id(req.order_id)?;
    state.engine.cancel_order(order_id).await?;
    Ok(Json(EmptyResponse {}))
}

/// GET /order/info?orderID= — load an order with its items.
#[tracing::instrument(skip(state))]
pub async fn info<O, L>(
    State(state): State<Arc<AppState<O, L>>>,
    Query(query): Query<OrderInfoQuery>,
) -> Result<Json<OrderInfoResponse>, ApiError>
where
    O: OrderStore + 'static,
    L: StockLedger + 'static,
{
    let order_id = validate_order_id(query.order_id)?;
    let order = state.engine.info_order(order_id).await?;

    Ok(Json(OrderInfoResponse {
        status: order.status.to_string(),
        user: order.user_id.get(),
        items: order
            .items
            .iter()
            .map(|item| ItemPayload {
                sku: item.sku.get(),
                count: item.count,
            })
            .collect(),
    }))
}
