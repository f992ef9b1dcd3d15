//! HTTP API server for order reservation.
//!
//! Exposes the reservation engine over JSON endpoints, with structured
//! logging (tracing) and Prometheus metrics. The binary also runs the outbox
//! relay and the stale order sweeper next to the server.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::StockSeed;
use engine::ReservationEngine;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{OrderStore, StoreError};
use relay::PublishError;
use stock_ledger::{LedgerError, StockLedger};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Errors that abort server startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to connect to database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("order store error: {0}")]
    Store(#[from] StoreError),

    #[error("stock ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("failed to read stock seed: {0}")]
    SeedFile(std::io::Error),

    #[error("publisher error: {0}")]
    Publisher(#[from] PublishError),

    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("server error: {0}")]
    Server(std::io::Error),
}

/// Loads the stock catalogue from `path`, or the bundled one when unset.
pub fn load_seed(path: Option<&std::path::Path>) -> Result<StockSeed, StartupError> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(StartupError::SeedFile)?;
            Ok(StockSeed::from_json(&json).map_err(LedgerError::from)?)
        }
        None => Ok(stock_ledger::default_seed()?),
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<O, L>(state: Arc<AppState<O, L>>, metrics_handle: PrometheusHandle) -> Router
where
    O: OrderStore + 'static,
    L: StockLedger + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/order/create", post(routes::orders::create::<O, L>))
        .route("/order/pay", post(routes::orders::pay::<O, L>))
        .route("/order/cancel", post(routes::orders::cancel::<O, L>))
        .route("/order/info", get(routes::orders::info::<O, L>))
        .route("/stock/info", get(routes::stocks::info::<O, L>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wraps an engine into shared handler state.
pub fn create_state<O, L>(engine: Arc<ReservationEngine<O, L>>) -> Arc<AppState<O, L>>
where
    O: OrderStore,
    L: StockLedger,
{
    Arc::new(AppState { engine })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_seed_when_no_path() {
        let seed = load_seed(None).unwrap();
        assert!(!seed.is_empty());
    }

    #[test]
    fn missing_seed_file() {
        let result = load_seed(Some(std::path::Path::new("/nonexistent/stock-data.json")));
        assert!(matches!(result, Err(StartupError::SeedFile(_))));
    }
}
