//! API server entry point.

use std::sync::Arc;

use api::StartupError;
use api::config::{Config, LogFormat};
use common::JobHandle;
use engine::{ReservationEngine, StaleOrderSweeper};
use order_store::{InMemoryOrderStore, OrderStore, PostgresOrderStore};
use relay::{InMemoryPublisher, OutboxRelay, RelayStats};
use stock_ledger::{InMemoryStockLedger, PostgresStockLedger, StockLedger};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[cfg(feature = "kafka")]
fn spawn_relay<O>(
    config: &Config,
    orders: O,
    token: CancellationToken,
) -> Result<JobHandle<RelayStats>, StartupError>
where
    O: OrderStore + 'static,
{
    match &config.kafka_brokers {
        Some(brokers) => {
            let publisher = relay::KafkaPublisher::new(
                brokers,
                &config.app_name,
                config.relay_publish_timeout,
            )?;
            Ok(OutboxRelay::new(orders, publisher, config.relay_config()).spawn(token))
        }
        None => {
            tracing::warn!("KAFKA_BROKERS not set, order events are kept in memory");
            Ok(OutboxRelay::new(orders, InMemoryPublisher::new(), config.relay_config()).spawn(token))
        }
    }
}

#[cfg(not(feature = "kafka"))]
fn spawn_relay<O>(
    config: &Config,
    orders: O,
    token: CancellationToken,
) -> Result<JobHandle<RelayStats>, StartupError>
where
    O: OrderStore + 'static,
{
    if config.kafka_brokers.is_some() {
        tracing::warn!("KAFKA_BROKERS is set but the kafka feature is disabled, order events are kept in memory");
    }
    Ok(OutboxRelay::new(orders, InMemoryPublisher::new(), config.relay_config()).spawn(token))
}

async fn serve<O, L>(
    config: Config,
    orders: O,
    stocks: L,
    metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
) -> Result<(), StartupError>
where
    O: OrderStore + Clone + 'static,
    L: StockLedger + 'static,
{
    let shutdown = CancellationToken::new();
    let engine = Arc::new(ReservationEngine::new(orders.clone(), stocks));

    let relay_job = spawn_relay(&config, orders, shutdown.child_token())?;
    let sweeper_job = StaleOrderSweeper::new(engine.clone(), config.sweeper_config())
        .spawn(shutdown.child_token());

    let app = api::create_app(api::create_state(engine), metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(StartupError::Server)?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Server)?;

    tracing::info!("http server stopped, stopping background jobs");

    match relay_job.shutdown().await {
        Ok(stats) => tracing::info!(?stats, "outbox relay stopped"),
        Err(e) => tracing::error!(error = %e, "outbox relay task failed"),
    }
    match sweeper_job.shutdown().await {
        Ok(stats) => tracing::info!(?stats, "stale order sweeper stopped"),
        Err(e) => tracing::error!(error = %e, "stale order sweeper task failed"),
    }
    shutdown.cancel();

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    api::routes::metrics::describe();

    // 3. Load the stock catalogue
    let seed = api::load_seed(config.stock_seed_path.as_deref())?;

    // 4. Create stores and serve
    match config.database_url.clone() {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(&url)
                .await?;

            let orders = PostgresOrderStore::new(pool.clone());
            orders.run_migrations().await?;

            let stocks = PostgresStockLedger::new(pool);
            stocks.seed(&seed).await?;

            tracing::info!(skus = seed.len(), "using PostgreSQL stores");
            serve(config, orders, stocks, metrics_handle).await
        }
        None => {
            tracing::info!(skus = seed.len(), "using in-memory stores");
            let stocks = InMemoryStockLedger::from_seed(seed);
            serve(config, InMemoryOrderStore::new(), stocks, metrics_handle).await
        }
    }
}
