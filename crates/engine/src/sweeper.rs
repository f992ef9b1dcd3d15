//! Periodic job that fails orders stuck in `new`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::JobHandle;
use order_store::OrderStore;
use stock_ledger::StockLedger;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::{ReservationEngine, Result};

/// Sweeper timing and batch limits.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between sweeps. The first sweep runs one interval after start.
    pub interval: Duration,
    /// Age after which an order still in `new` is failed.
    pub stale_after: chrono::Duration,
    /// Orders failed per sweep at most.
    pub batch_size: usize,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            stale_after: chrono::Duration::minutes(5),
            batch_size: 500,
        }
    }
}

/// Totals reported when the sweeper stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub sweeps: u64,
    pub failed_orders: u64,
    pub errors: u64,
}

/// Fails orders the engine recorded but never reserved stock for.
pub struct StaleOrderSweeper<O, L>
where
    O: OrderStore,
    L: StockLedger,
{
    engine: Arc<ReservationEngine<O, L>>,
    config: SweeperConfig,
}

impl<O, L> StaleOrderSweeper<O, L>
where
    O: OrderStore + 'static,
    L: StockLedger + 'static,
{
    pub fn new(engine: Arc<ReservationEngine<O, L>>, config: SweeperConfig) -> Self {
        Self { engine, config }
    }

    /// Runs a single sweep. Returns how many orders were failed.
    pub async fn sweep_once(&self) -> Result<usize> {
        let cutoff = Utc::now()
            .checked_sub_signed(self.config.stale_after)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.engine
            .fail_stale_orders(cutoff, self.config.batch_size)
            .await
    }

    /// Starts sweeping on a background task until `token` is cancelled.
    pub fn spawn(self, token: CancellationToken) -> JobHandle<SweepStats> {
        let handle = tokio::spawn(self.run(token.clone()));
        JobHandle::new(token, handle)
    }

    async fn run(self, token: CancellationToken) -> SweepStats {
        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = SweepStats::default();

        tracing::info!(interval_ms = period.as_millis() as u64, "stale order sweeper started");

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    tracing::info!(?stats, "stale order sweeper received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    stats.sweeps += 1;
                    match self.sweep_once().await {
                        Ok(0) => tracing::debug!("no stale orders"),
                        Ok(count) => {
                            stats.failed_orders += count as u64;
                            tracing::info!(count, "failed stale orders");
                        }
                        Err(e) => {
                            stats.errors += 1;
                            tracing::error!(error = %e, "stale order sweep failed");
                        }
                    }
                }
            }
        }

        stats
    }
}
