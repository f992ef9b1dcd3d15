use std::collections::HashSet;
use std::time::Duration;

use common::{JobHandle, OrderId};
use domain::OutboxOrderEvent;
use order_store::{OrderStore, StoreError};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_util::sync::CancellationToken;

use crate::error::PublishError;
use crate::publisher::Publisher;

/// Relay timing, batching and destination.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Broker topic order events are published to.
    pub topic: String,
    /// Time between batches. The first batch runs one interval after start.
    pub interval: Duration,
    /// Unsent events read per batch.
    pub batch_size: usize,
    /// Upper bound on a single publish.
    pub publish_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            topic: "loms.order-events".to_string(),
            interval: Duration::from_secs(3),
            batch_size: 500,
            publish_timeout: Duration::from_secs(5),
        }
    }
}

/// Outcome of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Events the broker acknowledged.
    pub published: usize,
    /// Events whose publish failed or timed out.
    pub failed: usize,
    /// Events not attempted because an earlier event of the same order
    /// failed in this batch.
    pub skipped: usize,
    /// Published events that could not be marked sent. They will be
    /// published again.
    pub mark_failed: usize,
}

/// Totals across every batch a spawned relay ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub batches: u64,
    pub published: u64,
    pub failed: u64,
    pub skipped: u64,
    pub mark_failed: u64,
    /// Batches that could not read the outbox at all.
    pub read_errors: u64,
}

impl RelayStats {
    fn record(&mut self, report: &BatchReport) {
        self.batches += 1;
        self.published += report.published as u64;
        self.failed += report.failed as u64;
        self.skipped += report.skipped as u64;
        self.mark_failed += report.mark_failed as u64;
    }
}

/// Drains the outbox into the broker.
pub struct OutboxRelay<S, P>
where
    S: OrderStore,
    P: Publisher,
{
    store: S,
    publisher: P,
    config: RelayConfig,
}

impl<S, P> OutboxRelay<S, P>
where
    S: OrderStore + 'static,
    P: Publisher + 'static,
{
    /// Creates a relay reading from `store` and sending through `publisher`.
    pub fn new(store: S, publisher: P, config: RelayConfig) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Processes one batch of unsent events, oldest first.
    ///
    /// Only a failure to read the outbox is returned as an error; publish
    /// and mark-sent failures are counted in the report and retried on the
    /// next batch.
    pub async fn run_once(&self) -> Result<BatchReport, StoreError> {
        let start = std::time::Instant::now();
        let events = self
            .store
            .get_unsent_outbox_events(self.config.batch_size)
            .await?;

        tracing::debug!(count = events.len(), "outbox batch started");

        let mut failed_orders: HashSet<OrderId> = HashSet::new();
        let mut report = BatchReport::default();

        for event in &events {
            if failed_orders.contains(&event.order_id) {
                report.skipped += 1;
                metrics::counter!("outbox_events_skipped_total").increment(1);
                continue;
            }

            if let Err(e) = self.publish(event).await {
                tracing::error!(
                    order_id = %event.order_id,
                    event_id = %event.id,
                    event_type = %event.event_type,
                    topic = %self.config.topic,
                    error = %e,
                    "failed to publish order event"
                );
                failed_orders.insert(event.order_id);
                report.failed += 1;
                metrics::counter!("outbox_publish_failures_total").increment(1);
                continue;
            }

            report.published += 1;
            metrics::counter!("outbox_events_published_total").increment(1);

            if let Err(e) = self.store.mark_sent(event.id).await {
                tracing::error!(
                    order_id = %event.order_id,
                    event_id = %event.id,
                    error = %e,
                    "failed to mark order event sent"
                );
                failed_orders.insert(event.order_id);
                report.mark_failed += 1;
            }
        }

        metrics::histogram!("outbox_batch_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        tracing::debug!(?report, "outbox batch finished");

        Ok(report)
    }

    async fn publish(&self, event: &OutboxOrderEvent) -> Result<(), PublishError> {
        let message = event.to_message();
        let key = event.partition_key();
        let topic = &self.config.topic;
        let after = self.config.publish_timeout;

        match timeout(after, self.publisher.publish(topic, &key, &message)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout {
                topic: topic.clone(),
                after,
            }),
        }
    }

    /// Starts relaying on a background task until `token` is cancelled.
    ///
    /// Cancellation is observed between batches; a batch in progress
    /// always completes.
    pub fn spawn(self, token: CancellationToken) -> JobHandle<RelayStats> {
        let handle = tokio::spawn(self.run(token.clone()));
        JobHandle::new(token, handle)
    }

    async fn run(self, token: CancellationToken) -> RelayStats {
        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = RelayStats::default();

        tracing::info!(
            topic = %self.config.topic,
            interval_ms = period.as_millis() as u64,
            batch_size = self.config.batch_size,
            "outbox relay started"
        );

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    tracing::info!(?stats, "outbox relay received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) => stats.record(&report),
                        Err(e) => {
                            stats.read_errors += 1;
                            tracing::error!(error = %e, "failed to read outbox");
                        }
                    }
                }
            }
        }

        stats
    }
}
