//! Outbox relay.
//!
//! A timer-driven background job drains unsent outbox rows oldest first,
//! publishes each one keyed by its order id, and marks it sent. When an
//! order's event cannot be published (or marked sent), the rest of that
//! order's events in the batch are skipped so nothing is published out of
//! order; they are retried on the next tick. Delivery is at-least-once.

pub mod error;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod publisher;
pub mod relay;

pub use error::PublishError;
#[cfg(feature = "kafka")]
pub use kafka::KafkaPublisher;
pub use publisher::{InMemoryPublisher, PublishedMessage, Publisher};
pub use relay::{BatchReport, OutboxRelay, RelayConfig, RelayStats};
