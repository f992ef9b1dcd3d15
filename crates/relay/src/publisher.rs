//! Broker publisher trait and in-memory implementation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use domain::OrderEventMessage;
use tokio::sync::RwLock;

use crate::error::PublishError;

/// At-least-once send of one order event to the broker.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `message` to `topic` under `key`. Returns once the broker
    /// has acknowledged the message.
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        message: &OrderEventMessage,
    ) -> Result<(), PublishError>;
}

/// A message accepted by the [`InMemoryPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub key: String,
    pub message: OrderEventMessage,
    /// The JSON body a broker would have received.
    pub body: Vec<u8>,
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    messages: Vec<PublishedMessage>,
    failing_orders: HashSet<OrderId>,
    fail_all: bool,
    delay: Option<Duration>,
}

/// Publisher that keeps messages in memory.
///
/// Used in tests and when no broker is configured. Failures and slow acks
/// can be injected per order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryPublisher {
    /// Creates a new in-memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every publish for `order_id` fail until [`recover`](Self::recover).
    pub async fn fail_for(&self, order_id: OrderId) {
        self.state.write().await.failing_orders.insert(order_id);
    }

    /// Lets publishes for `order_id` succeed again.
    pub async fn recover(&self, order_id: OrderId) {
        self.state.write().await.failing_orders.remove(&order_id);
    }

    /// Configures the publisher to fail every publish.
    pub async fn set_fail_all(&self, fail: bool) {
        self.state.write().await.fail_all = fail;
    }

    /// Delays every acknowledgement by `delay`.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().await.delay = delay;
    }

    /// Returns every message published so far, in publish order.
    pub async fn messages(&self) -> Vec<PublishedMessage> {
        self.state.read().await.messages.clone()
    }

    /// Returns the number of messages published so far.
    pub async fn message_count(&self) -> usize {
        self.state.read().await.messages.len()
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        message: &OrderEventMessage,
    ) -> Result<(), PublishError> {
        let delay = self.state.read().await.delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        if state.fail_all || state.failing_orders.contains(&message.order_id) {
            return Err(PublishError::Broker {
                topic: topic.to_string(),
                reason: format!("publish rejected for order {}", message.order_id),
            });
        }

        let body = serde_json::to_vec(message)?;
        state.messages.push(PublishedMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            message: message.clone(),
            body,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::EventId;
    use domain::EventType;
    use uuid::Uuid;

    fn message(order_id: i64) -> OrderEventMessage {
        OrderEventMessage {
            order_id: OrderId::new(order_id),
            id: EventId::new(1),
            event: EventType::OrderCreated,
            idempotent_key: Uuid::new_v4(),
            moment: Utc::now(),
        }
    }

    #[tokio::test]
    async fn records_published_messages() {
        let publisher = InMemoryPublisher::new();

        publisher
            .publish("loms.order-events", "1", &message(1))
            .await
            .unwrap();

        let messages = publisher.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "loms.order-events");
        assert_eq!(messages[0].key, "1");

        let body: serde_json::Value = serde_json::from_slice(&messages[0].body).unwrap();
        assert_eq!(body["event"], "order-created");
    }

    #[tokio::test]
    async fn injected_failures_per_order() {
        let publisher = InMemoryPublisher::new();
        publisher.fail_for(OrderId::new(2)).await;

        assert!(publisher.publish("t", "1", &message(1)).await.is_ok());
        assert!(matches!(
            publisher.publish("t", "2", &message(2)).await,
            Err(PublishError::Broker { .. })
        ));

        publisher.recover(OrderId::new(2)).await;
        assert!(publisher.publish("t", "2", &message(2)).await.is_ok());
        assert_eq!(publisher.message_count().await, 2);
    }

    #[tokio::test]
    async fn fail_all() {
        let publisher = InMemoryPublisher::new();
        publisher.set_fail_all(true).await;
        assert!(publisher.publish("t", "1", &message(1)).await.is_err());
        assert_eq!(publisher.message_count().await, 0);
    }
}
