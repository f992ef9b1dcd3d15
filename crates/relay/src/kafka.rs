//! Kafka publisher backed by an rdkafka `FutureProducer`.

use std::time::Duration;

use async_trait::async_trait;
use domain::OrderEventMessage;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use crate::error::PublishError;
use crate::publisher::Publisher;

/// Header carrying the name of the publishing application.
pub const APP_NAME_HEADER: &str = "app-name";

/// Publishes order events to Kafka.
///
/// The producer is idempotent, waits for all in-sync replicas, and keeps a
/// single request in flight per connection so retries cannot reorder one
/// order's events within a partition.
pub struct KafkaPublisher {
    producer: FutureProducer,
    app_name: String,
    timeout: Duration,
}

impl KafkaPublisher {
    /// Creates a producer connected to `brokers` (comma separated).
    pub fn new(brokers: &str, app_name: &str, timeout: Duration) -> Result<Self, PublishError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("max.in.flight.requests.per.connection", "1")
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .create()
            .map_err(|e| PublishError::Config(format!("failed to create producer: {e}")))?;

        tracing::info!(%brokers, app_name, "kafka publisher created");

        Ok(Self {
            producer,
            app_name: app_name.to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        message: &OrderEventMessage,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(message)?;
        let headers = OwnedHeaders::new().insert(Header {
            key: APP_NAME_HEADER,
            value: Some(self.app_name.as_str()),
        });

        let record = FutureRecord::to(topic)
            .payload(&payload)
            .key(key)
            .headers(headers);

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                tracing::debug!(
                    topic,
                    partition,
                    offset,
                    order_id = %message.order_id,
                    event = %message.event,
                    "order event published"
                );
                Ok(())
            }
            Err((kafka_error, _)) => Err(PublishError::Broker {
                topic: topic.to_string(),
                reason: kafka_error.to_string(),
            }),
        }
    }
}
