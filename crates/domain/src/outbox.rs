//! Outbox rows and the broker message built from them.

use chrono::{DateTime, Utc};
use common::{EventId, OrderId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// The kind of order event recorded in the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    OrderCreated,
    OrderAwaitingPayment,
    OrderFailed,
    OrderPayed,
    OrderCancelled,
}

impl EventType {
    /// Every event type.
    pub const ALL: [EventType; 5] = [
        EventType::OrderCreated,
        EventType::OrderAwaitingPayment,
        EventType::OrderFailed,
        EventType::OrderPayed,
        EventType::OrderCancelled,
    ];

    /// Returns the event type name as stored and published.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OrderCreated => "order-created",
            EventType::OrderAwaitingPayment => "order-awaiting-payment",
            EventType::OrderFailed => "order-failed",
            EventType::OrderPayed => "order-payed",
            EventType::OrderCancelled => "order-cancelled",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == s)
            .ok_or_else(|| DomainError::UnknownEventType(s.to_string()))
    }
}

/// A pending (or already relayed) order event.
///
/// Exactly one row is appended per status transition, in the same unit of
/// work as the status write. Rows are never deleted; the relay only flips
/// `sent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxOrderEvent {
    /// Monotonic row identifier; defines relay order.
    pub id: EventId,

    /// The order this event belongs to.
    pub order_id: OrderId,

    /// What happened.
    pub event_type: EventType,

    /// Key consumers deduplicate on. Generated once, when the row is appended.
    pub idempotency_key: Uuid,

    /// When the row was appended.
    pub created_at: DateTime<Utc>,

    /// Whether the relay has published this row.
    pub sent: bool,
}

impl OutboxOrderEvent {
    /// Builds the broker envelope for this row.
    pub fn to_message(&self) -> OrderEventMessage {
        OrderEventMessage {
            order_id: self.order_id,
            id: self.id,
            event: self.event_type,
            idempotent_key: self.idempotency_key,
            moment: self.created_at,
        }
    }

    /// The broker message key: the order id, so every event of one order
    /// lands on the same partition.
    pub fn partition_key(&self) -> String {
        self.order_id.to_string()
    }
}

/// JSON body of a published order event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEventMessage {
    pub order_id: OrderId,
    pub id: EventId,
    pub event: EventType,
    pub idempotent_key: Uuid,
    pub moment: DateTime<Utc>,
}
