//! Order status state machine.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::outbox::EventType;

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// New ──┬──► AwaitingPayment ──┬──► Payed
///       │                      └──► Cancelled
///       └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order has been recorded, stock not yet reserved.
    #[default]
    New,

    /// Stock is reserved, waiting for the customer to pay.
    AwaitingPayment,

    /// Stock could not be reserved (terminal state).
    Failed,

    /// Payment received and reservation committed (terminal state).
    Payed,

    /// Order was cancelled and its reservation released (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::New,
        OrderStatus::AwaitingPayment,
        OrderStatus::Failed,
        OrderStatus::Payed,
        OrderStatus::Cancelled,
    ];

    /// Returns true if the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::New, OrderStatus::AwaitingPayment)
                | (OrderStatus::New, OrderStatus::Failed)
                | (OrderStatus::AwaitingPayment, OrderStatus::Payed)
                | (OrderStatus::AwaitingPayment, OrderStatus::Cancelled)
        )
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Failed | OrderStatus::Payed | OrderStatus::Cancelled
        )
    }

    /// The outbox event recorded when an order enters this status.
    pub fn event_type(&self) -> EventType {
        match self {
            OrderStatus::New => EventType::OrderCreated,
            OrderStatus::AwaitingPayment => EventType::OrderAwaitingPayment,
            OrderStatus::Failed => EventType::OrderFailed,
            OrderStatus::Payed => EventType::OrderPayed,
            OrderStatus::Cancelled => EventType::OrderCancelled,
        }
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::AwaitingPayment => "awaiting_payment",
            OrderStatus::Failed => "failed",
            OrderStatus::Payed => "payed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::UnknownStatus(s.to_string()))
    }
}
