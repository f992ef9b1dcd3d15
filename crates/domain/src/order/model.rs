use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use super::{OrderItem, OrderStatus};

/// An order as held by the order store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Identifier assigned on creation.
    pub id: OrderId,

    /// The user who placed the order.
    pub user_id: UserId,

    /// Current lifecycle status.
    pub status: OrderStatus,

    /// Line items, in the order they were submitted.
    pub items: Vec<OrderItem>,

    /// When the order was recorded.
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Total number of units across all line items.
    pub fn unit_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.count)).sum()
    }
}
