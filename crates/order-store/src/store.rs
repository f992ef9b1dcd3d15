use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EventId, OrderId, UserId};
use domain::{Order, OrderItem, OrderStatus, OutboxOrderEvent};

use crate::Result;

/// Core trait for order store implementations.
///
/// The store owns orders, their items and the outbox. Every status write
/// appends the matching outbox row atomically with it, so a committed status
/// change can never be missing its event. Writes to one order are serialized;
/// writes to different orders may run concurrently.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts an order in status `new` with its items and appends an
    /// `order-created` outbox event, atomically.
    ///
    /// Returns the id assigned to the new order.
    async fn create(&self, user_id: UserId, items: &[OrderItem]) -> Result<OrderId>;

    /// Updates the order's status and appends the outbox event mapped from
    /// the new status, atomically.
    ///
    /// Fails with `OrderNotFound` if the order doesn't exist. The transition
    /// itself is not validated here.
    async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()>;

    /// Like [`set_status`](Self::set_status), but only when the order is
    /// currently in `expected`.
    ///
    /// Returns `false` and writes nothing (no status, no outbox row) when the
    /// order has already moved on. Fails with `OrderNotFound` if the order
    /// doesn't exist.
    async fn set_status_if(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<bool>;

    /// Loads an order with its items.
    ///
    /// Fails with `OrderNotFound` if the order doesn't exist.
    async fn get_by_id(&self, order_id: OrderId) -> Result<Order>;

    /// Returns up to `limit` unsent outbox events across all orders, oldest
    /// first.
    async fn get_unsent_outbox_events(&self, limit: usize) -> Result<Vec<OutboxOrderEvent>>;

    /// Marks an outbox event as sent. Marking an already sent event is a no-op.
    async fn mark_sent(&self, event_id: EventId) -> Result<()>;

    /// Returns every outbox event (sent or not) of one order, oldest first.
    async fn get_outbox_events_for_order(&self, order_id: OrderId)
    -> Result<Vec<OutboxOrderEvent>>;

    /// Returns up to `limit` orders in `status` created before
    /// `created_before`, oldest first.
    async fn list_stale(
        &self,
        status: OrderStatus,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Order>>;
}
