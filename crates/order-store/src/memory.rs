use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EventId, OrderId, UserId};
use domain::{EventType, Order, OrderItem, OrderStatus, OutboxOrderEvent};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{OrderStore, Result, StoreError};

#[derive(Debug, Default)]
struct State {
    orders: BTreeMap<OrderId, Order>,
    outbox: Vec<OutboxOrderEvent>,
    last_order_id: i64,
    last_event_id: i64,
}

impl State {
    fn append_outbox(&mut self, order_id: OrderId, event_type: EventType) {
        self.last_event_id += 1;
        self.outbox.push(OutboxOrderEvent {
            id: EventId::new(self.last_event_id),
            order_id,
            event_type,
            idempotency_key: Uuid::new_v4(),
            created_at: Utc::now(),
            sent: false,
        });
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_on_set_status: AtomicBool,
    fail_on_mark_sent: AtomicBool,
}

/// In-memory order store implementation for testing and local runs.
///
/// Orders and the outbox share one lock, so an order write and its outbox
/// row are always applied together.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<State>>,
    faults: Arc<Faults>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `set_status` calls fail without writing anything.
    pub fn set_fail_on_set_status(&self, fail: bool) {
        self.faults.fail_on_set_status.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `mark_sent` calls fail without writing anything.
    pub fn set_fail_on_mark_sent(&self, fail: bool) {
        self.faults.fail_on_mark_sent.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the full outbox, oldest first.
    pub async fn outbox(&self) -> Vec<OutboxOrderEvent> {
        self.state.read().await.outbox.clone()
    }

    /// Overrides an order's creation time. Lets tests age an order past the
    /// stale threshold.
    pub async fn backdate(&self, order_id: OrderId, created_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        order.created_at = created_at;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, user_id: UserId, items: &[OrderItem]) -> Result<OrderId> {
        let mut state = self.state.write().await;

        state.last_order_id += 1;
        let order_id = OrderId::new(state.last_order_id);
        state.orders.insert(
            order_id,
            Order {
                id: order_id,
                user_id,
                status: OrderStatus::New,
                items: items.to_vec(),
                created_at: Utc::now(),
            },
        );
        state.append_outbox(order_id, OrderStatus::New.event_type());

        Ok(order_id)
    }

    async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        if self.faults.fail_on_set_status.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("set_status rejected".to_string()));
        }

        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        order.status = status;
        state.append_outbox(order_id, status.event_type());

        Ok(())
    }

    async fn set_status_if(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<bool> {
        if self.faults.fail_on_set_status.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("set_status rejected".to_string()));
        }

        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        if order.status != expected {
            return Ok(false);
        }
        order.status = status;
        state.append_outbox(order_id, status.event_type());

        Ok(true)
    }

    async fn get_by_id(&self, order_id: OrderId) -> Result<Order> {
        self.state
            .read()
            .await
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(StoreError::OrderNotFound(order_id))
    }

    async fn get_unsent_outbox_events(&self, limit: usize) -> Result<Vec<OutboxOrderEvent>> {
        let state = self.state.read().await;
        Ok(state
            .outbox
            .iter()
            .filter(|e| !e.sent)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_sent(&self, event_id: EventId) -> Result<()> {
        if self.faults.fail_on_mark_sent.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("mark_sent rejected".to_string()));
        }

        let mut state = self.state.write().await;
        if let Some(event) = state.outbox.iter_mut().find(|e| e.id == event_id) {
            event.sent = true;
        }
        Ok(())
    }

    async fn get_outbox_events_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OutboxOrderEvent>> {
        let state = self.state.read().await;
        Ok(state
            .outbox
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_stale(
        &self,
        status: OrderStatus,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.status == status && o.created_at < created_before)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        orders.truncate(limit);
        Ok(orders)
    }
}
