//! Stale order reconciliation racing a create that is still in flight.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{EventId, OrderId, Sku, UserId};
use domain::{EventType, Order, OrderItem, OrderStatus, OutboxOrderEvent, Stock, StockSeed};
use engine::ReservationEngine;
use order_store::{InMemoryOrderStore, OrderStore, Result};
use stock_ledger::{InMemoryStockLedger, StockLedger};

/// Finishes the pending create of every order it lists (reserve, then
/// `awaiting_payment`) right after listing, before the caller acts on it.
#[derive(Clone)]
struct CreateFinishesAfterListing {
    inner: InMemoryOrderStore,
    stocks: InMemoryStockLedger,
}

#[async_trait]
impl OrderStore for CreateFinishesAfterListing {
    async fn create(&self, user_id: UserId, items: &[OrderItem]) -> Result<OrderId> {
        self.inner.create(user_id, items).await
    }

    async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        self.inner.set_status(order_id, status).await
    }

    async fn set_status_if(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<bool> {
        self.inner.set_status_if(order_id, expected, status).await
    }

    async fn get_by_id(&self, order_id: OrderId) -> Result<Order> {
        self.inner.get_by_id(order_id).await
    }

    async fn get_unsent_outbox_events(&self, limit: usize) -> Result<Vec<OutboxOrderEvent>> {
        self.inner.get_unsent_outbox_events(limit).await
    }

    async fn mark_sent(&self, event_id: EventId) -> Result<()> {
        self.inner.mark_sent(event_id).await
    }

    async fn get_outbox_events_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OutboxOrderEvent>> {
        self.inner.get_outbox_events_for_order(order_id).await
    }

    async fn list_stale(
        &self,
        status: OrderStatus,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Order>> {
        let listed = self.inner.list_stale(status, created_before, limit).await?;
        for order in &listed {
            self.stocks.reserve(&order.items).await.unwrap();
            self.inner
                .set_status(order.id, OrderStatus::AwaitingPayment)
                .await?;
        }
        Ok(listed)
    }
}

#[tokio::test]
async fn order_that_progressed_after_listing_is_not_failed() {
    let sku = Sku::new(10);
    let stocks = InMemoryStockLedger::from_seed(StockSeed::new(vec![Stock::new(sku, 9, 0)]));
    let inner = InMemoryOrderStore::new();
    let orders = CreateFinishesAfterListing {
        inner: inner.clone(),
        stocks: stocks.clone(),
    };
    let engine = ReservationEngine::new(orders, stocks);

    // recorded long ago, reservation still pending
    let order_id = inner
        .create(UserId::new(1), &[OrderItem::new(sku, 1)])
        .await
        .unwrap();
    inner
        .backdate(order_id, Utc::now() - Duration::hours(1))
        .await
        .unwrap();

    let failed = engine
        .fail_stale_orders(Utc::now() - Duration::minutes(5), 100)
        .await
        .unwrap();
    assert_eq!(failed, 0);

    let order = engine.info_order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::AwaitingPayment);

    let events: Vec<EventType> = inner
        .get_outbox_events_for_order(order_id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        events,
        vec![EventType::OrderCreated, EventType::OrderAwaitingPayment]
    );

    // the reservation belongs to a live order and can still be settled
    engine.cancel_order(order_id).await.unwrap();
    assert_eq!(engine.info_stocks(sku).await.unwrap(), 9);
}

#[tokio::test]
async fn order_still_new_after_listing_is_failed() {
    let sku = Sku::new(10);
    let stocks = InMemoryStockLedger::from_seed(StockSeed::new(vec![Stock::new(sku, 9, 0)]));
    let orders = InMemoryOrderStore::new();
    let engine = ReservationEngine::new(orders.clone(), stocks);

    let order_id = orders
        .create(UserId::new(1), &[OrderItem::new(sku, 1)])
        .await
        .unwrap();
    orders
        .backdate(order_id, Utc::now() - Duration::hours(1))
        .await
        .unwrap();

    let failed = engine
        .fail_stale_orders(Utc::now() - Duration::minutes(5), 100)
        .await
        .unwrap();
    assert_eq!(failed, 1);
    assert_eq!(
        engine.info_order(order_id).await.unwrap().status,
        OrderStatus::Failed
    );
    assert_eq!(engine.info_stocks(sku).await.unwrap(), 9);
}
