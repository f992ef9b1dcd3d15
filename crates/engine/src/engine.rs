//! Order lifecycle orchestration.

use chrono::{DateTime, Utc};
use common::{OrderId, Sku, UserId};
use domain::{Order, OrderItem, OrderStatus};
use order_store::OrderStore;
use stock_ledger::StockLedger;

use crate::error::Result;

/// Orchestrates the order store and the stock ledger.
///
/// No retries happen here. A failed stock reservation is recorded as a
/// `failed` order; every other failure propagates unchanged.
pub struct ReservationEngine<O, L>
where
    O: OrderStore,
    L: StockLedger,
{
    orders: O,
    stocks: L,
}

impl<O, L> ReservationEngine<O, L>
where
    O: OrderStore,
    L: StockLedger,
{
    /// Creates a new engine over the given stores.
    pub fn new(orders: O, stocks: L) -> Self {
        Self { orders, stocks }
    }

    /// The order store.
    pub fn orders(&self) -> &O {
        &self.orders
    }

    /// The stock ledger.
    pub fn stocks(&self) -> &L {
        &self.stocks
    }

    /// Records a new order and reserves stock for it.
    ///
    /// When the reservation fails the order is moved to `failed` and the
    /// ledger's error is returned; otherwise the order moves to
    /// `awaiting_payment`.
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn create_order(&self, user_id: UserId, items: Vec<OrderItem>) -> Result<OrderId> {
        let order_id = self.orders.create(user_id, &items).await?;
        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(%order_id, "order created");

        if let Err(err) = self.stocks.reserve(&items).await {
            tracing::warn!(%order_id, error = %err, "stock reservation failed");
            self.orders.set_status(order_id, OrderStatus::Failed).await?;
            metrics::counter!("orders_failed_total").increment(1);
            return Err(err.into());
        }

        self.orders
            .set_status(order_id, OrderStatus::AwaitingPayment)
            .await?;
        tracing::info!(%order_id, "stock reserved, awaiting payment");

        Ok(order_id)
    }

    /// Commits the order's reservation and marks it `payed`.
    #[tracing::instrument(skip(self))]
    pub async fn pay_order(&self, order_id: OrderId) -> Result<()> {
        let order = self.orders.get_by_id(order_id).await?;
        warn_off_machine(&order, OrderStatus::Payed);

        self.stocks.commit_reservation(&order.items).await?;
        self.orders.set_status(order_id, OrderStatus::Payed).await?;

        metrics::counter!("orders_payed_total").increment(1);
        tracing::info!(%order_id, "order payed");
        Ok(())
    }

    /// Releases the order's reservation and marks it `cancelled`.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<()> {
        let order = self.orders.get_by_id(order_id).await?;
        warn_off_machine(&order, OrderStatus::Cancelled);

        self.stocks.release_reservation(&order.items).await?;
        self.orders
            .set_status(order_id, OrderStatus::Cancelled)
            .await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(%order_id, "order cancelled");
        Ok(())
    }

    /// Loads an order with its items.
    #[tracing::instrument(skip(self))]
    pub async fn info_order(&self, order_id: OrderId) -> Result<Order> {
        Ok(self.orders.get_by_id(order_id).await?)
    }

    /// Units of `sku` currently available for reservation.
    #[tracing::instrument(skip(self))]
    pub async fn info_stocks(&self, sku: Sku) -> Result<u64> {
        Ok(self.stocks.available_count(sku).await?)
    }

    /// Fails up to `limit` orders still in `new` that were created before
    /// `older_than`. Returns how many were failed.
    ///
    /// An order stays in `new` only if the process stopped between recording
    /// it and reserving its stock, so it holds no reservation to release.
    #[tracing::instrument(skip(self))]
    pub async fn fail_stale_orders(&self, older_than: DateTime<Utc>, limit: usize) -> Result<usize> {
        let stale = self
            .orders
            .list_stale(OrderStatus::New, older_than, limit)
            .await?;

        let mut failed = 0;
        for order in &stale {
            // The order may have progressed since it was listed.
            let moved = self
                .orders
                .set_status_if(order.id, OrderStatus::New, OrderStatus::Failed)
                .await?;
            if !moved {
                tracing::debug!(order_id = %order.id, "stale order progressed before it was failed");
                continue;
            }
            failed += 1;
            metrics::counter!("orders_failed_total").increment(1);
            tracing::warn!(order_id = %order.id, created_at = %order.created_at, "stale order failed");
        }

        Ok(failed)
    }
}

fn warn_off_machine(order: &Order, next: OrderStatus) {
    if !order.status.can_transition_to(next) {
        tracing::warn!(
            order_id = %order.id,
            from = %order.status,
            to = %next,
            "transition not allowed by the order state machine"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use domain::{EventType, Stock, StockSeed};
    use order_store::InMemoryOrderStore;
    use stock_ledger::InMemoryStockLedger;

    fn engine() -> ReservationEngine<InMemoryOrderStore, InMemoryStockLedger> {
        let ledger = InMemoryStockLedger::from_seed(StockSeed::new(vec![
            Stock::new(1076963, 9, 0),
            Stock::new(1148162, 100, 0),
            Stock::new(2956315, 300, 30),
        ]));
        ReservationEngine::new(InMemoryOrderStore::new(), ledger)
    }

    async fn event_types(
        engine: &ReservationEngine<InMemoryOrderStore, InMemoryStockLedger>,
        order_id: OrderId,
    ) -> Vec<EventType> {
        engine
            .orders()
            .get_outbox_events_for_order(order_id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    #[tokio::test]
    async fn create_order_reserves_and_awaits_payment() {
        let engine = engine();

        let order_id = engine
            .create_order(UserId::new(31337), vec![OrderItem::new(1076963, 1)])
            .await
            .unwrap();

        let order = engine.info_order(order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::AwaitingPayment);
        assert_eq!(
            engine.stocks().get_stock(Sku::new(1076963)).await.unwrap(),
            Stock::new(1076963, 9, 1)
        );
        assert_eq!(
            event_types(&engine, order_id).await,
            vec![EventType::OrderCreated, EventType::OrderAwaitingPayment]
        );
    }

    #[tokio::test]
    async fn create_order_with_reserved_sku_fails_order() {
        let engine = engine();

        let err = engine
            .create_order(UserId::new(1), vec![OrderItem::new(2956315, 1)])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        let order = engine.info_order(OrderId::new(1)).await.unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(
            event_types(&engine, order.id).await,
            vec![EventType::OrderCreated, EventType::OrderFailed]
        );
    }

    #[tokio::test]
    async fn create_order_with_unknown_sku_is_not_found() {
        let engine = engine();

        let err = engine
            .create_order(UserId::new(1), vec![OrderItem::new(404, 1)])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        let order = engine.info_order(OrderId::new(1)).await.unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn ledger_outage_fails_order_as_internal() {
        let engine = engine();
        engine.stocks().set_fail_on_reserve(true);

        let err = engine
            .create_order(UserId::new(1), vec![OrderItem::new(1076963, 1)])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
        let order = engine.info_order(OrderId::new(1)).await.unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn pay_commits_reservation() {
        let engine = engine();
        let order_id = engine
            .create_order(UserId::new(31337), vec![OrderItem::new(1076963, 1)])
            .await
            .unwrap();

        engine.pay_order(order_id).await.unwrap();

        assert_eq!(
            engine.info_order(order_id).await.unwrap().status,
            OrderStatus::Payed
        );
        assert_eq!(
            engine.stocks().get_stock(Sku::new(1076963)).await.unwrap(),
            Stock::new(1076963, 8, 0)
        );
        assert_eq!(engine.info_stocks(Sku::new(1076963)).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn cancel_releases_reservation() {
        let engine = engine();
        let order_id = engine
            .create_order(UserId::new(1), vec![OrderItem::new(1148162, 5)])
            .await
            .unwrap();

        engine.cancel_order(order_id).await.unwrap();

        assert_eq!(
            engine.info_order(order_id).await.unwrap().status,
            OrderStatus::Cancelled
        );
        assert_eq!(engine.info_stocks(Sku::new(1148162)).await.unwrap(), 100);
        assert_eq!(
            event_types(&engine, order_id).await,
            vec![
                EventType::OrderCreated,
                EventType::OrderAwaitingPayment,
                EventType::OrderCancelled
            ]
        );
    }

    #[tokio::test]
    async fn pay_and_cancel_missing_order() {
        let engine = engine();

        let pay = engine.pay_order(OrderId::new(77)).await.unwrap_err();
        let cancel = engine.cancel_order(OrderId::new(77)).await.unwrap_err();

        assert_eq!(pay.kind(), ErrorKind::NotFound);
        assert_eq!(cancel.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn status_write_failure_is_internal() {
        let engine = engine();
        let order_id = engine
            .create_order(UserId::new(1), vec![OrderItem::new(1076963, 2)])
            .await
            .unwrap();
        engine.orders().set_fail_on_set_status(true);

        let err = engine.pay_order(order_id).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn info_stocks_unknown_sku() {
        let engine = engine();
        let err = engine.info_stocks(Sku::new(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn fail_stale_orders_only_touches_old_new_orders() {
        let engine = engine();
        let stuck = engine
            .orders()
            .create(UserId::new(1), &[OrderItem::new(1076963, 1)])
            .await
            .unwrap();
        let recent = engine
            .orders()
            .create(UserId::new(2), &[OrderItem::new(1076963, 1)])
            .await
            .unwrap();
        let progressed = engine
            .create_order(UserId::new(3), vec![OrderItem::new(1148162, 1)])
            .await
            .unwrap();

        let long_ago = Utc::now() - chrono::Duration::hours(1);
        engine.orders().backdate(stuck, long_ago).await.unwrap();
        engine.orders().backdate(progressed, long_ago).await.unwrap();

        let failed = engine
            .fail_stale_orders(Utc::now() - chrono::Duration::minutes(5), 100)
            .await
            .unwrap();

        assert_eq!(failed, 1);
        assert_eq!(
            engine.info_order(stuck).await.unwrap().status,
            OrderStatus::Failed
        );
        assert_eq!(
            engine.info_order(recent).await.unwrap().status,
            OrderStatus::New
        );
        assert_eq!(
            engine.info_order(progressed).await.unwrap().status,
            OrderStatus::AwaitingPayment
        );
    }
}
