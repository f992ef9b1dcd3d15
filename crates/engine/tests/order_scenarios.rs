//! End-to-end order lifecycle scenarios against the in-memory stores.

use std::collections::HashMap;
use std::sync::Arc;

use common::{OrderId, Sku, UserId};
use domain::{EventType, OrderItem, OrderStatus, Stock, StockSeed};
use engine::{ErrorKind, ReservationEngine};
use order_store::{InMemoryOrderStore, OrderStore};
use stock_ledger::{InMemoryStockLedger, StockLedger, default_seed};

type Engine = ReservationEngine<InMemoryOrderStore, InMemoryStockLedger>;

fn engine_with(stocks: Vec<Stock>) -> Engine {
    ReservationEngine::new(
        InMemoryOrderStore::new(),
        InMemoryStockLedger::from_seed(StockSeed::new(stocks)),
    )
}

async fn events_of(engine: &Engine, order_id: OrderId) -> Vec<EventType> {
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
async fn checkout_with_bundled_catalogue() {
    let engine = ReservationEngine::new(
        InMemoryOrderStore::new(),
        InMemoryStockLedger::from_seed(default_seed().unwrap()),
    );
    let sku = Sku::new(1076963);

    let order_id = engine
        .create_order(UserId::new(31337), vec![OrderItem::new(sku, 1)])
        .await
        .unwrap();

    let order = engine.info_order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::AwaitingPayment);
    assert_eq!(order.user_id, UserId::new(31337));
    assert_eq!(
        engine.stocks().get_stock(sku).await.unwrap(),
        Stock::new(sku, 9, 1)
    );

    engine.pay_order(order_id).await.unwrap();

    assert_eq!(
        engine.info_order(order_id).await.unwrap().status,
        OrderStatus::Payed
    );
    assert_eq!(
        engine.stocks().get_stock(sku).await.unwrap(),
        Stock::new(sku, 8, 0)
    );
    assert_eq!(
        events_of(&engine, order_id).await,
        vec![
            EventType::OrderCreated,
            EventType::OrderAwaitingPayment,
            EventType::OrderPayed
        ]
    );
}

#[tokio::test]
async fn successful_create_appends_exactly_two_events() {
    let engine = engine_with(vec![Stock::new(10, 50, 0), Stock::new(20, 50, 0)]);

    for user in 1..=5 {
        let items = vec![OrderItem::new(10, user as u32), OrderItem::new(20, 1)];
        let order_id = engine
            .create_order(UserId::new(user), items)
            .await
            .unwrap();

        let events = events_of(&engine, order_id).await;
        assert_eq!(
            events,
            vec![EventType::OrderCreated, EventType::OrderAwaitingPayment]
        );

        // Release so the next order sees the SKUs as available again.
        engine.cancel_order(order_id).await.unwrap();
    }
}

#[tokio::test]
async fn second_order_on_reserved_sku_fails() {
    let engine = engine_with(vec![Stock::new(10, 50, 0)]);

    let first = engine
        .create_order(UserId::new(1), vec![OrderItem::new(10, 1)])
        .await
        .unwrap();
    let err = engine
        .create_order(UserId::new(2), vec![OrderItem::new(10, 1)])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(
        engine.info_order(first).await.unwrap().status,
        OrderStatus::AwaitingPayment
    );

    let second = OrderId::new(first.get() + 1);
    assert_eq!(
        engine.info_order(second).await.unwrap().status,
        OrderStatus::Failed
    );
    assert_eq!(
        events_of(&engine, second).await,
        vec![EventType::OrderCreated, EventType::OrderFailed]
    );
}

#[tokio::test]
async fn cancel_restores_availability() {
    let engine = engine_with(vec![Stock::new(10, 7, 0)]);

    let order_id = engine
        .create_order(UserId::new(1), vec![OrderItem::new(10, 3)])
        .await
        .unwrap();
    assert_eq!(engine.info_stocks(Sku::new(10)).await.unwrap(), 0);

    engine.cancel_order(order_id).await.unwrap();

    assert_eq!(engine.info_stocks(Sku::new(10)).await.unwrap(), 7);
    assert_eq!(
        engine.stocks().get_stock(Sku::new(10)).await.unwrap(),
        Stock::new(10, 7, 0)
    );
}

#[tokio::test]
async fn info_order_returns_submitted_items() {
    let engine = engine_with(vec![
        Stock::new(10, 50, 0),
        Stock::new(20, 50, 0),
        Stock::new(30, 50, 0),
    ]);
    let items = vec![
        OrderItem::new(30, 2),
        OrderItem::new(10, 5),
        OrderItem::new(20, 1),
    ];

    let order_id = engine
        .create_order(UserId::new(9), items.clone())
        .await
        .unwrap();

    let order = engine.info_order(order_id).await.unwrap();
    let count = |list: &[OrderItem]| {
        let mut counts = HashMap::new();
        for item in list {
            *counts.entry(item.sku).or_insert(0u32) += item.count;
        }
        counts
    };
    assert_eq!(count(&order.items), count(&items));
    assert_eq!(order.unit_count(), 8);
}

#[tokio::test]
async fn concurrent_orders_on_distinct_skus() {
    let stocks = (1..=20).map(|sku| Stock::new(sku, 10, 0)).collect();
    let engine = Arc::new(engine_with(stocks));

    let mut handles = Vec::new();
    for sku in 1..=20u32 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_order(UserId::new(i64::from(sku)), vec![OrderItem::new(sku, 2)])
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(engine.orders().order_count().await, 20);
    for sku in 1..=20u32 {
        assert_eq!(
            engine.stocks().get_stock(Sku::new(sku)).await.unwrap().reserved,
            2
        );
    }

    let unsent = engine.orders().get_unsent_outbox_events(500).await.unwrap();
    assert_eq!(unsent.len(), 40);
}

#[tokio::test]
async fn concurrent_orders_on_one_sku_admit_exactly_one() {
    let engine = Arc::new(engine_with(vec![Stock::new(10, 100, 0)]));

    let mut handles = Vec::new();
    for user in 1..=10 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_order(UserId::new(user), vec![OrderItem::new(10, 1)])
                .await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::PreconditionFailed),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(
        engine.stocks().get_stock(Sku::new(10)).await.unwrap().reserved,
        1
    );
}
