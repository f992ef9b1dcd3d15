use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EventId, OrderId, Sku, UserId};
use domain::{EventType, Order, OrderItem, OrderStatus, OutboxOrderEvent};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{OrderStore, Result, StoreError};

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn append_outbox(
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
        event_type: EventType,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox_order_events (order_id, event_type, idempotency_key)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(order_id.get())
        .bind(event_type.as_str())
        .bind(Uuid::new_v4())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn load_items(&self, order_ids: &[i64]) -> Result<HashMap<OrderId, Vec<OrderItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, sku, count
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let order_id = OrderId::new(row.try_get("order_id")?);
            items.entry(order_id).or_default().push(Self::row_to_item(&row)?);
        }
        Ok(items)
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        let sku: i64 = row.try_get("sku")?;
        let count: i64 = row.try_get("count")?;

        let sku = u32::try_from(sku)
            .map_err(|_| StoreError::InvalidRow(format!("sku out of range: {sku}")))?;
        let count = u32::try_from(count)
            .map_err(|_| StoreError::InvalidRow(format!("count out of range: {count}")))?;

        Ok(OrderItem::new(Sku::new(sku), count))
    }

    fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
        let status: String = row.try_get("status")?;

        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            status: status.parse()?,
            items,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_event(row: PgRow) -> Result<OutboxOrderEvent> {
        let event_type: String = row.try_get("event_type")?;

        Ok(OutboxOrderEvent {
            id: EventId::new(row.try_get("id")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            event_type: event_type.parse()?,
            idempotency_key: row.try_get("idempotency_key")?,
            created_at: row.try_get("created_at")?,
            sent: row.try_get("sent")?,
        })
    }
}

/// Records request count and latency for one database operation.
async fn timed<T, F>(operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let start = Instant::now();
    metrics::counter!("db_requests_total", "operation" => operation).increment(1);

    let result = fut.await;

    let status = if result.is_ok() { "ok" } else { "error" };
    metrics::histogram!(
        "db_request_duration_seconds",
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());

    result
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    async fn create(&self, user_id: UserId, items: &[OrderItem]) -> Result<OrderId> {
        timed("order_create", async {
            let mut tx = self.pool.begin().await?;

            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO orders (user_id, status)
                VALUES ($1, $2)
                RETURNING id
                "#,
            )
            .bind(user_id.get())
            .bind(OrderStatus::New.as_str())
            .fetch_one(&mut *tx)
            .await?;
            let order_id = OrderId::new(id);

            for item in items {
                sqlx::query(
                    r#"
                    INSERT INTO order_items (order_id, sku, count)
                    VALUES ($1, $2, $3)
                    "#,
                )
                .bind(id)
                .bind(item.sku.as_i64())
                .bind(i64::from(item.count))
                .execute(&mut *tx)
                .await?;
            }

            Self::append_outbox(&mut tx, order_id, OrderStatus::New.event_type()).await?;

            tx.commit().await?;
            Ok(order_id)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        timed("order_set_status", async {
            let mut tx = self.pool.begin().await?;

            let updated = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
                .bind(status.as_str())
                .bind(order_id.get())
                .execute(&mut *tx)
                .await?;

            if updated.rows_affected() == 0 {
                return Err(StoreError::OrderNotFound(order_id));
            }

            Self::append_outbox(&mut tx, order_id, status.event_type()).await?;

            tx.commit().await?;
            Ok(())
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn set_status_if(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<bool> {
        timed("order_set_status_if", async {
            let mut tx = self.pool.begin().await?;

            let updated = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2 AND status = $3")
                .bind(status.as_str())
                .bind(order_id.get())
                .bind(expected.as_str())
                .execute(&mut *tx)
                .await?;

            if updated.rows_affected() == 0 {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
                        .bind(order_id.get())
                        .fetch_one(&mut *tx)
                        .await?;
                if !exists {
                    return Err(StoreError::OrderNotFound(order_id));
                }
                return Ok(false);
            }

            Self::append_outbox(&mut tx, order_id, status.event_type()).await?;

            tx.commit().await?;
            Ok(true)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn get_by_id(&self, order_id: OrderId) -> Result<Order> {
        timed("order_get_by_id", async {
            let row = sqlx::query(
                r#"
                SELECT id, user_id, status, created_at
                FROM orders
                WHERE id = $1
                "#,
            )
            .bind(order_id.get())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))?;

            let mut items = self.load_items(&[order_id.get()]).await?;
            Self::row_to_order(&row, items.remove(&order_id).unwrap_or_default())
        })
        .await
    }

    async fn get_unsent_outbox_events(&self, limit: usize) -> Result<Vec<OutboxOrderEvent>> {
        timed("outbox_get_unsent", async {
            let rows = sqlx::query(
                r#"
                SELECT id, order_id, event_type, idempotency_key, created_at, sent
                FROM outbox_order_events
                WHERE sent = FALSE
                ORDER BY id ASC
                LIMIT $1
                "#,
            )
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

            rows.into_iter().map(Self::row_to_event).collect()
        })
        .await
    }

    async fn mark_sent(&self, event_id: EventId) -> Result<()> {
        timed("outbox_mark_sent", async {
            sqlx::query("UPDATE outbox_order_events SET sent = TRUE WHERE id = $1")
                .bind(event_id.get())
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    async fn get_outbox_events_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OutboxOrderEvent>> {
        timed("outbox_get_for_order", async {
            let rows = sqlx::query(
                r#"
                SELECT id, order_id, event_type, idempotency_key, created_at, sent
                FROM outbox_order_events
                WHERE order_id = $1
                ORDER BY id ASC
                "#,
            )
            .bind(order_id.get())
            .fetch_all(&self.pool)
            .await?;

            rows.into_iter().map(Self::row_to_event).collect()
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn list_stale(
        &self,
        status: OrderStatus,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Order>> {
        timed("order_list_stale", async {
            let rows = sqlx::query(
                r#"
                SELECT id, user_id, status, created_at
                FROM orders
                WHERE status = $1 AND created_at < $2
                ORDER BY created_at ASC, id ASC
                LIMIT $3
                "#,
            )
            .bind(status.as_str())
            .bind(created_before)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

            let ids = rows
                .iter()
                .map(|row| row.try_get::<i64, _>("id"))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let mut items = self.load_items(&ids).await?;

            rows.iter()
                .zip(ids)
                .map(|(row, id)| {
                    let order_items = items.remove(&OrderId::new(id)).unwrap_or_default();
                    Self::row_to_order(row, order_items)
                })
                .collect()
        })
        .await
    }
}
