use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use common::Sku;
use domain::{OrderItem, Stock, StockSeed};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{LedgerError, Result, StockLedger, check_reservation};

/// PostgreSQL-backed stock ledger.
///
/// Each mutating call runs in one transaction that locks the touched rows
/// with `SELECT ... FOR UPDATE` in SKU order, so concurrent calls on
/// overlapping SKUs serialize without deadlocking.
#[derive(Clone)]
pub struct PostgresStockLedger {
    pool: PgPool,
}

impl PostgresStockLedger {
    /// Creates a new PostgreSQL stock ledger.
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

    async fn lock_stocks(
        tx: &mut Transaction<'_, Postgres>,
        items: &[OrderItem],
    ) -> Result<HashMap<Sku, Stock>> {
        let mut skus: Vec<i64> = items.iter().map(|item| item.sku.as_i64()).collect();
        skus.sort_unstable();
        skus.dedup();

        let rows = sqlx::query(
            r#"
            SELECT sku, total_count, reserved
            FROM stocks
            WHERE sku = ANY($1)
            ORDER BY sku
            FOR UPDATE
            "#,
        )
        .bind(&skus)
        .fetch_all(&mut **tx)
        .await?;

        let stocks = rows
            .iter()
            .map(|row| Self::row_to_stock(row).map(|stock| (stock.sku, stock)))
            .collect::<Result<HashMap<_, _>>>()?;

        match items.iter().find(|item| !stocks.contains_key(&item.sku)) {
            Some(item) => Err(LedgerError::StockNotFound(item.sku)),
            None => Ok(stocks),
        }
    }

    fn row_to_stock(row: &PgRow) -> Result<Stock> {
        let sku: i64 = row.try_get("sku")?;
        let total_count: i64 = row.try_get("total_count")?;
        let reserved: i64 = row.try_get("reserved")?;

        let sku = u32::try_from(sku)
            .map_err(|_| LedgerError::InvalidRow(format!("sku out of range: {sku}")))?;
        let total_count = u64::try_from(total_count)
            .map_err(|_| LedgerError::InvalidRow(format!("negative total for {sku}")))?;
        let reserved = u64::try_from(reserved)
            .map_err(|_| LedgerError::InvalidRow(format!("negative reserved for {sku}")))?;

        Ok(Stock::new(sku, total_count, reserved))
    }
}

fn column(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| LedgerError::InvalidRow(format!("count out of range: {value}")))
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
impl StockLedger for PostgresStockLedger {
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    async fn reserve(&self, items: &[OrderItem]) -> Result<()> {
        timed("stock_reserve", async {
            let mut tx = self.pool.begin().await?;
            let stocks = Self::lock_stocks(&mut tx, items).await?;

            for item in items {
                if let Some(stock) = stocks.get(&item.sku) {
                    check_reservation(stock, item)?;
                }
            }

            for item in items {
                sqlx::query("UPDATE stocks SET reserved = $1 WHERE sku = $2")
                    .bind(i64::from(item.count))
                    .bind(item.sku.as_i64())
                    .execute(&mut *tx)
                    .await?;
            }

            tx.commit().await?;
            Ok(())
        })
        .await
    }

    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    async fn commit_reservation(&self, items: &[OrderItem]) -> Result<()> {
        timed("stock_commit_reservation", async {
            let mut tx = self.pool.begin().await?;
            let stocks = Self::lock_stocks(&mut tx, items).await?;

            for mut stock in stocks.into_values() {
                stock.commit_reservation();
                sqlx::query("UPDATE stocks SET total_count = $1, reserved = 0 WHERE sku = $2")
                    .bind(column(stock.total_count)?)
                    .bind(stock.sku.as_i64())
                    .execute(&mut *tx)
                    .await?;
            }

            tx.commit().await?;
            Ok(())
        })
        .await
    }

    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    async fn release_reservation(&self, items: &[OrderItem]) -> Result<()> {
        timed("stock_release_reservation", async {
            let mut tx = self.pool.begin().await?;
            let stocks = Self::lock_stocks(&mut tx, items).await?;

            let skus: Vec<i64> = stocks.keys().map(Sku::as_i64).collect();
            sqlx::query("UPDATE stocks SET reserved = 0 WHERE sku = ANY($1)")
                .bind(&skus)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(())
        })
        .await
    }

    async fn available_count(&self, sku: Sku) -> Result<u64> {
        Ok(self.get_stock(sku).await?.available())
    }

    #[tracing::instrument(skip(self))]
    async fn get_stock(&self, sku: Sku) -> Result<Stock> {
        timed("stock_get", async {
            let row = sqlx::query("SELECT sku, total_count, reserved FROM stocks WHERE sku = $1")
                .bind(sku.as_i64())
                .fetch_optional(&self.pool)
                .await?
                .ok_or(LedgerError::StockNotFound(sku))?;

            Self::row_to_stock(&row)
        })
        .await
    }

    #[tracing::instrument(skip(self, seed), fields(seed_len = seed.len()))]
    async fn seed(&self, seed: &StockSeed) -> Result<()> {
        timed("stock_seed", async {
            let mut tx = self.pool.begin().await?;

            for stock in seed.stocks() {
                sqlx::query(
                    r#"
                    INSERT INTO stocks (sku, total_count, reserved)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (sku) DO NOTHING
                    "#,
                )
                .bind(stock.sku.as_i64())
                .bind(column(stock.total_count)?)
                .bind(column(stock.reserved)?)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(())
        })
        .await
    }
}
