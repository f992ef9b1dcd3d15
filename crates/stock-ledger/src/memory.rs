use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::Sku;
use domain::{OrderItem, Stock, StockSeed};
use tokio::sync::RwLock;

use crate::{LedgerError, Result, StockLedger, check_reservation};

/// In-memory stock ledger for testing and local runs.
///
/// A single write lock covers each mutating call, so validation and
/// application of a multi-item call are one atomic step.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockLedger {
    stocks: Arc<RwLock<HashMap<Sku, Stock>>>,
    fail_on_reserve: Arc<AtomicBool>,
}

impl InMemoryStockLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger holding the seed records.
    pub fn from_seed(seed: StockSeed) -> Self {
        let stocks = seed.into_iter().map(|stock| (stock.sku, stock)).collect();
        Self {
            stocks: Arc::new(RwLock::new(stocks)),
            fail_on_reserve: Arc::default(),
        }
    }

    /// Configures the ledger to fail every reserve call.
    pub fn set_fail_on_reserve(&self, fail: bool) {
        self.fail_on_reserve.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of SKUs in the ledger.
    pub async fn len(&self) -> usize {
        self.stocks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.stocks.read().await.is_empty()
    }
}

fn ensure_known(stocks: &HashMap<Sku, Stock>, items: &[OrderItem]) -> Result<()> {
    match items.iter().find(|item| !stocks.contains_key(&item.sku)) {
        Some(item) => Err(LedgerError::StockNotFound(item.sku)),
        None => Ok(()),
    }
}

#[async_trait]
impl StockLedger for InMemoryStockLedger {
    async fn reserve(&self, items: &[OrderItem]) -> Result<()> {
        if self.fail_on_reserve.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("reserve rejected".to_string()));
        }

        let mut stocks = self.stocks.write().await;

        for item in items {
            let stock = stocks
                .get(&item.sku)
                .ok_or(LedgerError::StockNotFound(item.sku))?;
            check_reservation(stock, item)?;
        }

        for item in items {
            if let Some(stock) = stocks.get_mut(&item.sku) {
                stock.reserve(item.count);
            }
        }

        Ok(())
    }

    async fn commit_reservation(&self, items: &[OrderItem]) -> Result<()> {
        let mut stocks = self.stocks.write().await;
        ensure_known(&stocks, items)?;

        for item in items {
            if let Some(stock) = stocks.get_mut(&item.sku) {
                stock.commit_reservation();
            }
        }

        Ok(())
    }

    async fn release_reservation(&self, items: &[OrderItem]) -> Result<()> {
        let mut stocks = self.stocks.write().await;
        ensure_known(&stocks, items)?;

        for item in items {
            if let Some(stock) = stocks.get_mut(&item.sku) {
                stock.release_reservation();
            }
        }

        Ok(())
    }

    async fn available_count(&self, sku: Sku) -> Result<u64> {
        Ok(self.get_stock(sku).await?.available())
    }

    async fn get_stock(&self, sku: Sku) -> Result<Stock> {
        self.stocks
            .read()
            .await
            .get(&sku)
            .copied()
            .ok_or(LedgerError::StockNotFound(sku))
    }

    async fn seed(&self, seed: &StockSeed) -> Result<()> {
        let mut stocks = self.stocks.write().await;
        for stock in seed.stocks() {
            stocks.entry(stock.sku).or_insert(*stock);
        }
        Ok(())
    }
}
