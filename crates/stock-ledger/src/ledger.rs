use async_trait::async_trait;
use common::Sku;
use domain::{OrderItem, Stock, StockSeed};

use crate::{LedgerError, Result};

const DEFAULT_SEED: &str = include_str!("../data/stock-data.json");

/// Parses the catalogue bundled with the crate.
pub fn default_seed() -> Result<StockSeed> {
    Ok(StockSeed::from_json(DEFAULT_SEED)?)
}

/// Checks that `stock` can cover `item` before a reservation overwrites it.
pub fn check_reservation(stock: &Stock, item: &OrderItem) -> Result<()> {
    let available = stock.available();
    if u64::from(item.count) > available {
        return Err(LedgerError::InsufficientStock {
            sku: item.sku,
            requested: item.count,
            available,
        });
    }
    Ok(())
}

/// Core trait for stock ledger implementations.
///
/// Every mutating call is all-or-nothing across its items: either every SKU
/// is updated or none is. Calls touching the same SKU are serialized.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Reserves `count` units of each item's SKU, replacing any previous
    /// reservation.
    ///
    /// Fails with `StockNotFound` for an unknown SKU and with
    /// `InsufficientStock` when the SKU reports fewer available units than
    /// requested.
    async fn reserve(&self, items: &[OrderItem]) -> Result<()>;

    /// Permanently consumes the reserved units of each item's SKU:
    /// `total -= reserved`, then `reserved = 0`.
    async fn commit_reservation(&self, items: &[OrderItem]) -> Result<()>;

    /// Returns the reserved units of each item's SKU to the pool.
    async fn release_reservation(&self, items: &[OrderItem]) -> Result<()>;

    /// Units available for `sku`: zero while a reservation is outstanding,
    /// otherwise the total.
    async fn available_count(&self, sku: Sku) -> Result<u64>;

    /// Loads the full stock record for `sku`.
    async fn get_stock(&self, sku: Sku) -> Result<Stock>;

    /// Inserts seed records for SKUs the ledger doesn't know yet. Existing
    /// SKUs are left untouched.
    async fn seed(&self, seed: &StockSeed) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_catalogue_parses() {
        let seed = default_seed().unwrap();
        assert!(!seed.is_empty());
        assert!(
            seed.stocks()
                .iter()
                .any(|s| *s == Stock::new(1076963, 9, 0))
        );
    }

    #[test]
    fn check_reservation_against_available() {
        let stock = Stock::new(1, 5, 0);
        assert!(check_reservation(&stock, &OrderItem::new(1, 5)).is_ok());
        assert!(matches!(
            check_reservation(&stock, &OrderItem::new(1, 6)),
            Err(LedgerError::InsufficientStock {
                requested: 6,
                available: 5,
                ..
            })
        ));
    }

    #[test]
    fn outstanding_reservation_blocks_any_count() {
        let stock = Stock::new(1, 100, 1);
        assert!(matches!(
            check_reservation(&stock, &OrderItem::new(1, 1)),
            Err(LedgerError::InsufficientStock { available: 0, .. })
        ));
    }
}
