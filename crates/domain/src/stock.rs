//! Stock ledger records and seed data.

use common::Sku;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Inventory of one SKU.
///
/// `reserved` is the quantity held against an in-flight order. Reservations
/// overwrite rather than accumulate, and any outstanding reservation makes
/// the SKU report nothing available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub sku: Sku,
    pub total_count: u64,
    pub reserved: u64,
}

impl Stock {
    /// Creates a stock record.
    pub fn new(sku: impl Into<Sku>, total_count: u64, reserved: u64) -> Self {
        Self {
            sku: sku.into(),
            total_count,
            reserved,
        }
    }

    /// Units that can still be reserved: zero while any reservation is
    /// outstanding, otherwise the total.
    pub fn available(&self) -> u64 {
        if self.reserved > 0 { 0 } else { self.total_count }
    }

    /// Holds `count` units, replacing any previous reservation.
    pub fn reserve(&mut self, count: u32) {
        self.reserved = u64::from(count);
    }

    /// Consumes the reserved units permanently.
    pub fn commit_reservation(&mut self) {
        self.total_count = self.total_count.saturating_sub(self.reserved);
        self.reserved = 0;
    }

    /// Returns the reserved units to the available pool.
    pub fn release_reservation(&mut self) {
        self.reserved = 0;
    }
}

/// Static catalogue loaded once at startup to populate the stock ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockSeed(Vec<Stock>);

impl StockSeed {
    /// Creates a seed from stock records.
    pub fn new(stocks: Vec<Stock>) -> Self {
        Self(stocks)
    }

    /// Parses a JSON array of `{sku, total_count, reserved}` records.
    pub fn from_json(json: &str) -> Result<Self, DomainError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The seeded stock records.
    pub fn stocks(&self) -> &[Stock] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for StockSeed {
    type Item = Stock;
    type IntoIter = std::vec::IntoIter<Stock>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
