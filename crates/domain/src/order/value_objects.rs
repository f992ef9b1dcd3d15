//! Value objects for the order domain.

use common::Sku;
use serde::{Deserialize, Serialize};

/// A line item of an order: how many units of which SKU.
///
/// Items are owned by exactly one order and never change after the order
/// is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product being ordered.
    pub sku: Sku,

    /// Requested quantity. Always greater than zero for accepted orders.
    pub count: u32,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(sku: impl Into<Sku>, count: u32) -> Self {
        Self {
            sku: sku.into(),
            count,
        }
    }

    /// Returns true if the item requests at least one unit of a real SKU.
    pub fn is_valid(&self) -> bool {
        self.count > 0 && self.sku.get() > 0
    }
}
