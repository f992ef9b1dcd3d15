//! Per-SKU inventory ledger.
//!
//! The ledger tracks a total and a reserved count for each SKU. A
//! reservation replaces whatever was reserved before, and any outstanding
//! reservation makes the SKU report nothing available until it is committed
//! or released.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;

pub use error::{LedgerError, Result};
pub use ledger::{StockLedger, check_reservation, default_seed};
pub use memory::InMemoryStockLedger;
pub use postgres::PostgresStockLedger;
