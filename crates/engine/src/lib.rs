//! Order reservation engine.
//!
//! Drives orders through their lifecycle against two independent stores:
//! the [`OrderStore`](order_store::OrderStore), which records every status
//! change together with its outbox event, and the
//! [`StockLedger`](stock_ledger::StockLedger), which holds inventory. The two
//! share no transaction; an order left in `new` by a crash between them is
//! failed later by the [`StaleOrderSweeper`].

pub mod engine;
pub mod error;
pub mod sweeper;

pub use engine::ReservationEngine;
pub use error::{EngineError, ErrorKind, Result};
pub use sweeper::{StaleOrderSweeper, SweepStats, SweeperConfig};
