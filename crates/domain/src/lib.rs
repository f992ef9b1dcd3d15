//! Domain model for order lifecycle and inventory reservation.
//!
//! This crate holds the plain data types every other crate agrees on:
//! - [`Order`] and [`OrderItem`], with the [`OrderStatus`] state machine
//! - [`OutboxOrderEvent`], the outbox row appended with every status change
//! - [`OrderEventMessage`], the JSON envelope published to the broker
//! - [`Stock`] and [`StockSeed`], the inventory ledger records

pub mod error;
pub mod order;
pub mod outbox;
pub mod stock;

pub use common::{EventId, OrderId, Sku, UserId};
pub use error::DomainError;
pub use order::{Order, OrderItem, OrderStatus};
pub use outbox::{EventType, OrderEventMessage, OutboxOrderEvent};
pub use stock::{Stock, StockSeed};
