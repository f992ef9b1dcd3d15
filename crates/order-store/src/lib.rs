//! Order storage with a transactional outbox.
//!
//! Every write that changes an order's status appends exactly one
//! [`OutboxOrderEvent`](domain::OutboxOrderEvent) in the same unit of work.
//! The outbox relay later drains unsent rows and marks them sent.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use store::OrderStore;
