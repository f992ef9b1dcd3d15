use common::Sku;
use domain::DomainError;
use thiserror::Error;

/// Errors that can occur when interacting with the stock ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The SKU is not in the ledger.
    #[error("Stock not found: {0}")]
    StockNotFound(Sku),

    /// The SKU cannot cover the requested count.
    #[error("Insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: Sku,
        requested: u32,
        available: u64,
    },

    /// The seed catalogue could not be parsed.
    #[error("Invalid stock seed: {0}")]
    InvalidSeed(String),

    /// A stored row could not be decoded into a stock record.
    #[error("Invalid stored row: {0}")]
    InvalidRow(String),

    /// The ledger refused the operation (used by the in-memory ledger to
    /// simulate an outage).
    #[error("Stock ledger unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<DomainError> for LedgerError {
    fn from(err: DomainError) -> Self {
        LedgerError::InvalidSeed(err.to_string())
    }
}

/// Result type for stock ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
