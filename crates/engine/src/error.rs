//! Engine error types.

use order_store::StoreError;
use stock_ledger::LedgerError;
use thiserror::Error;

/// How a failure should be surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The order or SKU does not exist.
    NotFound,
    /// The request is well formed but stock cannot cover it.
    PreconditionFailed,
    /// Storage failure.
    Internal,
}

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Order store error.
    #[error("Order store error: {0}")]
    Store(#[from] StoreError),

    /// Stock ledger error.
    #[error("Stock ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl EngineError {
    /// Classifies the error for the transport layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Store(StoreError::OrderNotFound(_)) => ErrorKind::NotFound,
            EngineError::Ledger(LedgerError::StockNotFound(_)) => ErrorKind::NotFound,
            EngineError::Ledger(LedgerError::InsufficientStock { .. }) => {
                ErrorKind::PreconditionFailed
            }
            _ => ErrorKind::Internal,
        }
    }
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;
