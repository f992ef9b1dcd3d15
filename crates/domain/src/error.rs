//! Domain error types.

use thiserror::Error;

/// Errors raised while decoding domain values from storage or seed data.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A status string did not match any known order status.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    /// An event type string did not match any known outbox event type.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Stock seed data could not be decoded.
    #[error("Invalid stock seed: {0}")]
    InvalidSeed(#[from] serde_json::Error),
}
