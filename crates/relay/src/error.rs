use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when publishing an order event.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The message body could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The broker rejected or failed to acknowledge the message.
    #[error("Failed to publish to '{topic}': {reason}")]
    Broker { topic: String, reason: String },

    /// No acknowledgement arrived within the publish bound.
    #[error("Publish to '{topic}' timed out after {after:?}")]
    Timeout { topic: String, after: Duration },

    /// The producer could not be created.
    #[error("Producer configuration error: {0}")]
    Config(String),
}
