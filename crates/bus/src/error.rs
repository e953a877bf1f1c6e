//! Event bus error types.

use thiserror::Error;

/// Errors that can occur when publishing or consuming events.
#[derive(Debug, Error)]
pub enum BusError {
    /// An event payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A publish did not reach the bus; retriable by the caller.
    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    /// A consumer handler rejected the message; it will be redelivered.
    #[error("handler failed: {0}")]
    Handler(String),
}
