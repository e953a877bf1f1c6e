//! Gateway error types.

use thiserror::Error;

/// Errors returned by a payment gateway implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway rejected the operation permanently (e.g. card declined).
    #[error("gateway declined the operation: {0}")]
    Declined(String),

    /// The gateway failed transiently (timeout, 5xx); the operation may
    /// be retried by an operator, never automatically by the workflows.
    #[error("gateway temporarily unavailable: {0}")]
    Unavailable(String),

    /// The gateway reference does not identify a known authorization.
    #[error("unknown gateway reference '{0}'")]
    UnknownReference(String),
}
