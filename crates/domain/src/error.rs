//! Domain error types.

use thiserror::Error;

use crate::payment::EscrowStatus;

/// Errors produced by the payment aggregate.
#[derive(Debug, Error, PartialEq)]
pub enum PaymentError {
    /// A transition was requested from a state that does not allow it.
    #[error("invalid escrow transition from '{from}' to '{attempted}'")]
    InvalidState {
        from: EscrowStatus,
        attempted: EscrowStatus,
    },

    /// The payment amount must be strictly positive.
    #[error("amount must be positive, got {amount_cents}")]
    InvalidAmount { amount_cents: i64 },

    /// The platform fee percentage must lie within [0, 100].
    #[error("platform fee percent must be within [0, 100], got {fee_percent}")]
    InvalidFeePercent { fee_percent: f64 },
}
