//! Store error types.

use common::PaymentId;
use thiserror::Error;

/// Errors that can occur when persisting or loading payments.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No payment exists for the requested key.
    #[error("payment not found for {key} '{value}'")]
    NotFound { key: &'static str, value: String },

    /// A payment already exists for the id or booking being inserted.
    #[error("duplicate payment: {0}")]
    Duplicate(String),

    /// A conditional update found no row at the expected version.
    /// The caller must reload before deciding whether to retry.
    #[error("payment {payment_id} was modified concurrently (expected stored version {expected})")]
    ConcurrencyConflict { payment_id: PaymentId, expected: i64 },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A persisted row could not be mapped back to the aggregate.
    #[error("corrupt payment row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Builds the not-found error for a payment id lookup.
    pub fn not_found_id(id: PaymentId) -> Self {
        StoreError::NotFound {
            key: "id",
            value: id.to_string(),
        }
    }

    /// Builds the not-found error for a booking id lookup.
    pub fn not_found_booking(booking_id: common::BookingId) -> Self {
        StoreError::NotFound {
            key: "booking_id",
            value: booking_id.to_string(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
