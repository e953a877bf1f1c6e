//! The payment store port.

use std::collections::HashMap;

use async_trait::async_trait;
use common::{BookingId, PaymentId};
use domain::Payment;

use crate::Result;

/// Aggregate statistics over all stored payments (admin read path).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentStats {
    /// Sum of `amount_cents` over released payments.
    pub total_revenue_cents: i64,

    /// Number of payments per status, keyed by the storage form.
    pub count_by_status: HashMap<String, i64>,
}

impl PaymentStats {
    /// Returns the total number of payments across all statuses.
    pub fn total_payments(&self) -> i64 {
        self.count_by_status.values().sum()
    }
}

/// Core trait for payment persistence.
///
/// All implementations must be thread-safe (Send + Sync). The store is
/// the only authoritative state of the service; aggregates held in
/// memory are transient per workflow.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Retrieves a payment by its unique id.
    async fn find_by_id(&self, id: PaymentId) -> Result<Payment>;

    /// Retrieves the payment escrowing funds for a booking.
    async fn find_by_booking(&self, booking_id: BookingId) -> Result<Payment>;

    /// Inserts a new payment.
    ///
    /// Fails with [`StoreError::Duplicate`](crate::StoreError::Duplicate)
    /// when a payment already exists for the id or the booking.
    async fn save(&self, payment: &Payment) -> Result<()>;

    /// Persists a mutation under optimistic locking.
    ///
    /// The update applies only when the stored row is at
    /// `payment.version() - 1`; otherwise it fails with
    /// [`StoreError::ConcurrencyConflict`](crate::StoreError::ConcurrencyConflict)
    /// and the caller must not retry blindly.
    async fn update(&self, payment: &Payment) -> Result<()>;

    /// Returns a page of payments, newest first, and the total count.
    async fn list(&self, page: u32, limit: u32) -> Result<(Vec<Payment>, i64)>;

    /// Returns aggregate statistics over all payments.
    async fn stats(&self) -> Result<PaymentStats>;
}
