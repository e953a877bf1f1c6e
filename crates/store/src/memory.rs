//! In-memory payment store for development and testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{BookingId, PaymentId};
use domain::{EscrowStatus, Payment};
use tokio::sync::RwLock;

use crate::repository::{PaymentStats, PaymentStore};
use crate::{Result, StoreError};

#[derive(Default)]
struct Inner {
    rows: HashMap<PaymentId, Payment>,
    by_booking: HashMap<BookingId, PaymentId>,
}

/// In-memory payment store implementation.
///
/// Provides the same contract as the PostgreSQL implementation,
/// including the optimistic-locking behavior of `update`.
#[derive(Clone, Default)]
pub struct InMemoryPaymentStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryPaymentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored payments.
    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    /// Returns true if no payments are stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.rows.is_empty()
    }

    /// Removes all stored payments.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.rows.clear();
        inner.by_booking.clear();
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn find_by_id(&self, id: PaymentId) -> Result<Payment> {
        let inner = self.inner.read().await;
        inner
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found_id(id))
    }

    async fn find_by_booking(&self, booking_id: BookingId) -> Result<Payment> {
        let inner = self.inner.read().await;
        inner
            .by_booking
            .get(&booking_id)
            .and_then(|id| inner.rows.get(id))
            .cloned()
            .ok_or_else(|| StoreError::not_found_booking(booking_id))
    }

    async fn save(&self, payment: &Payment) -> Result<()> {
        let mut inner = self.inner.write().await;

        if inner.rows.contains_key(&payment.id()) {
            return Err(StoreError::Duplicate(format!(
                "payment id {} already exists",
                payment.id()
            )));
        }
        if inner.by_booking.contains_key(&payment.booking_id()) {
            return Err(StoreError::Duplicate(format!(
                "booking {} already has a payment",
                payment.booking_id()
            )));
        }

        inner.by_booking.insert(payment.booking_id(), payment.id());
        inner.rows.insert(payment.id(), payment.clone());
        Ok(())
    }

    async fn update(&self, payment: &Payment) -> Result<()> {
        let mut inner = self.inner.write().await;
        let expected = payment.version() - 1;

        let version_matches = inner
            .rows
            .get(&payment.id())
            .is_some_and(|stored| stored.version() == expected);

        if !version_matches {
            return Err(StoreError::ConcurrencyConflict {
                payment_id: payment.id(),
                expected,
            });
        }

        inner.rows.insert(payment.id(), payment.clone());
        Ok(())
    }

    async fn list(&self, page: u32, limit: u32) -> Result<(Vec<Payment>, i64)> {
        let inner = self.inner.read().await;

        let mut payments: Vec<Payment> = inner.rows.values().cloned().collect();
        payments.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        let total = payments.len() as i64;
        let offset = (page.saturating_sub(1) as usize) * limit as usize;
        let page: Vec<Payment> = payments
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();

        Ok((page, total))
    }

    async fn stats(&self) -> Result<PaymentStats> {
        let inner = self.inner.read().await;
        let mut stats = PaymentStats::default();

        for payment in inner.rows.values() {
            if payment.status() == EscrowStatus::Released {
                stats.total_revenue_cents += payment.amount_cents();
            }
            *stats
                .count_by_status
                .entry(payment.status().as_str().to_string())
                .or_insert(0) += 1;
        }

        Ok(stats)
    }
}
