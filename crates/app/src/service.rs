//! Command façade over the escrow workflows.

use std::collections::HashMap;
use std::sync::Arc;

use bus::EventPublisher;
use chrono::{DateTime, Utc};
use common::{BookingId, PaymentId};
use domain::events::{BookingCancelledEvent, DeliveryConfirmedEvent};
use domain::{EscrowStatus, Payment};
use gateway::PaymentGateway;
use saga::{EscrowSagaService, SagaError};
use serde::{Deserialize, Serialize};
use store::{PaymentStore, StoreError};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the command façade.
///
/// The HTTP layer maps these onto status codes: validation failures are
/// 400-class, missing payments 404, illegal transitions and concurrency
/// conflicts 409, everything else 500.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was rejected before any state change.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Saga error.
    #[error("saga error: {0}")]
    Saga(#[from] SagaError),
}

/// DTO for initiating a new escrow payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatePaymentRequest {
    pub booking_id: BookingId,
    pub amount_cents: i64,
    pub currency: String,
    pub customer_email: String,
}

/// Snapshot of a payment returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDto {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub owner_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_id: Option<Uuid>,
    pub status: EscrowStatus,
    pub amount_cents: i64,
    pub platform_fee_cents: i64,
    pub runner_payout_cents: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gateway_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub held_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refunded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub refund_reason: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentDto {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id(),
            booking_id: payment.booking_id(),
            owner_id: payment.owner_id(),
            runner_id: payment.runner_id(),
            status: payment.status(),
            amount_cents: payment.amount_cents(),
            platform_fee_cents: payment.platform_fee_cents(),
            runner_payout_cents: payment.runner_payout_cents(),
            currency: payment.currency().to_string(),
            gateway_ref: payment.gateway_ref().to_string(),
            held_at: payment.held_at(),
            released_at: payment.released_at(),
            refunded_at: payment.refunded_at(),
            refund_reason: payment.refund_reason().to_string(),
            version: payment.version(),
            created_at: payment.created_at(),
            updated_at: payment.updated_at(),
        }
    }
}

/// Aggregate payment statistics for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatsDto {
    pub total_revenue_cents: i64,
    pub total_payments: i64,
    pub by_status: HashMap<String, i64>,
}

/// Application service orchestrating the payment use cases.
///
/// External commands and booking events both funnel through here; the
/// service looks aggregates up through the store and delegates every
/// mutation to the saga workflows.
pub struct PaymentService<S, G, B> {
    store: Arc<S>,
    sagas: EscrowSagaService<S, G, B>,
}

impl<S, G, B> PaymentService<S, G, B>
where
    S: PaymentStore + 'static,
    G: PaymentGateway + 'static,
    B: EventPublisher + 'static,
{
    /// Creates a new payment service.
    pub fn new(store: Arc<S>, sagas: EscrowSagaService<S, G, B>) -> Self {
        Self { store, sagas }
    }

    /// Starts the escrow payment process for a booking.
    #[tracing::instrument(skip(self, request), fields(booking_id = %request.booking_id))]
    pub async fn initiate(
        &self,
        owner_id: Uuid,
        request: InitiatePaymentRequest,
    ) -> Result<PaymentDto, ServiceError> {
        if request.amount_cents <= 0 {
            return Err(ServiceError::Validation(format!(
                "amount_cents must be positive, got {}",
                request.amount_cents
            )));
        }
        if request.currency.len() != 3 {
            return Err(ServiceError::Validation(format!(
                "currency must be a 3-letter code, got '{}'",
                request.currency
            )));
        }
        if !request.customer_email.contains('@') {
            return Err(ServiceError::Validation(
                "customer_email must be a valid email address".to_string(),
            ));
        }

        tracing::info!(
            %owner_id,
            amount_cents = request.amount_cents,
            currency = %request.currency,
            "initiating payment"
        );

        let payment = self
            .sagas
            .create_escrow(
                request.booking_id,
                owner_id,
                request.amount_cents,
                &request.currency,
                &request.customer_email,
            )
            .await?;

        Ok(PaymentDto::from(&payment))
    }

    /// Retrieves a payment by its ID.
    pub async fn get_payment(&self, payment_id: PaymentId) -> Result<PaymentDto, ServiceError> {
        let payment = self.store.find_by_id(payment_id).await?;
        Ok(PaymentDto::from(&payment))
    }

    /// Retrieves a payment by its associated booking ID.
    pub async fn get_by_booking(&self, booking_id: BookingId) -> Result<PaymentDto, ServiceError> {
        let payment = self.store.find_by_booking(booking_id).await?;
        Ok(PaymentDto::from(&payment))
    }

    /// Initiates a refund for a held escrow payment.
    #[tracing::instrument(skip(self, reason))]
    pub async fn refund_payment(
        &self,
        payment_id: PaymentId,
        reason: &str,
    ) -> Result<PaymentDto, ServiceError> {
        if reason.trim().is_empty() {
            return Err(ServiceError::Validation(
                "refund reason must not be empty".to_string(),
            ));
        }

        tracing::info!(%payment_id, "refunding payment");
        self.sagas.refund_escrow(payment_id, reason).await?;

        // Reload after the saga completes.
        let payment = self.store.find_by_id(payment_id).await?;
        Ok(PaymentDto::from(&payment))
    }

    /// Returns a page of payments, newest first (admin).
    pub async fn list(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<PaymentDto>, i64), ServiceError> {
        if page < 1 {
            return Err(ServiceError::Validation(format!(
                "page must be at least 1, got {page}"
            )));
        }
        if !(1..=100).contains(&limit) {
            return Err(ServiceError::Validation(format!(
                "limit must be between 1 and 100, got {limit}"
            )));
        }

        let (payments, total) = self.store.list(page, limit).await?;
        let dtos = payments.iter().map(PaymentDto::from).collect();
        Ok((dtos, total))
    }

    /// Returns aggregate payment statistics (admin).
    pub async fn stats(&self) -> Result<PaymentStatsDto, ServiceError> {
        let stats = self.store.stats().await?;
        Ok(PaymentStatsDto {
            total_revenue_cents: stats.total_revenue_cents,
            total_payments: stats.total_payments(),
            by_status: stats.count_by_status,
        })
    }

    /// Handles a delivery confirmation from the booking service by
    /// releasing the escrow to the runner.
    ///
    /// Missing payments, payments not in `held`, and duplicate releases
    /// are all swallowed as success so the bus never redelivers them.
    #[tracing::instrument(skip(self, event), fields(booking_id = %event.booking_id))]
    pub async fn handle_delivery_confirmed(
        &self,
        event: DeliveryConfirmedEvent,
    ) -> Result<(), ServiceError> {
        tracing::info!(runner_id = %event.runner_id, "handling delivery confirmed event");

        let payment = match self.store.find_by_booking(event.booking_id).await {
            Ok(payment) => payment,
            Err(StoreError::NotFound { .. }) => {
                tracing::warn!("no payment found for booking, skipping release");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        if payment.status() != EscrowStatus::Held {
            tracing::info!(
                payment_id = %payment.id(),
                status = %payment.status(),
                "payment not in held state, skipping release"
            );
            return Ok(());
        }

        match self.sagas.release_escrow(payment.id(), event.runner_id).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_invalid_state() => {
                // A concurrent workflow won the race; the redelivered
                // event has nothing left to do.
                tracing::info!(payment_id = %payment.id(), error = %err, "release already applied");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Handles a booking cancellation by refunding the escrow when the
    /// funds are currently held.
    #[tracing::instrument(skip(self, event), fields(booking_id = %event.booking_id))]
    pub async fn handle_booking_cancelled(
        &self,
        event: BookingCancelledEvent,
    ) -> Result<(), ServiceError> {
        tracing::info!(reason = %event.reason, "handling booking cancelled event");

        let payment = match self.store.find_by_booking(event.booking_id).await {
            Ok(payment) => payment,
            Err(StoreError::NotFound { .. }) => {
                tracing::warn!("no payment found for booking, skipping refund");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        if payment.status() != EscrowStatus::Held {
            tracing::info!(
                payment_id = %payment.id(),
                status = %payment.status(),
                "payment not in held state, skipping refund"
            );
            return Ok(());
        }

        let reason = format!("booking cancelled: {}", event.reason);
        match self.sagas.refund_escrow(payment.id(), &reason).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_invalid_state() => {
                tracing::info!(payment_id = %payment.id(), error = %err, "refund already applied");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
