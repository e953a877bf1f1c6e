//! Payment aggregate implementation.

use chrono::{DateTime, Utc};
use common::{BookingId, PaymentId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PaymentError;

use super::status::EscrowStatus;

/// Payment aggregate root.
///
/// Tracks a single escrowed payment from authorization through release
/// or refund. The transition methods are the only way to mutate the
/// aggregate; persistence rebuilds it through [`Payment::reconstitute`],
/// which bypasses validation because the state was certified by a prior
/// write.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    id: PaymentId,
    booking_id: BookingId,
    owner_id: Uuid,
    runner_id: Option<Uuid>,
    status: EscrowStatus,
    amount_cents: i64,
    platform_fee_cents: i64,
    runner_payout_cents: i64,
    currency: String,
    gateway_ref: String,
    held_at: Option<DateTime<Utc>>,
    released_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    refund_reason: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new payment in `pending` with the platform fee split
    /// computed from `fee_percent` (e.g. `15.0` for 15%).
    ///
    /// The fee is truncated towards zero after the percentage
    /// multiplication; the runner payout is derived by subtraction so
    /// that `platform_fee_cents + runner_payout_cents == amount_cents`
    /// holds exactly.
    pub fn new(
        booking_id: BookingId,
        owner_id: Uuid,
        amount_cents: i64,
        currency: impl Into<String>,
        fee_percent: f64,
    ) -> Result<Self, PaymentError> {
        if amount_cents <= 0 {
            return Err(PaymentError::InvalidAmount { amount_cents });
        }
        if !(0.0..=100.0).contains(&fee_percent) {
            return Err(PaymentError::InvalidFeePercent { fee_percent });
        }

        let platform_fee_cents = (amount_cents as f64 * fee_percent / 100.0) as i64;
        let runner_payout_cents = amount_cents - platform_fee_cents;
        let now = Utc::now();

        Ok(Self {
            id: PaymentId::new(),
            booking_id,
            owner_id,
            runner_id: None,
            status: EscrowStatus::Pending,
            amount_cents,
            platform_fee_cents,
            runner_payout_cents,
            currency: currency.into(),
            gateway_ref: String::new(),
            held_at: None,
            released_at: None,
            refunded_at: None,
            refund_reason: String::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }
}

// Query methods
impl Payment {
    /// Returns the payment ID.
    pub fn id(&self) -> PaymentId {
        self.id
    }

    /// Returns the booking this payment escrows funds for.
    pub fn booking_id(&self) -> BookingId {
        self.booking_id
    }

    /// Returns the owner (buyer) who authorized the funds.
    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    /// Returns the runner the escrow was released to, if any.
    pub fn runner_id(&self) -> Option<Uuid> {
        self.runner_id
    }

    /// Returns the current escrow status.
    pub fn status(&self) -> EscrowStatus {
        self.status
    }

    /// Returns the total authorized amount in cents.
    pub fn amount_cents(&self) -> i64 {
        self.amount_cents
    }

    /// Returns the platform's share in cents.
    pub fn platform_fee_cents(&self) -> i64 {
        self.platform_fee_cents
    }

    /// Returns the runner's share in cents.
    pub fn runner_payout_cents(&self) -> i64 {
        self.runner_payout_cents
    }

    /// Returns the ISO currency code.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Returns the gateway reference, empty until the escrow is held.
    pub fn gateway_ref(&self) -> &str {
        &self.gateway_ref
    }

    /// Returns when the escrow was held.
    pub fn held_at(&self) -> Option<DateTime<Utc>> {
        self.held_at
    }

    /// Returns when the escrow was released.
    pub fn released_at(&self) -> Option<DateTime<Utc>> {
        self.released_at
    }

    /// Returns when the escrow was refunded.
    pub fn refunded_at(&self) -> Option<DateTime<Utc>> {
        self.refunded_at
    }

    /// Returns the refund or failure reason, empty unless refunded or failed.
    pub fn refund_reason(&self) -> &str {
        &self.refund_reason
    }

    /// Returns the version used for optimistic locking.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns when the payment was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the payment was last mutated.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if the payment is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// State transitions
impl Payment {
    /// Transitions from `pending` to `held` after gateway authorization.
    pub fn hold(&mut self, gateway_ref: impl Into<String>) -> Result<(), PaymentError> {
        if self.status != EscrowStatus::Pending {
            return Err(PaymentError::InvalidState {
                from: self.status,
                attempted: EscrowStatus::Held,
            });
        }
        let now = Utc::now();
        self.status = EscrowStatus::Held;
        self.gateway_ref = gateway_ref.into();
        self.held_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Transitions from `held` to `released` after delivery confirmation.
    pub fn release(&mut self, runner_id: Uuid) -> Result<(), PaymentError> {
        if self.status != EscrowStatus::Held {
            return Err(PaymentError::InvalidState {
                from: self.status,
                attempted: EscrowStatus::Released,
            });
        }
        let now = Utc::now();
        self.status = EscrowStatus::Released;
        self.runner_id = Some(runner_id);
        self.released_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Transitions from `held` to `refunded` when the booking is cancelled.
    pub fn refund(&mut self, reason: impl Into<String>) -> Result<(), PaymentError> {
        if self.status != EscrowStatus::Held {
            return Err(PaymentError::InvalidState {
                from: self.status,
                attempted: EscrowStatus::Refunded,
            });
        }
        let now = Utc::now();
        self.status = EscrowStatus::Refunded;
        self.refunded_at = Some(now);
        self.refund_reason = reason.into();
        self.updated_at = now;
        Ok(())
    }

    /// Transitions any non-terminal status to `failed`.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), PaymentError> {
        if self.status.is_terminal() {
            return Err(PaymentError::InvalidState {
                from: self.status,
                attempted: EscrowStatus::Failed,
            });
        }
        self.status = EscrowStatus::Failed;
        self.refund_reason = reason.into();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Bumps the version for optimistic locking.
    ///
    /// Called exactly once per persisted mutation, at the orchestrator's
    /// discretion. Reconstitution never bumps.
    pub fn bump_version(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

// Reconstitution
impl Payment {
    /// Rebuilds a payment from its persisted record, bypassing validation.
    pub fn reconstitute(record: PaymentRecord) -> Self {
        Self {
            id: record.id,
            booking_id: record.booking_id,
            owner_id: record.owner_id,
            runner_id: record.runner_id,
            status: record.status,
            amount_cents: record.amount_cents,
            platform_fee_cents: record.platform_fee_cents,
            runner_payout_cents: record.runner_payout_cents,
            currency: record.currency,
            gateway_ref: record.gateway_ref,
            held_at: record.held_at,
            released_at: record.released_at,
            refunded_at: record.refunded_at,
            refund_reason: record.refund_reason,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// Returns the persisted form of this payment.
    pub fn to_record(&self) -> PaymentRecord {
        PaymentRecord {
            id: self.id,
            booking_id: self.booking_id,
            owner_id: self.owner_id,
            runner_id: self.runner_id,
            status: self.status,
            amount_cents: self.amount_cents,
            platform_fee_cents: self.platform_fee_cents,
            runner_payout_cents: self.runner_payout_cents,
            currency: self.currency.clone(),
            gateway_ref: self.gateway_ref.clone(),
            held_at: self.held_at,
            released_at: self.released_at,
            refunded_at: self.refunded_at,
            refund_reason: self.refund_reason.clone(),
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Field-for-field mirror of a `payments` table row.
///
/// The only way in or out of [`Payment`] for persistence code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub owner_id: Uuid,
    pub runner_id: Option<Uuid>,
    pub status: EscrowStatus,
    pub amount_cents: i64,
    pub platform_fee_cents: i64,
    pub runner_payout_cents: i64,
    pub currency: String,
    pub gateway_ref: String,
    pub held_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_reason: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
