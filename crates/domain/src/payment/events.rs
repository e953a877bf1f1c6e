//! Event contracts shared with the rest of the platform.
//!
//! Payment events are produced to `payment.events`; booking events are
//! consumed from `booking.events` and owned by the booking service.

use chrono::{DateTime, Utc};
use common::{BookingId, PaymentId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Topic carrying events produced by this service.
pub const TOPIC_PAYMENT_EVENTS: &str = "payment.events";

/// Topic carrying events produced by the booking service.
pub const TOPIC_BOOKING_EVENTS: &str = "booking.events";

/// Source identifier stamped on every envelope this service publishes.
pub const EVENT_SOURCE: &str = "payment-service";

/// Event type: escrow funds were authorized and held.
pub const PAYMENT_ESCROW_HELD: &str = "payment.escrow_held";

/// Event type: escrow funds were captured and released to the runner.
pub const PAYMENT_ESCROW_RELEASED: &str = "payment.escrow_released";

/// Event type: escrow funds were returned to the owner.
pub const PAYMENT_ESCROW_REFUNDED: &str = "payment.escrow_refunded";

/// Event type: a payment workflow failed terminally.
pub const PAYMENT_ESCROW_FAILED: &str = "payment.escrow_failed";

/// Event type: the runner confirmed delivery for a booking.
pub const BOOKING_DELIVERY_CONFIRMED: &str = "booking.delivery_confirmed";

/// Event type: a booking was cancelled.
pub const BOOKING_CANCELLED: &str = "booking.cancelled";

/// Published when escrow funds are authorized and held.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowHeldEvent {
    pub payment_id: PaymentId,
    pub booking_id: BookingId,
    pub gateway_ref: String,
    pub amount_cents: i64,
    pub currency: String,
    pub occurred_at: DateTime<Utc>,
}

/// Published when escrow funds are captured and released to the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowReleasedEvent {
    pub payment_id: PaymentId,
    pub booking_id: BookingId,
    pub runner_id: Uuid,
    pub runner_payout: i64,
    pub platform_fee: i64,
    pub currency: String,
    pub occurred_at: DateTime<Utc>,
}

/// Published when escrow funds are returned to the owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowRefundedEvent {
    pub payment_id: PaymentId,
    pub booking_id: BookingId,
    pub owner_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub refund_reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Published when a payment workflow fails terminally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowFailedEvent {
    pub payment_id: PaymentId,
    pub booking_id: BookingId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Consumed when a runner confirms delivery for a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfirmedEvent {
    pub booking_id: BookingId,
    pub runner_id: Uuid,
    pub owner_id: Uuid,
    pub delivered_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Consumed when a booking is cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingCancelledEvent {
    pub booking_id: BookingId,
    pub cancelled_by: Uuid,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_released_event_serialization_roundtrip() {
        let event = EscrowReleasedEvent {
            payment_id: PaymentId::new(),
            booking_id: BookingId::new(),
            runner_id: Uuid::new_v4(),
            runner_payout: 127_500,
            platform_fee: 22_500,
            currency: "MYR".to_string(),
            occurred_at: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: EscrowReleasedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.payment_id, event.payment_id);
        assert_eq!(back.runner_payout, 127_500);
        assert_eq!(back.platform_fee, 22_500);
        assert_eq!(back.currency, "MYR");
    }

    #[test]
    fn test_booking_cancelled_parses_external_shape() {
        // The booking service publishes plain snake_case JSON.
        let booking_id = BookingId::new();
        let json = serde_json::json!({
            "booking_id": booking_id,
            "cancelled_by": Uuid::new_v4(),
            "reason": "owner cancelled",
            "occurred_at": Utc::now(),
        });

        let event: BookingCancelledEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.booking_id, booking_id);
        assert_eq!(event.reason, "owner cancelled");
    }
}
