//! End-to-end saga tests over the in-memory ports.

use std::sync::Arc;

use async_trait::async_trait;
use bus::InMemoryEventBus;
use common::BookingId;
use domain::EscrowStatus;
use domain::events::{
    EscrowReleasedEvent, PAYMENT_ESCROW_FAILED, PAYMENT_ESCROW_HELD, PAYMENT_ESCROW_RELEASED,
    PAYMENT_ESCROW_REFUNDED, TOPIC_PAYMENT_EVENTS,
};
use gateway::{Authorization, GatewayError, MockGateway, PaymentGateway};
use saga::{CREATE_ESCROW, EscrowSagaService, STEP_AUTHORIZE, SagaError};
use store::{InMemoryPaymentStore, PaymentStore, StoreError};
use tokio::sync::Barrier;
use uuid::Uuid;

type Service = EscrowSagaService<InMemoryPaymentStore, MockGateway, InMemoryEventBus>;

fn setup() -> (Service, Arc<InMemoryPaymentStore>, Arc<MockGateway>, InMemoryEventBus) {
    let store = Arc::new(InMemoryPaymentStore::new());
    let gateway = Arc::new(MockGateway::new());
    let bus = InMemoryEventBus::new();

    let service = EscrowSagaService::new(
        Arc::clone(&store),
        Arc::clone(&gateway),
        Arc::new(bus.clone()),
        15.0,
    );

    (service, store, gateway, bus)
}

#[tokio::test]
async fn full_escrow_lifecycle_hold_then_release() {
    let (service, store, gateway, bus) = setup();
    let booking_id = BookingId::new();
    let owner_id = Uuid::new_v4();
    let runner_id = Uuid::new_v4();

    let payment = service
        .create_escrow(booking_id, owner_id, 150_000, "MYR", "o@x")
        .await
        .unwrap();
    assert_eq!(payment.status(), EscrowStatus::Held);
    assert_eq!(payment.platform_fee_cents(), 22_500);
    assert_eq!(payment.runner_payout_cents(), 127_500);
    assert!(payment.version() >= 2);
    assert!(!payment.gateway_ref().is_empty());

    service.release_escrow(payment.id(), runner_id).await.unwrap();

    let stored = store.find_by_booking(booking_id).await.unwrap();
    assert_eq!(stored.status(), EscrowStatus::Released);
    assert_eq!(stored.runner_id(), Some(runner_id));
    assert!(stored.released_at().is_some());
    assert!(gateway.is_captured(stored.gateway_ref()));

    let events = bus.published(TOPIC_PAYMENT_EVENTS).await;
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, [PAYMENT_ESCROW_HELD, PAYMENT_ESCROW_RELEASED]);

    let released: EscrowReleasedEvent = events[1].parse_data().unwrap();
    assert_eq!(released.runner_payout, 127_500);
    assert_eq!(released.platform_fee, 22_500);
    assert_eq!(released.currency, "MYR");
}

#[tokio::test]
async fn full_escrow_lifecycle_hold_then_refund() {
    let (service, store, gateway, bus) = setup();
    let booking_id = BookingId::new();

    let payment = service
        .create_escrow(booking_id, Uuid::new_v4(), 80_000, "MYR", "o@x")
        .await
        .unwrap();

    service
        .refund_escrow(payment.id(), "booking cancelled: owner cancelled")
        .await
        .unwrap();

    let stored = store.find_by_booking(booking_id).await.unwrap();
    assert_eq!(stored.status(), EscrowStatus::Refunded);
    assert!(stored.refund_reason().contains("booking cancelled"));
    assert!(stored.refunded_at().is_some());
    assert!(gateway.is_voided(stored.gateway_ref()));

    let events = bus.published(TOPIC_PAYMENT_EVENTS).await;
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, [PAYMENT_ESCROW_HELD, PAYMENT_ESCROW_REFUNDED]);
}

#[tokio::test]
async fn gateway_decline_leaves_failed_row_and_failure_event() {
    let (service, store, gateway, bus) = setup();
    gateway.set_fail_on_authorize(true);
    let booking_id = BookingId::new();

    let err = service
        .create_escrow(booking_id, Uuid::new_v4(), 150_000, "MYR", "o@x")
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains(CREATE_ESCROW));
    assert!(message.contains(STEP_AUTHORIZE));
    assert!(matches!(
        err.root_cause(),
        SagaError::Gateway(GatewayError::Declined(_))
    ));

    // No payment ended up held; the row is marked failed.
    let stored = store.find_by_booking(booking_id).await.unwrap();
    assert_eq!(stored.status(), EscrowStatus::Failed);

    let events = bus.published(TOPIC_PAYMENT_EVENTS).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, PAYMENT_ESCROW_FAILED);
}

#[tokio::test]
async fn concurrent_initiate_same_booking_yields_one_payment() {
    let (service, store, _gateway, _bus) = setup();
    let booking_id = BookingId::new();

    let (first, second) = tokio::join!(
        service.create_escrow(booking_id, Uuid::new_v4(), 150_000, "MYR", "a@x"),
        service.create_escrow(booking_id, Uuid::new_v4(), 150_000, "MYR", "b@x"),
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);

    let loser = if first.is_err() { first } else { second };
    assert!(matches!(
        loser.unwrap_err().root_cause(),
        SagaError::Store(StoreError::Duplicate(_))
    ));

    assert_eq!(store.len().await, 1);
    let stored = store.find_by_booking(booking_id).await.unwrap();
    assert_eq!(stored.status(), EscrowStatus::Held);
}

/// Gateway wrapper that parks `capture` callers on a barrier, forcing
/// two release workflows to observe the same stored version before
/// either one writes.
struct BarrierGateway {
    inner: Arc<MockGateway>,
    barrier: Arc<Barrier>,
}

#[async_trait]
impl PaymentGateway for BarrierGateway {
    async fn authorize(
        &self,
        amount_cents: i64,
        currency: &str,
        customer_email: &str,
    ) -> Result<Authorization, GatewayError> {
        self.inner.authorize(amount_cents, currency, customer_email).await
    }

    async fn capture(&self, gateway_ref: &str) -> Result<(), GatewayError> {
        self.barrier.wait().await;
        self.inner.capture(gateway_ref).await
    }

    async fn void(&self, gateway_ref: &str) -> Result<(), GatewayError> {
        self.inner.void(gateway_ref).await
    }

    async fn refund(&self, gateway_ref: &str, amount_cents: i64) -> Result<(), GatewayError> {
        self.inner.refund(gateway_ref, amount_cents).await
    }
}

#[tokio::test]
async fn concurrent_release_has_single_winner() {
    let store = Arc::new(InMemoryPaymentStore::new());
    let mock = Arc::new(MockGateway::new());
    let bus = InMemoryEventBus::new();

    // Seed a held payment through a plain service.
    let seed_service = EscrowSagaService::new(
        Arc::clone(&store),
        Arc::clone(&mock),
        Arc::new(bus.clone()),
        15.0,
    );
    let payment = seed_service
        .create_escrow(BookingId::new(), Uuid::new_v4(), 150_000, "MYR", "o@x")
        .await
        .unwrap();

    // Both workflows rendezvous inside `capture`, after each has loaded
    // the payment at version 2.
    let barrier = Arc::new(Barrier::new(2));
    let racing_service = Arc::new(EscrowSagaService::new(
        Arc::clone(&store),
        Arc::new(BarrierGateway {
            inner: Arc::clone(&mock),
            barrier,
        }),
        Arc::new(bus.clone()),
        15.0,
    ));

    let runner_a = Uuid::new_v4();
    let runner_b = Uuid::new_v4();
    let (a, b) = tokio::join!(
        racing_service.release_escrow(payment.id(), runner_a),
        racing_service.release_escrow(payment.id(), runner_b),
    );

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);

    let loser = if a.is_err() { a } else { b };
    assert!(matches!(
        loser.unwrap_err().root_cause(),
        SagaError::Store(StoreError::ConcurrencyConflict { .. })
    ));

    // The losing workflow caused no further state change.
    let stored = store.find_by_id(payment.id()).await.unwrap();
    assert_eq!(stored.status(), EscrowStatus::Released);
    assert_eq!(stored.version(), 3);
    assert!(stored.runner_id() == Some(runner_a) || stored.runner_id() == Some(runner_b));
}
