//! Escrow saga workflows.

use std::sync::Arc;

use bus::{Envelope, EventPublisher};
use chrono::Utc;
use common::{BookingId, PaymentId};
use domain::Payment;
use domain::events::{
    EVENT_SOURCE, EscrowFailedEvent, EscrowHeldEvent, EscrowRefundedEvent, EscrowReleasedEvent,
    PAYMENT_ESCROW_FAILED, PAYMENT_ESCROW_HELD, PAYMENT_ESCROW_REFUNDED, PAYMENT_ESCROW_RELEASED,
    TOPIC_PAYMENT_EVENTS,
};
use gateway::{Authorization, PaymentGateway};
use store::PaymentStore;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::SagaError;
use crate::step::{Saga, SagaStep};

/// Saga name: create and hold a new escrow.
pub const CREATE_ESCROW: &str = "create_escrow";

/// Saga name: capture and release a held escrow to the runner.
pub const RELEASE_ESCROW: &str = "release_escrow";

/// Saga name: void and refund a held escrow to the owner.
pub const REFUND_ESCROW: &str = "refund_escrow";

/// Step name: persist the pending payment.
pub const STEP_SAVE_PAYMENT: &str = "save_payment";

/// Step name: authorize funds at the gateway without capturing.
pub const STEP_AUTHORIZE: &str = "authorize";

/// Step name: transition the aggregate to held and persist.
pub const STEP_HOLD_ESCROW: &str = "hold_escrow";

/// Step name: publish `payment.escrow_held`.
pub const STEP_PUBLISH_HELD: &str = "publish_escrow_held";

/// Step name: capture the gateway authorization.
pub const STEP_CAPTURE: &str = "capture";

/// Step name: transition the aggregate to released and persist.
pub const STEP_RELEASE_TO_RUNNER: &str = "release_to_runner";

/// Step name: publish `payment.escrow_released`.
pub const STEP_PUBLISH_RELEASED: &str = "publish_escrow_released";

/// Step name: void the gateway authorization.
pub const STEP_VOID_AUTHORIZATION: &str = "void_authorization";

/// Step name: transition the aggregate to refunded and persist.
pub const STEP_REFUND_IN_DOMAIN: &str = "refund_in_domain";

/// Step name: publish `payment.escrow_refunded`.
pub const STEP_PUBLISH_REFUNDED: &str = "publish_escrow_refunded";

/// Orchestrates the escrow payment workflows.
///
/// Each workflow builds a [`Saga`] whose steps close over the shared
/// aggregate; the store's optimistic locking serializes concurrent
/// workflows on the same payment. The service itself is cheap to clone
/// per invocation through its `Arc`-held ports.
pub struct EscrowSagaService<S, G, B> {
    store: Arc<S>,
    gateway: Arc<G>,
    publisher: Arc<B>,
    platform_fee_percent: f64,
}

impl<S, G, B> EscrowSagaService<S, G, B>
where
    S: PaymentStore + 'static,
    G: PaymentGateway + 'static,
    B: EventPublisher + 'static,
{
    /// Creates a new escrow saga service.
    pub fn new(
        store: Arc<S>,
        gateway: Arc<G>,
        publisher: Arc<B>,
        platform_fee_percent: f64,
    ) -> Self {
        Self {
            store,
            gateway,
            publisher,
            platform_fee_percent,
        }
    }

    /// Creates a payment, authorizes funds at the gateway, holds the
    /// escrow and publishes `payment.escrow_held`.
    ///
    /// Returns the held aggregate on success. On failure the executed
    /// steps are compensated and a `payment.escrow_failed` event is
    /// published best-effort.
    #[tracing::instrument(skip(self, customer_email))]
    pub async fn create_escrow(
        &self,
        booking_id: BookingId,
        owner_id: Uuid,
        amount_cents: i64,
        currency: &str,
        customer_email: &str,
    ) -> Result<Payment, SagaError> {
        let payment = Payment::new(
            booking_id,
            owner_id,
            amount_cents,
            currency,
            self.platform_fee_percent,
        )?;

        let payment = Arc::new(Mutex::new(payment));
        let authorization: Arc<Mutex<Option<Authorization>>> = Arc::new(Mutex::new(None));
        let currency = currency.to_string();
        let customer_email = customer_email.to_string();

        let mut saga = Saga::new(CREATE_ESCROW);

        // Step 1: persist the pending payment.
        {
            let store = Arc::clone(&self.store);
            let step_payment = Arc::clone(&payment);
            saga.add_step(
                SagaStep::new(STEP_SAVE_PAYMENT, move || {
                    let store = Arc::clone(&store);
                    let payment = Arc::clone(&step_payment);
                    Box::pin(async move {
                        let p = payment.lock().await;
                        store.save(&p).await?;
                        Ok(())
                    })
                })
                .with_compensation({
                    let store = Arc::clone(&self.store);
                    let payment = Arc::clone(&payment);
                    move || {
                        let store = Arc::clone(&store);
                        let payment = Arc::clone(&payment);
                        Box::pin(async move {
                            let mut p = payment.lock().await;
                            // A later compensation may already have failed
                            // the aggregate; the write happens at most once.
                            if p.fail("saga compensation: escrow creation failed").is_ok() {
                                p.bump_version();
                                store.update(&p).await?;
                            }
                            Ok(())
                        })
                    }
                }),
            );
        }

        // Step 2: authorize funds without capturing.
        {
            let gateway = Arc::clone(&self.gateway);
            let auth_slot = Arc::clone(&authorization);
            saga.add_step(
                SagaStep::new(STEP_AUTHORIZE, move || {
                    let gateway = Arc::clone(&gateway);
                    let auth_slot = Arc::clone(&auth_slot);
                    let currency = currency.clone();
                    let customer_email = customer_email.clone();
                    Box::pin(async move {
                        let auth = gateway
                            .authorize(amount_cents, &currency, &customer_email)
                            .await?;
                        *auth_slot.lock().await = Some(auth);
                        Ok(())
                    })
                })
                .with_compensation({
                    let gateway = Arc::clone(&self.gateway);
                    let auth_slot = Arc::clone(&authorization);
                    move || {
                        let gateway = Arc::clone(&gateway);
                        let auth_slot = Arc::clone(&auth_slot);
                        Box::pin(async move {
                            if let Some(auth) = auth_slot.lock().await.clone() {
                                gateway.void(&auth.gateway_ref).await?;
                            }
                            Ok(())
                        })
                    }
                }),
            );
        }

        // Step 3: hold the escrow and persist.
        {
            let store = Arc::clone(&self.store);
            let step_payment = Arc::clone(&payment);
            let auth_slot = Arc::clone(&authorization);
            saga.add_step(
                SagaStep::new(STEP_HOLD_ESCROW, move || {
                    let store = Arc::clone(&store);
                    let payment = Arc::clone(&step_payment);
                    let auth_slot = Arc::clone(&auth_slot);
                    Box::pin(async move {
                        let auth = auth_slot.lock().await.clone().ok_or_else(|| {
                            SagaError::Internal("authorization not recorded".to_string())
                        })?;
                        let mut p = payment.lock().await;
                        p.hold(auth.gateway_ref)?;
                        p.bump_version();
                        store.update(&p).await?;
                        Ok(())
                    })
                })
                .with_compensation({
                    let store = Arc::clone(&self.store);
                    let gateway = Arc::clone(&self.gateway);
                    let payment = Arc::clone(&payment);
                    let auth_slot = Arc::clone(&authorization);
                    move || {
                        let store = Arc::clone(&store);
                        let gateway = Arc::clone(&gateway);
                        let payment = Arc::clone(&payment);
                        let auth_slot = Arc::clone(&auth_slot);
                        Box::pin(async move {
                            if let Some(auth) = auth_slot.lock().await.clone()
                                && let Err(err) = gateway.void(&auth.gateway_ref).await
                            {
                                tracing::warn!(
                                    gateway_ref = %auth.gateway_ref,
                                    error = %err,
                                    "void during compensation failed"
                                );
                            }
                            let mut p = payment.lock().await;
                            if p.fail("saga compensation: hold escrow failed").is_ok() {
                                p.bump_version();
                                store.update(&p).await?;
                            }
                            Ok(())
                        })
                    }
                }),
            );
        }

        // Step 4: publish the held event. Events are append-only, so
        // there is nothing to compensate.
        {
            let publisher = Arc::clone(&self.publisher);
            let step_payment = Arc::clone(&payment);
            saga.add_step(SagaStep::new(STEP_PUBLISH_HELD, move || {
                let publisher = Arc::clone(&publisher);
                let payment = Arc::clone(&step_payment);
                Box::pin(async move {
                    let p = payment.lock().await;
                    let event = EscrowHeldEvent {
                        payment_id: p.id(),
                        booking_id: p.booking_id(),
                        gateway_ref: p.gateway_ref().to_string(),
                        amount_cents: p.amount_cents(),
                        currency: p.currency().to_string(),
                        occurred_at: Utc::now(),
                    };
                    let envelope = Envelope::new(EVENT_SOURCE, PAYMENT_ESCROW_HELD, &event)?;
                    publisher.publish(TOPIC_PAYMENT_EVENTS, envelope).await?;
                    Ok(())
                })
            }));
        }

        if let Err(err) = saga.execute().await {
            let (payment_id, booking_id) = {
                let p = payment.lock().await;
                (p.id(), p.booking_id())
            };
            self.publish_failed(payment_id, booking_id, &err.to_string())
                .await;
            return Err(err);
        }

        let held = payment.lock().await.clone();
        Ok(held)
    }

    /// Captures the gateway authorization, releases the escrow to the
    /// runner and publishes `payment.escrow_released`.
    #[tracing::instrument(skip(self))]
    pub async fn release_escrow(
        &self,
        payment_id: PaymentId,
        runner_id: Uuid,
    ) -> Result<(), SagaError> {
        // Prerequisite, not a step: nothing to compensate if the
        // payment cannot be loaded.
        let payment = self.store.find_by_id(payment_id).await?;
        let booking_id = payment.booking_id();
        let amount_cents = payment.amount_cents();
        let gateway_ref = payment.gateway_ref().to_string();
        let payment = Arc::new(Mutex::new(payment));

        let mut saga = Saga::new(RELEASE_ESCROW);

        // Step 1: capture the authorized funds. The only reversal of a
        // capture is a refund, an imperfect recovery at best.
        {
            let gateway = Arc::clone(&self.gateway);
            let step_ref = gateway_ref.clone();
            saga.add_step(
                SagaStep::new(STEP_CAPTURE, move || {
                    let gateway = Arc::clone(&gateway);
                    let gateway_ref = step_ref.clone();
                    Box::pin(async move {
                        gateway.capture(&gateway_ref).await?;
                        Ok(())
                    })
                })
                .with_compensation({
                    let gateway = Arc::clone(&self.gateway);
                    let gateway_ref = gateway_ref.clone();
                    move || {
                        let gateway = Arc::clone(&gateway);
                        let gateway_ref = gateway_ref.clone();
                        Box::pin(async move {
                            gateway.refund(&gateway_ref, amount_cents).await?;
                            Ok(())
                        })
                    }
                }),
            );
        }

        // Step 2: release to the runner and persist. The state change
        // is the intended outcome; no compensation.
        {
            let store = Arc::clone(&self.store);
            let step_payment = Arc::clone(&payment);
            saga.add_step(SagaStep::new(STEP_RELEASE_TO_RUNNER, move || {
                let store = Arc::clone(&store);
                let payment = Arc::clone(&step_payment);
                Box::pin(async move {
                    let mut p = payment.lock().await;
                    p.release(runner_id)?;
                    p.bump_version();
                    store.update(&p).await?;
                    Ok(())
                })
            }));
        }

        // Step 3: publish the released event.
        {
            let publisher = Arc::clone(&self.publisher);
            let step_payment = Arc::clone(&payment);
            saga.add_step(SagaStep::new(STEP_PUBLISH_RELEASED, move || {
                let publisher = Arc::clone(&publisher);
                let payment = Arc::clone(&step_payment);
                Box::pin(async move {
                    let p = payment.lock().await;
                    let event = EscrowReleasedEvent {
                        payment_id: p.id(),
                        booking_id: p.booking_id(),
                        runner_id,
                        runner_payout: p.runner_payout_cents(),
                        platform_fee: p.platform_fee_cents(),
                        currency: p.currency().to_string(),
                        occurred_at: Utc::now(),
                    };
                    let envelope = Envelope::new(EVENT_SOURCE, PAYMENT_ESCROW_RELEASED, &event)?;
                    publisher.publish(TOPIC_PAYMENT_EVENTS, envelope).await?;
                    Ok(())
                })
            }));
        }

        if let Err(err) = saga.execute().await {
            self.publish_failed(payment_id, booking_id, &err.to_string())
                .await;
            return Err(err);
        }

        Ok(())
    }

    /// Voids the gateway authorization, refunds the escrow in the
    /// domain and publishes `payment.escrow_refunded`.
    #[tracing::instrument(skip(self, reason))]
    pub async fn refund_escrow(
        &self,
        payment_id: PaymentId,
        reason: &str,
    ) -> Result<(), SagaError> {
        let payment = self.store.find_by_id(payment_id).await?;
        let booking_id = payment.booking_id();
        let gateway_ref = payment.gateway_ref().to_string();
        let payment = Arc::new(Mutex::new(payment));
        let reason = reason.to_string();

        let mut saga = Saga::new(REFUND_ESCROW);

        // Step 1: void the uncaptured authorization. A void cannot be
        // undone; no compensation.
        {
            let gateway = Arc::clone(&self.gateway);
            saga.add_step(SagaStep::new(STEP_VOID_AUTHORIZATION, move || {
                let gateway = Arc::clone(&gateway);
                let gateway_ref = gateway_ref.clone();
                Box::pin(async move {
                    gateway.void(&gateway_ref).await?;
                    Ok(())
                })
            }));
        }

        // Step 2: refund in the domain and persist.
        {
            let store = Arc::clone(&self.store);
            let step_payment = Arc::clone(&payment);
            saga.add_step(SagaStep::new(STEP_REFUND_IN_DOMAIN, move || {
                let store = Arc::clone(&store);
                let payment = Arc::clone(&step_payment);
                let reason = reason.clone();
                Box::pin(async move {
                    let mut p = payment.lock().await;
                    p.refund(reason)?;
                    p.bump_version();
                    store.update(&p).await?;
                    Ok(())
                })
            }));
        }

        // Step 3: publish the refunded event.
        {
            let publisher = Arc::clone(&self.publisher);
            let step_payment = Arc::clone(&payment);
            saga.add_step(SagaStep::new(STEP_PUBLISH_REFUNDED, move || {
                let publisher = Arc::clone(&publisher);
                let payment = Arc::clone(&step_payment);
                Box::pin(async move {
                    let p = payment.lock().await;
                    let event = EscrowRefundedEvent {
                        payment_id: p.id(),
                        booking_id: p.booking_id(),
                        owner_id: p.owner_id(),
                        amount_cents: p.amount_cents(),
                        currency: p.currency().to_string(),
                        refund_reason: p.refund_reason().to_string(),
                        occurred_at: Utc::now(),
                    };
                    let envelope = Envelope::new(EVENT_SOURCE, PAYMENT_ESCROW_REFUNDED, &event)?;
                    publisher.publish(TOPIC_PAYMENT_EVENTS, envelope).await?;
                    Ok(())
                })
            }));
        }

        if let Err(err) = saga.execute().await {
            self.publish_failed(payment_id, booking_id, &err.to_string())
                .await;
            return Err(err);
        }

        Ok(())
    }

    /// Publishes `payment.escrow_failed` best-effort; errors are logged
    /// and never propagated.
    async fn publish_failed(&self, payment_id: PaymentId, booking_id: BookingId, reason: &str) {
        let event = EscrowFailedEvent {
            payment_id,
            booking_id,
            reason: reason.to_string(),
            occurred_at: Utc::now(),
        };

        let envelope = match Envelope::new(EVENT_SOURCE, PAYMENT_ESCROW_FAILED, &event) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::error!(error = %err, "failed to build escrow failed envelope");
                return;
            }
        };

        if let Err(err) = self.publisher.publish(TOPIC_PAYMENT_EVENTS, envelope).await {
            tracing::error!(error = %err, "failed to publish escrow failed event");
        }
    }
}
