//! Booking event ingestion.

use std::sync::Arc;

use async_trait::async_trait;
use bus::{BusError, Envelope, EnvelopeHandler, EventPublisher};
use domain::events::{
    BOOKING_CANCELLED, BOOKING_DELIVERY_CONFIRMED, BookingCancelledEvent, DeliveryConfirmedEvent,
};
use gateway::PaymentGateway;
use store::PaymentStore;

use crate::service::PaymentService;

/// Routes booking events into payment workflows.
///
/// Registered as the handler of the `booking.events` consumer loop.
/// Unknown event types are ignored; handler failures cause redelivery,
/// so everything the façade swallows as success stays swallowed here.
pub struct BookingEventConsumer<S, G, B> {
    service: Arc<PaymentService<S, G, B>>,
}

impl<S, G, B> BookingEventConsumer<S, G, B> {
    /// Creates a new consumer over the payment service.
    pub fn new(service: Arc<PaymentService<S, G, B>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S, G, B> EnvelopeHandler for BookingEventConsumer<S, G, B>
where
    S: PaymentStore + 'static,
    G: PaymentGateway + 'static,
    B: EventPublisher + 'static,
{
    async fn handle(&self, envelope: &Envelope) -> Result<(), BusError> {
        tracing::info!(
            event_type = %envelope.event_type,
            event_id = %envelope.id,
            "received booking event"
        );

        if envelope.event_type.eq_ignore_ascii_case(BOOKING_DELIVERY_CONFIRMED) {
            let event: DeliveryConfirmedEvent = envelope.parse_data()?;
            self.service
                .handle_delivery_confirmed(event)
                .await
                .map_err(|err| BusError::Handler(err.to_string()))
        } else if envelope.event_type.eq_ignore_ascii_case(BOOKING_CANCELLED) {
            let event: BookingCancelledEvent = envelope.parse_data()?;
            self.service
                .handle_booking_cancelled(event)
                .await
                .map_err(|err| BusError::Handler(err.to_string()))
        } else {
            tracing::debug!(
                event_type = %envelope.event_type,
                "ignoring unhandled booking event type"
            );
            Ok(())
        }
    }
}
