//! Typed event bus port.
//!
//! Events travel as [`Envelope`]-wrapped JSON payloads. Publishing is
//! fire-and-forget (failures surface but are not retried here);
//! consumption is a long-lived loop with at-least-once delivery: a
//! message counts as processed only once the handler returns `Ok`, and
//! failed deliveries are redelivered. Handlers must therefore be
//! idempotent.

pub mod envelope;
pub mod error;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

pub use envelope::Envelope;
pub use error::BusError;
pub use memory::InMemoryEventBus;

/// Trait for publishing events to a topic.
///
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes one envelope to a topic.
    async fn publish(&self, topic: &str, envelope: Envelope) -> Result<(), BusError>;
}

/// Handler invoked for every delivered message.
#[async_trait]
pub trait EnvelopeHandler: Send + Sync {
    /// Processes one envelope. Returning an error causes redelivery.
    async fn handle(&self, envelope: &Envelope) -> Result<(), BusError>;
}

/// Trait for consuming events from a topic under a durable group.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// Delivers messages from `topic` to `handler` until shutdown.
    ///
    /// The loop never returns under normal operation; drive it from a
    /// dedicated task and cancel it by dropping the future.
    async fn consume(
        &self,
        topic: &str,
        group: &str,
        handler: Arc<dyn EnvelopeHandler>,
    ) -> Result<(), BusError>;
}
