//! In-memory event bus for development and testing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};

use crate::{BusError, Envelope, EnvelopeHandler, EventConsumer, EventPublisher};

/// Pause before a failed delivery is put back on the queue.
const REDELIVERY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Default)]
struct Inner {
    published: HashMap<String, Vec<Envelope>>,
    queues: HashMap<(String, String), mpsc::UnboundedSender<Envelope>>,
    fail_on_publish: bool,
}

/// In-memory event bus implementation.
///
/// Keeps a per-topic log of everything published (for test assertions)
/// and one queue per `(topic, group)` with at-least-once delivery:
/// a message whose handler fails is re-enqueued after a short backoff.
/// Messages published before a group joins are not replayed; register
/// consumers first.
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryEventBus {
    /// Creates a new empty in-memory bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures publishes to fail, for failure-path tests.
    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.inner.write().await.fail_on_publish = fail;
    }

    /// Returns everything published to a topic, in publish order.
    pub async fn published(&self, topic: &str) -> Vec<Envelope> {
        self.inner
            .read()
            .await
            .published
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of envelopes published to a topic.
    pub async fn published_count(&self, topic: &str) -> usize {
        self.inner
            .read()
            .await
            .published
            .get(topic)
            .map_or(0, Vec::len)
    }

    /// Clears the published log. Queues and consumers are untouched.
    pub async fn clear(&self) {
        self.inner.write().await.published.clear();
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, topic: &str, envelope: Envelope) -> Result<(), BusError> {
        let mut inner = self.inner.write().await;

        if inner.fail_on_publish {
            return Err(BusError::Publish {
                topic: topic.to_string(),
                reason: "publish failure injected".to_string(),
            });
        }

        inner
            .published
            .entry(topic.to_string())
            .or_default()
            .push(envelope.clone());

        inner.queues.retain(|_, sender| !sender.is_closed());
        for ((queue_topic, _group), sender) in &inner.queues {
            if queue_topic == topic {
                let _ = sender.send(envelope.clone());
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventConsumer for InMemoryEventBus {
    async fn consume(
        &self,
        topic: &str,
        group: &str,
        handler: Arc<dyn EnvelopeHandler>,
    ) -> Result<(), BusError> {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let redeliver = sender.clone();

        {
            let mut inner = self.inner.write().await;
            inner
                .queues
                .insert((topic.to_string(), group.to_string()), sender);
        }
        tracing::info!(topic, group, "consumer joined");

        while let Some(envelope) = receiver.recv().await {
            if let Err(err) = handler.handle(&envelope).await {
                tracing::warn!(
                    topic,
                    group,
                    event_type = %envelope.event_type,
                    error = %err,
                    "handler failed, redelivering message"
                );
                tokio::time::sleep(REDELIVERY_BACKOFF).await;
                let _ = redeliver.send(envelope);
            }
        }

        Ok(())
    }
}
