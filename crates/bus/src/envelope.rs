//! The event envelope.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::BusError;

/// Metadata wrapper around an event payload.
///
/// Every published event carries a unique id, the producing service,
/// a type identifier used for routing, and the payload as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique per publish; consumers may use it for deduplication.
    pub id: Uuid,

    /// The producing service, e.g. `payment-service`.
    pub source: String,

    /// The event type identifier, e.g. `payment.escrow_held`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred at the producer.
    pub occurred_at: DateTime<Utc>,

    /// The event payload as JSON.
    pub data: serde_json::Value,
}

impl Envelope {
    /// Wraps a payload into a new envelope with a fresh id.
    pub fn new<T: Serialize>(
        source: impl Into<String>,
        event_type: impl Into<String>,
        data: &T,
    ) -> Result<Self, BusError> {
        Ok(Self {
            id: Uuid::new_v4(),
            source: source.into(),
            event_type: event_type.into(),
            occurred_at: Utc::now(),
            data: serde_json::to_value(data)?,
        })
    }

    /// Decodes the payload into a concrete event type.
    pub fn parse_data<T: DeserializeOwned>(&self) -> Result<T, BusError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}
