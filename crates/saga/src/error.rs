//! Saga error types.

use bus::BusError;
use domain::PaymentError;
use gateway::GatewayError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during saga execution.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A step failed; carries the saga and step identity around the
    /// original failure.
    #[error("saga '{saga}' failed at step '{step}': {source}")]
    StepFailed {
        saga: &'static str,
        step: &'static str,
        #[source]
        source: Box<SagaError>,
    },

    /// Domain error from the payment aggregate.
    #[error("payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Gateway error.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Event bus error.
    #[error("event bus error: {0}")]
    Bus(#[from] BusError),

    /// Saga-local state was missing or inconsistent.
    #[error("internal saga error: {0}")]
    Internal(String),
}

impl SagaError {
    /// Returns the underlying failure with step wrapping peeled off.
    pub fn root_cause(&self) -> &SagaError {
        match self {
            SagaError::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns true if the root cause is an illegal aggregate transition.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self.root_cause(),
            SagaError::Payment(PaymentError::InvalidState { .. })
        )
    }
}

/// Result type for saga operations.
pub type Result<T> = std::result::Result<T, SagaError>;
