//! Anti-corruption layer over the external payment gateway.
//!
//! The [`PaymentGateway`] trait is the narrow capability set the escrow
//! workflows need: authorize without capture, capture, void, refund.
//! Implementations must be idempotent per gateway reference, or callers
//! treat retries as potentially double-effect.

pub mod error;
pub mod mock;

use async_trait::async_trait;

pub use error::GatewayError;
pub use mock::MockGateway;

/// A successful authorization at the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    /// Gateway-assigned reference used for all later operations.
    pub gateway_ref: String,

    /// Client secret the frontend needs to confirm the authorization.
    pub client_secret: String,
}

/// Trait for payment gateway operations.
///
/// All implementations must be safe for concurrent calls (Send + Sync).
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Authorizes funds without capturing them (two-phase payment).
    async fn authorize(
        &self,
        amount_cents: i64,
        currency: &str,
        customer_email: &str,
    ) -> Result<Authorization, GatewayError>;

    /// Completes a previously authorized charge.
    async fn capture(&self, gateway_ref: &str) -> Result<(), GatewayError>;

    /// Releases an uncaptured authorization.
    async fn void(&self, gateway_ref: &str) -> Result<(), GatewayError>;

    /// Returns funds for a captured charge.
    async fn refund(&self, gateway_ref: &str, amount_cents: i64) -> Result<(), GatewayError>;
}
