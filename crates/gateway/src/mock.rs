//! Mock gateway for development and testing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{Authorization, GatewayError, PaymentGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntentState {
    Authorized,
    Captured,
    Voided,
    Refunded,
}

#[derive(Debug, Default)]
struct MockState {
    intents: HashMap<String, IntentState>,
    fail_on_authorize: bool,
    fail_on_capture: bool,
    fail_on_void: bool,
    fail_on_refund: bool,
}

/// In-memory gateway that simulates the external provider.
///
/// References are shaped `pi_mock_<8 hex>`. Operations are idempotent
/// per reference: capturing a captured intent or voiding a voided one
/// succeeds without effect, matching the contract the workflows rely on.
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    state: Arc<RwLock<MockState>>,
}

impl MockGateway {
    /// Creates a new mock gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to decline the next authorize calls.
    pub fn set_fail_on_authorize(&self, fail: bool) {
        self.state.write().unwrap().fail_on_authorize = fail;
    }

    /// Configures the gateway to fail capture calls transiently.
    pub fn set_fail_on_capture(&self, fail: bool) {
        self.state.write().unwrap().fail_on_capture = fail;
    }

    /// Configures the gateway to fail void calls transiently.
    pub fn set_fail_on_void(&self, fail: bool) {
        self.state.write().unwrap().fail_on_void = fail;
    }

    /// Configures the gateway to fail refund calls transiently.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.state.write().unwrap().fail_on_refund = fail;
    }

    /// Returns the number of authorizations ever created.
    pub fn intent_count(&self) -> usize {
        self.state.read().unwrap().intents.len()
    }

    /// Returns true if the reference identifies a known intent.
    pub fn has_intent(&self, gateway_ref: &str) -> bool {
        self.state.read().unwrap().intents.contains_key(gateway_ref)
    }

    /// Returns true if the intent was captured.
    pub fn is_captured(&self, gateway_ref: &str) -> bool {
        self.intent_is(gateway_ref, IntentState::Captured)
    }

    /// Returns true if the intent was voided.
    pub fn is_voided(&self, gateway_ref: &str) -> bool {
        self.intent_is(gateway_ref, IntentState::Voided)
    }

    /// Returns true if the intent was refunded after capture.
    pub fn is_refunded(&self, gateway_ref: &str) -> bool {
        self.intent_is(gateway_ref, IntentState::Refunded)
    }

    fn intent_is(&self, gateway_ref: &str, expected: IntentState) -> bool {
        self.state.read().unwrap().intents.get(gateway_ref) == Some(&expected)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn authorize(
        &self,
        amount_cents: i64,
        currency: &str,
        customer_email: &str,
    ) -> Result<Authorization, GatewayError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_authorize {
            return Err(GatewayError::Declined(
                "authorization declined".to_string(),
            ));
        }

        let suffix = Uuid::new_v4().simple().to_string();
        let gateway_ref = format!("pi_mock_{}", &suffix[..8]);
        let client_secret = format!("{gateway_ref}_secret_mock");

        state
            .intents
            .insert(gateway_ref.clone(), IntentState::Authorized);

        tracing::info!(
            %gateway_ref,
            amount_cents,
            currency,
            customer_email,
            "mock gateway: payment intent authorized"
        );

        Ok(Authorization {
            gateway_ref,
            client_secret,
        })
    }

    async fn capture(&self, gateway_ref: &str) -> Result<(), GatewayError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_capture {
            return Err(GatewayError::Unavailable("capture timed out".to_string()));
        }

        match state.intents.get_mut(gateway_ref) {
            Some(intent @ IntentState::Authorized) => {
                *intent = IntentState::Captured;
            }
            Some(IntentState::Captured) => {} // idempotent per ref
            Some(other) => {
                return Err(GatewayError::Declined(format!(
                    "cannot capture intent in state {other:?}"
                )));
            }
            None => return Err(GatewayError::UnknownReference(gateway_ref.to_string())),
        }

        tracing::info!(gateway_ref, "mock gateway: payment intent captured");
        Ok(())
    }

    async fn void(&self, gateway_ref: &str) -> Result<(), GatewayError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_void {
            return Err(GatewayError::Unavailable("void timed out".to_string()));
        }

        match state.intents.get_mut(gateway_ref) {
            Some(intent @ IntentState::Authorized) => {
                *intent = IntentState::Voided;
            }
            Some(IntentState::Voided) => {} // idempotent per ref
            Some(other) => {
                return Err(GatewayError::Declined(format!(
                    "cannot void intent in state {other:?}"
                )));
            }
            None => return Err(GatewayError::UnknownReference(gateway_ref.to_string())),
        }

        tracing::info!(gateway_ref, "mock gateway: payment intent voided");
        Ok(())
    }

    async fn refund(&self, gateway_ref: &str, amount_cents: i64) -> Result<(), GatewayError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_refund {
            return Err(GatewayError::Unavailable("refund timed out".to_string()));
        }

        match state.intents.get_mut(gateway_ref) {
            Some(intent @ IntentState::Captured) => {
                *intent = IntentState::Refunded;
            }
            Some(IntentState::Refunded) => {} // idempotent per ref
            Some(other) => {
                return Err(GatewayError::Declined(format!(
                    "cannot refund intent in state {other:?}"
                )));
            }
            None => return Err(GatewayError::UnknownReference(gateway_ref.to_string())),
        }

        tracing::info!(gateway_ref, amount_cents, "mock gateway: refund created");
        Ok(())
    }
}
