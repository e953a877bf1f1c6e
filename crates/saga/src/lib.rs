//! Escrow saga orchestration.
//!
//! This crate drives the payment aggregate through its lifecycle by
//! composing reversible steps against the store, the gateway and the
//! event bus. Three workflows are provided:
//!
//! 1. `create_escrow` — persist a pending payment, authorize funds,
//!    hold the escrow, publish `payment.escrow_held`
//! 2. `release_escrow` — capture the authorization, release to the
//!    runner, publish `payment.escrow_released`
//! 3. `refund_escrow` — void the authorization, refund in the domain,
//!    publish `payment.escrow_refunded`
//!
//! If a step fails, previously completed steps are compensated in
//! reverse order; compensation errors are logged and never abort the
//! reverse walk.

pub mod error;
pub mod escrow;
pub mod step;

pub use error::SagaError;
pub use escrow::{
    CREATE_ESCROW, EscrowSagaService, REFUND_ESCROW, RELEASE_ESCROW, STEP_AUTHORIZE, STEP_CAPTURE,
    STEP_HOLD_ESCROW, STEP_PUBLISH_HELD, STEP_PUBLISH_REFUNDED, STEP_PUBLISH_RELEASED,
    STEP_REFUND_IN_DOMAIN, STEP_RELEASE_TO_RUNNER, STEP_SAVE_PAYMENT, STEP_VOID_AUTHORIZATION,
};
pub use step::{Saga, SagaStep};
