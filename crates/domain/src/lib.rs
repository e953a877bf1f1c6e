//! Escrow payment domain model.
//!
//! The [`Payment`] aggregate is the consistency boundary for a single
//! escrowed payment: it enforces the legal escrow transitions, computes
//! the platform fee split, and carries the version used for optimistic
//! locking. It has no knowledge of persistence, the gateway, or the
//! event bus.

pub mod error;
pub mod payment;

pub use error::PaymentError;
pub use payment::{EscrowStatus, Payment, PaymentRecord, events};
