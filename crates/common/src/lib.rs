//! Shared identifier types used across the payment service crates.

pub mod types;

pub use types::{BookingId, PaymentId};
