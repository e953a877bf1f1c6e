//! The payment aggregate and its event contracts.

pub mod aggregate;
pub mod events;
pub mod status;

pub use aggregate::{Payment, PaymentRecord};
pub use status::EscrowStatus;
