//! Payment service application layer.
//!
//! Wires the escrow workflows behind the command façade the HTTP layer
//! consumes, and bridges the booking event stream into saga
//! invocations.

pub mod config;
pub mod consumer;
pub mod service;

pub use config::Config;
pub use consumer::BookingEventConsumer;
pub use service::{
    InitiatePaymentRequest, PaymentDto, PaymentService, PaymentStatsDto, ServiceError,
};
