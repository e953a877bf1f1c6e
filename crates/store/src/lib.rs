//! Persistent storage for payment aggregates.
//!
//! The [`PaymentStore`] trait is the single persistence port of the
//! service: a keyed collection indexed by payment id with a unique
//! secondary index on booking id, updated under optimistic locking.
//! Two implementations are provided: [`InMemoryPaymentStore`] for
//! development and testing, and [`PostgresPaymentStore`] backed by sqlx.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use error::{Result, StoreError};
pub use memory::InMemoryPaymentStore;
pub use postgres::PostgresPaymentStore;
pub use repository::{PaymentStats, PaymentStore};
