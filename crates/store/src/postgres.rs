//! PostgreSQL-backed payment store implementation.

use async_trait::async_trait;
use common::{BookingId, PaymentId};
use domain::{EscrowStatus, Payment, PaymentRecord};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::repository::{PaymentStats, PaymentStore};
use crate::{Result, StoreError};

/// PostgreSQL-backed payment store.
///
/// `update` is a conditional write whose predicate matches both the
/// primary key and the expected version; zero affected rows means a
/// concurrent writer won the race.
#[derive(Clone)]
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    /// Creates a new PostgreSQL payment store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_payment(row: PgRow) -> Result<Payment> {
        let status: String = row.try_get("status")?;
        let status: EscrowStatus = status
            .parse()
            .map_err(|e: domain::payment::status::UnknownStatus| StoreError::Corrupt(e.to_string()))?;

        let record = PaymentRecord {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            booking_id: BookingId::from_uuid(row.try_get::<Uuid, _>("booking_id")?),
            owner_id: row.try_get("owner_id")?,
            runner_id: row.try_get("runner_id")?,
            status,
            amount_cents: row.try_get("amount_cents")?,
            platform_fee_cents: row.try_get("platform_fee_cents")?,
            runner_payout_cents: row.try_get("runner_payout_cents")?,
            currency: row.try_get("currency")?,
            gateway_ref: row.try_get("gateway_ref")?,
            held_at: row.try_get("held_at")?,
            released_at: row.try_get("released_at")?,
            refunded_at: row.try_get("refunded_at")?,
            refund_reason: row.try_get("refund_reason")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        };

        Ok(Payment::reconstitute(record))
    }
}

const SELECT_COLUMNS: &str = "id, booking_id, owner_id, runner_id, status, amount_cents, \
     platform_fee_cents, runner_payout_cents, currency, gateway_ref, \
     held_at, released_at, refunded_at, refund_reason, version, created_at, updated_at";

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn find_by_id(&self, id: PaymentId) -> Result<Payment> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_payment(row),
            None => Err(StoreError::not_found_id(id)),
        }
    }

    async fn find_by_booking(&self, booking_id: BookingId) -> Result<Payment> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM payments WHERE booking_id = $1"
        ))
        .bind(booking_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_payment(row),
            None => Err(StoreError::not_found_booking(booking_id)),
        }
    }

    async fn save(&self, payment: &Payment) -> Result<()> {
        let record = payment.to_record();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, booking_id, owner_id, runner_id, status, amount_cents,
                platform_fee_cents, runner_payout_cents, currency, gateway_ref,
                held_at, released_at, refunded_at, refund_reason, version,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, $8, $9, $10,
                $11, $12, $13, $14, $15,
                $16, $17
            )
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.booking_id.as_uuid())
        .bind(record.owner_id)
        .bind(record.runner_id)
        .bind(record.status.as_str())
        .bind(record.amount_cents)
        .bind(record.platform_fee_cents)
        .bind(record.runner_payout_cents)
        .bind(&record.currency)
        .bind(&record.gateway_ref)
        .bind(record.held_at)
        .bind(record.released_at)
        .bind(record.refunded_at)
        .bind(&record.refund_reason)
        .bind(record.version)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::Duplicate(format!(
                    "payment for booking {} already exists",
                    record.booking_id
                ));
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn update(&self, payment: &Payment) -> Result<()> {
        let record = payment.to_record();
        let expected = record.version - 1;

        let result = sqlx::query(
            r#"
            UPDATE payments SET
                runner_id = $3,
                status = $4,
                gateway_ref = $5,
                held_at = $6,
                released_at = $7,
                refunded_at = $8,
                refund_reason = $9,
                version = $10,
                updated_at = $11
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(expected)
        .bind(record.runner_id)
        .bind(record.status.as_str())
        .bind(&record.gateway_ref)
        .bind(record.held_at)
        .bind(record.released_at)
        .bind(record.refunded_at)
        .bind(&record.refund_reason)
        .bind(record.version)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConcurrencyConflict {
                payment_id: payment.id(),
                expected,
            });
        }

        Ok(())
    }

    async fn list(&self, page: u32, limit: u32) -> Result<(Vec<Payment>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments")
            .fetch_one(&self.pool)
            .await?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM payments ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let payments = rows
            .into_iter()
            .map(Self::row_to_payment)
            .collect::<Result<Vec<_>>>()?;

        Ok((payments, total))
    }

    async fn stats(&self) -> Result<PaymentStats> {
        let total_revenue_cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM payments WHERE status = 'released'",
        )
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM payments GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut stats = PaymentStats {
            total_revenue_cents,
            ..PaymentStats::default()
        };
        for row in rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            stats.count_by_status.insert(status, count);
        }

        Ok(stats)
    }
}
