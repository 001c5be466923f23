//! PostgreSQL implementation of PaymentRepository.
//!
//! Payments are append-only attempts; the only mutation is a guarded update
//! that applies while the row is still `pending`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{PaymentStatus, PendingPayment, PhoneNumber, PlanId};
use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, Timestamp, UserId};
use crate::ports::PaymentRepository;

use super::{amount_from_db, amount_to_db, db_error};

/// PostgreSQL implementation of the PaymentRepository port.
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a payment.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: String,
    plan_id: String,
    amount: i64,
    is_prorated: bool,
    status: String,
    phone_number: String,
    checkout_request_id: Option<String>,
    gateway_transaction_id: Option<String>,
    confirmed_amount: Option<i64>,
    failure_reason: Option<String>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    confirmed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PendingPayment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, e: &dyn std::fmt::Display| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid {} on payment {}: {}", field, row.id, e),
            )
        };

        Ok(PendingPayment {
            id: PaymentId::from_uuid(row.id),
            user_id: UserId::new(row.user_id.clone()).map_err(|e| corrupt("user_id", &e))?,
            plan_id: row
                .plan_id
                .parse::<PlanId>()
                .map_err(|e| corrupt("plan_id", &e))?,
            amount: amount_from_db(row.amount)?,
            is_prorated: row.is_prorated,
            status: row
                .status
                .parse::<PaymentStatus>()
                .map_err(|e| corrupt("status", &e))?,
            phone_number: PhoneNumber::from_normalized(row.phone_number.clone())
                .map_err(|e| corrupt("phone_number", &e))?,
            checkout_request_id: row.checkout_request_id,
            gateway_transaction_id: row.gateway_transaction_id,
            confirmed_amount: row.confirmed_amount.map(amount_from_db).transpose()?,
            failure_reason: row.failure_reason,
            start_date: row.start_date.map(Timestamp::from_datetime),
            end_date: row.end_date.map(Timestamp::from_datetime),
            confirmed_at: row.confirmed_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, plan_id, amount, is_prorated, status, phone_number,
           checkout_request_id, gateway_transaction_id, confirmed_amount, failure_reason,
           start_date, end_date, confirmed_at, created_at, updated_at
    FROM payments
"#;

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn save(&self, payment: &PendingPayment) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, plan_id, amount, is_prorated, status, phone_number,
                checkout_request_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.user_id.as_str())
        .bind(payment.plan_id.as_str())
        .bind(amount_to_db(payment.amount)?)
        .bind(payment.is_prorated)
        .bind(payment.status.as_str())
        .bind(payment.phone_number.as_str())
        .bind(&payment.checkout_request_id)
        .bind(payment.created_at.as_datetime())
        .bind(payment.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to save payment", e))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<PendingPayment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find payment", e))?;

        row.map(PendingPayment::try_from).transpose()
    }

    async fn update_if_pending(&self, payment: &PendingPayment) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = $2,
                checkout_request_id = $3,
                gateway_transaction_id = $4,
                confirmed_amount = $5,
                failure_reason = $6,
                start_date = $7,
                end_date = $8,
                confirmed_at = $9,
                updated_at = $10
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.status.as_str())
        .bind(&payment.checkout_request_id)
        .bind(&payment.gateway_transaction_id)
        .bind(payment.confirmed_amount.map(amount_to_db).transpose()?)
        .bind(&payment.failure_reason)
        .bind(payment.start_date.map(|t| *t.as_datetime()))
        .bind(payment.end_date.map(|t| *t.as_datetime()))
        .bind(payment.confirmed_at.map(|t| *t.as_datetime()))
        .bind(payment.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update payment", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_pending_created_before(
        &self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<PendingPayment>, DomainError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "{} WHERE status = 'pending' AND created_at < $1 ORDER BY created_at ASC LIMIT $2",
            SELECT_COLUMNS
        ))
        .bind(cutoff.as_datetime())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list pending payments", e))?;

        rows.into_iter().map(PendingPayment::try_from).collect()
    }
}
