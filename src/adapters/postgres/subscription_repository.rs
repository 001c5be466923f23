//! PostgreSQL implementation of SubscriptionRepository.
//!
//! A confirmation touches three tables; they are written in one transaction
//! that first claims the payment row with a `status = 'pending'` guard.
//! The subscription and user rows move together, ordered by
//! `last_payment_date`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{PendingPayment, PlanId, Subscription, SubscriptionStatus, UserAccess};
use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, Timestamp, UserId};
use crate::ports::{ConfirmationCommit, SubscriptionRepository};

use super::{amount_to_db, db_error};

pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: String,
    status: String,
    plan_id: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    next_due_date: DateTime<Utc>,
    last_payment_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let plan_id = row.plan_id.parse::<PlanId>().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid plan_id: {}", e))
        })?;

        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            user_id: UserId::new(row.user_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
            })?,
            status: parse_status(&row.status)?,
            plan_id,
            // Cycle always mirrors the plan
            billing_cycle: plan_id.cadence(),
            start_date: Timestamp::from_datetime(row.start_date),
            end_date: Timestamp::from_datetime(row.end_date),
            next_due_date: Timestamp::from_datetime(row.next_due_date),
            last_payment_date: Timestamp::from_datetime(row.last_payment_date),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn parse_status(s: &str) -> Result<SubscriptionStatus, DomainError> {
    match s {
        "active" => Ok(SubscriptionStatus::Active),
        "expired" => Ok(SubscriptionStatus::Expired),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid subscription status: {}", s),
        )),
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, status, plan_id, start_date, end_date, next_due_date,
                   last_payment_date, created_at, updated_at
            FROM subscriptions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn commit_confirmation(
        &self,
        payment: &PendingPayment,
        subscription: &Subscription,
        access: &UserAccess,
    ) -> Result<ConfirmationCommit, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to start transaction", e))?;

        let claimed = sqlx::query(
            r#"
            UPDATE payments SET
                status = $2,
                gateway_transaction_id = $3,
                confirmed_amount = $4,
                start_date = $5,
                end_date = $6,
                confirmed_at = $7,
                updated_at = $8
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.status.as_str())
        .bind(&payment.gateway_transaction_id)
        .bind(payment.confirmed_amount.map(amount_to_db).transpose()?)
        .bind(payment.start_date.map(|t| *t.as_datetime()))
        .bind(payment.end_date.map(|t| *t.as_datetime()))
        .bind(payment.confirmed_at.map(|t| *t.as_datetime()))
        .bind(payment.updated_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to finalize payment", e))?;

        if claimed.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Ok(ConfirmationCommit::AlreadyFinalized);
        }

        // Returns no row when a later payment already owns the subscription
        let subscription_written: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO subscriptions (
                id, user_id, status, plan_id, billing_cycle, start_date, end_date,
                next_due_date, last_payment_date, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id) DO UPDATE SET
                status = EXCLUDED.status,
                plan_id = EXCLUDED.plan_id,
                billing_cycle = EXCLUDED.billing_cycle,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                next_due_date = EXCLUDED.next_due_date,
                last_payment_date = EXCLUDED.last_payment_date,
                updated_at = EXCLUDED.updated_at
            WHERE subscriptions.last_payment_date <= EXCLUDED.last_payment_date
            RETURNING id
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.user_id.as_str())
        .bind(subscription.status.as_str())
        .bind(subscription.plan_id.as_str())
        .bind(subscription.billing_cycle.as_str())
        .bind(subscription.start_date.as_datetime())
        .bind(subscription.end_date.as_datetime())
        .bind(subscription.next_due_date.as_datetime())
        .bind(subscription.last_payment_date.as_datetime())
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to upsert subscription", e))?;

        // The user record follows the subscription row, never a stale window
        if subscription_written.is_some() {
            sqlx::query(
                r#"
                INSERT INTO users (id, subscription_status, trial_started_at, subscription_end_at, updated_at)
                VALUES ($1, $2, $3, $4, NOW())
                ON CONFLICT (id) DO UPDATE SET
                    subscription_status = EXCLUDED.subscription_status,
                    subscription_end_at = EXCLUDED.subscription_end_at,
                    updated_at = NOW()
                "#,
            )
            .bind(access.user_id.as_str())
            .bind(access.status.as_str())
            .bind(access.trial_started_at.map(|t| *t.as_datetime()))
            .bind(access.subscription_end_at.map(|t| *t.as_datetime()))
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to update user access", e))?;
        } else {
            tracing::warn!(
                payment_id = %payment.id,
                user_id = %subscription.user_id,
                "Newer payment already applied, subscription and user record left unchanged"
            );
        }

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit confirmation", e))?;

        Ok(ConfirmationCommit::Applied)
    }
}
