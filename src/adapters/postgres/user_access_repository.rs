//! PostgreSQL implementation of UserAccessRepository.
//!
//! The access projection lives on the `users` table; rows are created on
//! first write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::billing::{AccessStatus, UserAccess};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::UserAccessRepository;

use super::db_error;

pub struct PostgresUserAccessRepository {
    pool: PgPool,
}

impl PostgresUserAccessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserAccessRow {
    id: String,
    subscription_status: String,
    trial_started_at: Option<DateTime<Utc>>,
    subscription_end_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserAccessRow> for UserAccess {
    type Error = DomainError;

    fn try_from(row: UserAccessRow) -> Result<Self, Self::Error> {
        let status = row.subscription_status.parse::<AccessStatus>().map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid subscription_status for user {}: {}", row.id, e),
            )
        })?;

        Ok(UserAccess {
            user_id: UserId::new(row.id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid user id: {}", e))
            })?,
            status,
            trial_started_at: row.trial_started_at.map(Timestamp::from_datetime),
            subscription_end_at: row.subscription_end_at.map(Timestamp::from_datetime),
        })
    }
}

#[async_trait]
impl UserAccessRepository for PostgresUserAccessRepository {
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<UserAccess>, DomainError> {
        let row: Option<UserAccessRow> = sqlx::query_as(
            r#"
            SELECT id, subscription_status, trial_started_at, subscription_end_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find user access", e))?;

        row.map(UserAccess::try_from).transpose()
    }

    async fn record_trial_start(&self, access: &UserAccess) -> Result<bool, DomainError> {
        // Never overwrites an earlier trial or a paid status
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, subscription_status, trial_started_at, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (id) DO UPDATE SET
                subscription_status = EXCLUDED.subscription_status,
                trial_started_at = EXCLUDED.trial_started_at,
                updated_at = NOW()
            WHERE users.trial_started_at IS NULL
              AND users.subscription_status = 'none'
            "#,
        )
        .bind(access.user_id.as_str())
        .bind(access.status.as_str())
        .bind(access.trial_started_at.map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to record trial start", e))?;

        Ok(result.rows_affected() == 1)
    }
}
