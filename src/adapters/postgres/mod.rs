//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresPaymentRepository` - Payment attempts
//! - `PostgresSubscriptionRepository` - Subscriptions and the atomic confirmation write
//! - `PostgresUserAccessRepository` - Access projection on `users`

mod payment_repository;
mod subscription_repository;
mod user_access_repository;

pub use payment_repository::PostgresPaymentRepository;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use user_access_repository::PostgresUserAccessRepository;

use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::domain::foundation::{DomainError, ErrorCode};

/// Opens a connection pool and optionally applies `migrations/`.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DomainError> {
    let pool = config
        .pool_options()
        .connect(&config.url)
        .await
        .map_err(|e| db_error("Failed to connect to database", e))?;

    if config.run_migrations {
        tracing::info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Migration failed: {}", e))
            })?;
        tracing::info!("Database migrations completed");
    }

    Ok(pool)
}

fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, err))
}

/// Shilling amounts are stored as BIGINT.
fn amount_to_db(amount: u64) -> Result<i64, DomainError> {
    i64::try_from(amount).map_err(|_| {
        DomainError::new(ErrorCode::ValidationFailed, format!("Amount out of range: {}", amount))
    })
}

fn amount_from_db(amount: i64) -> Result<u64, DomainError> {
    u64::try_from(amount).map_err(|_| {
        DomainError::new(ErrorCode::DatabaseError, format!("Negative amount stored: {}", amount))
    })
}
