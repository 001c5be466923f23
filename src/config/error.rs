//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid bind address")]
    InvalidBindAddress,

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("M-Pesa shortcode must be numeric")]
    InvalidShortcode,

    #[error("M-Pesa callback base URL must use HTTPS in production")]
    CallbackMustBeHttps,

    #[error("Invalid M-Pesa callback base URL")]
    InvalidCallbackUrl,

    #[error("Plan price must be greater than zero: {0}")]
    InvalidPlanPrice(&'static str),

    #[error("Billing UTC offset out of range")]
    InvalidUtcOffset,

    #[error("Abandoned payment threshold must be greater than zero")]
    InvalidAbandonedThreshold,
}
