//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `ELIMU_BILLING`
//! prefix and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use elimu_billing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod billing;
mod database;
mod error;
mod mpesa;
mod server;

pub use billing::BillingConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use mpesa::MpesaConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP server (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL connection pool
    pub database: DatabaseConfig,

    /// Daraja credentials and callback settings
    #[serde(default)]
    pub mpesa: MpesaConfig,

    /// Prices, billing timezone, reconciliation threshold
    #[serde(default)]
    pub billing: BillingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` if present (development)
    /// 2. Reads variables with the `ELIMU_BILLING` prefix
    /// 3. Splits nested keys on `__`
    ///
    /// # Environment Variable Format
    ///
    /// - `ELIMU_BILLING__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `ELIMU_BILLING__MPESA__SHORTCODE=174379` -> `mpesa.shortcode = "174379"`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or cannot be
    /// parsed into their expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("ELIMU_BILLING")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.mpesa.validate(&self.server.environment)?;
        self.billing.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[(&str, &str)] = &[
        ("ELIMU_BILLING__DATABASE__URL", "postgres://billing@localhost/elimu"),
        ("ELIMU_BILLING__MPESA__CONSUMER_KEY", "consumer-key"),
        ("ELIMU_BILLING__MPESA__CONSUMER_SECRET", "consumer-secret"),
        ("ELIMU_BILLING__MPESA__SHORTCODE", "174379"),
        ("ELIMU_BILLING__MPESA__PASSKEY", "passkey"),
        ("ELIMU_BILLING__MPESA__CALLBACK_BASE_URL", "https://api.elimu.example"),
        ("ELIMU_BILLING__MPESA__CALLBACK_SIGNING_SECRET", "signing-secret"),
    ];

    const OPTIONAL: &[&str] = &[
        "ELIMU_BILLING__SERVER__PORT",
        "ELIMU_BILLING__SERVER__ENVIRONMENT",
        "ELIMU_BILLING__BILLING__MONTHLY_AMOUNT",
    ];

    fn set_minimal_env() {
        for (key, value) in VARS {
            env::set_var(key, value);
        }
    }

    fn clear_env() {
        for (key, _) in VARS {
            env::remove_var(key);
        }
        for key in OPTIONAL {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.database.url, "postgres://billing@localhost/elimu");
        assert_eq!(config.mpesa.shortcode, "174379");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn sections_fall_back_to_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.billing.monthly_amount, 250);
        assert_eq!(config.billing.abandoned_after_minutes, 30);
        assert!(config.mpesa.is_sandbox());
    }

    #[test]
    fn overrides_are_parsed() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("ELIMU_BILLING__SERVER__PORT", "3000");
        env::set_var("ELIMU_BILLING__SERVER__ENVIRONMENT", "production");
        env::set_var("ELIMU_BILLING__BILLING__MONTHLY_AMOUNT", "300");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.is_production());
        assert_eq!(config.billing.monthly_amount, 300);
    }

    #[test]
    fn missing_gateway_credentials_fail_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::remove_var("ELIMU_BILLING__MPESA__PASSKEY");
        let result = AppConfig::load();
        clear_env();

        assert_eq!(
            result.unwrap().validate(),
            Err(ValidationError::MissingRequired("MPESA__PASSKEY"))
        );
    }
}
