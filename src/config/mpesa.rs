//! M-Pesa (Daraja) configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

/// Daraja STK push credentials and callback settings
#[derive(Debug, Clone, Deserialize)]
pub struct MpesaConfig {
    /// Daraja host; production is `https://api.safaricom.co.ke`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// OAuth consumer key
    #[serde(default)]
    pub consumer_key: String,

    /// OAuth consumer secret
    #[serde(default)]
    pub consumer_secret: String,

    /// Paybill or till number
    #[serde(default)]
    pub shortcode: String,

    /// Lipa Na M-Pesa Online passkey
    #[serde(default)]
    pub passkey: String,

    /// Public base URL the gateway posts callbacks to
    #[serde(default)]
    pub callback_base_url: String,

    /// Secret used to sign per-payment callback URLs
    #[serde(default)]
    pub callback_signing_secret: String,

    #[serde(default = "default_account_reference")]
    pub account_reference: String,

    #[serde(default = "default_transaction_description")]
    pub transaction_description: String,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

impl MpesaConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// True when pointed at the Daraja sandbox.
    pub fn is_sandbox(&self) -> bool {
        self.base_url.contains("sandbox")
    }

    /// Validate M-Pesa configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.consumer_key.is_empty() {
            return Err(ValidationError::MissingRequired("MPESA__CONSUMER_KEY"));
        }
        if self.consumer_secret.is_empty() {
            return Err(ValidationError::MissingRequired("MPESA__CONSUMER_SECRET"));
        }
        if self.shortcode.is_empty() {
            return Err(ValidationError::MissingRequired("MPESA__SHORTCODE"));
        }
        if !self.shortcode.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidShortcode);
        }
        if self.passkey.is_empty() {
            return Err(ValidationError::MissingRequired("MPESA__PASSKEY"));
        }
        if self.callback_signing_secret.is_empty() {
            return Err(ValidationError::MissingRequired("MPESA__CALLBACK_SIGNING_SECRET"));
        }
        if self.callback_base_url.is_empty() {
            return Err(ValidationError::MissingRequired("MPESA__CALLBACK_BASE_URL"));
        }
        if !self.callback_base_url.starts_with("https://")
            && !self.callback_base_url.starts_with("http://")
        {
            return Err(ValidationError::InvalidCallbackUrl);
        }
        // Daraja refuses plain-HTTP callbacks outside the sandbox
        if *environment == Environment::Production && !self.callback_base_url.starts_with("https://") {
            return Err(ValidationError::CallbackMustBeHttps);
        }
        if self.http_timeout_secs == 0 || self.http_timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for MpesaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            shortcode: String::new(),
            passkey: String::new(),
            callback_base_url: String::new(),
            callback_signing_secret: String::new(),
            account_reference: default_account_reference(),
            transaction_description: default_transaction_description(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://sandbox.safaricom.co.ke".to_string()
}

fn default_account_reference() -> String {
    "ElimuPlus".to_string()
}

fn default_transaction_description() -> String {
    "Subscription".to_string()
}

fn default_http_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> MpesaConfig {
        MpesaConfig {
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            shortcode: "174379".to_string(),
            passkey: "passkey".to_string(),
            callback_base_url: "https://api.elimu.example".to_string(),
            callback_signing_secret: "signing-secret".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_target_the_sandbox() {
        let config = MpesaConfig::default();
        assert!(config.is_sandbox());
        assert_eq!(config.account_reference, "ElimuPlus");
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn complete_config_is_valid() {
        assert!(complete().validate(&Environment::Production).is_ok());
    }

    #[test]
    fn credentials_are_required() {
        let config = MpesaConfig {
            consumer_key: String::new(),
            ..complete()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::MissingRequired("MPESA__CONSUMER_KEY"))
        );

        let config = MpesaConfig {
            callback_signing_secret: String::new(),
            ..complete()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::MissingRequired("MPESA__CALLBACK_SIGNING_SECRET"))
        );
    }

    #[test]
    fn shortcode_must_be_numeric() {
        let config = MpesaConfig {
            shortcode: "17a379".to_string(),
            ..complete()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidShortcode)
        );
    }

    #[test]
    fn plain_http_callback_only_outside_production() {
        let config = MpesaConfig {
            callback_base_url: "http://localhost:8080".to_string(),
            ..complete()
        };
        assert!(config.validate(&Environment::Development).is_ok());
        assert_eq!(
            config.validate(&Environment::Production),
            Err(ValidationError::CallbackMustBeHttps)
        );
    }
}
