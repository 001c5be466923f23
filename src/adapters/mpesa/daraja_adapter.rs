//! Safaricom Daraja (M-Pesa Express) adapter.
//!
//! Implements `PaymentGateway` with the STK push API:
//!
//! 1. `GET /oauth/v1/generate?grant_type=client_credentials` with HTTP basic
//!    auth yields a bearer token (cached until shortly before expiry).
//! 2. `POST /mpesa/stkpush/v1/processrequest` asks the payer's handset to
//!    approve the charge. The outcome arrives later on the callback URL.
//!
//! # Configuration
//!
//! ```ignore
//! let config = DarajaConfig::new(key, secret, "174379", passkey, "https://api.example.com");
//! let adapter = DarajaPaymentAdapter::new(config, signer)?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{FixedOffset, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::billing::BillingCalendar;
use crate::ports::{PaymentGateway, PaymentGatewayError, PushPaymentAccepted, PushPaymentRequest};

use super::callback_signer::CallbackSigner;

/// Sandbox host; production is `https://api.safaricom.co.ke`.
pub const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";

/// Refresh the token this long before the gateway says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";

/// Daraja accepts at most 12 characters of account reference.
const MAX_ACCOUNT_REFERENCE_LEN: usize = 12;

/// Daraja accepts at most 13 characters of description.
const MAX_DESCRIPTION_LEN: usize = 13;

/// Daraja API configuration.
#[derive(Clone)]
pub struct DarajaConfig {
    consumer_key: SecretString,
    consumer_secret: SecretString,
    /// Paybill or till number receiving the money.
    shortcode: String,
    /// Lipa Na M-Pesa Online passkey.
    passkey: SecretString,
    /// Public base URL the gateway can reach us on.
    callback_base_url: String,
    api_base_url: String,
    account_reference: String,
    transaction_description: String,
    http_timeout: Duration,
    /// Zone the gateway expects the request timestamp in.
    timezone: FixedOffset,
}

impl DarajaConfig {
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        shortcode: impl Into<String>,
        passkey: impl Into<String>,
        callback_base_url: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: SecretString::new(consumer_key.into()),
            consumer_secret: SecretString::new(consumer_secret.into()),
            shortcode: shortcode.into(),
            passkey: SecretString::new(passkey.into()),
            callback_base_url: callback_base_url.into(),
            api_base_url: SANDBOX_BASE_URL.to_string(),
            account_reference: "ElimuPlus".to_string(),
            transaction_description: "Subscription".to_string(),
            http_timeout: Duration::from_secs(30),
            timezone: BillingCalendar::default().offset(),
        }
    }

    /// Set a custom API base URL (production host, or a mock in tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_account_reference(mut self, reference: impl Into<String>) -> Self {
        self.account_reference = reference.into();
        self
    }

    pub fn with_transaction_description(mut self, description: impl Into<String>) -> Self {
        self.transaction_description = description.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_timezone(mut self, timezone: FixedOffset) -> Self {
        self.timezone = timezone;
        self
    }
}

/// Daraja payment gateway adapter.
pub struct DarajaPaymentAdapter {
    config: DarajaConfig,
    signer: Arc<CallbackSigner>,
    http_client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    value: SecretString,
    refresh_at: Instant,
}

impl DarajaPaymentAdapter {
    pub fn new(config: DarajaConfig, signer: Arc<CallbackSigner>) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            config,
            signer,
            http_client,
            token: Mutex::new(None),
        })
    }

    /// Returns a cached bearer token or fetches a fresh one.
    async fn access_token(&self) -> Result<SecretString, PaymentGatewayError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.api_base_url
        );

        let response = self
            .http_client
            .get(&url)
            .basic_auth(
                self.config.consumer_key.expose_secret(),
                Some(self.config.consumer_secret.expose_secret()),
            )
            .send()
            .await
            .map_err(|e| PaymentGatewayError::unavailable(format!("auth request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, error = %error_text, "Daraja OAuth request failed");
            return Err(if status.is_client_error() {
                PaymentGatewayError::authentication(format!(
                    "gateway refused credentials (HTTP {})",
                    status.as_u16()
                ))
            } else {
                PaymentGatewayError::unavailable(format!(
                    "gateway auth endpoint returned HTTP {}",
                    status.as_u16()
                ))
            });
        }

        let body: OAuthResponse = response.json().await.map_err(|e| {
            PaymentGatewayError::unavailable(format!("unreadable auth response: {}", e))
        })?;

        let lifetime = Duration::from_secs(body.expires_in_secs());
        let token = SecretString::new(body.access_token);
        *cached = Some(CachedToken {
            value: token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });

        tracing::debug!(expires_in_secs = lifetime.as_secs(), "Daraja access token refreshed");
        Ok(token)
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }

    fn build_push_body(&self, request: &PushPaymentRequest) -> StkPushBody {
        let timestamp = Utc::now()
            .with_timezone(&self.config.timezone)
            .format("%Y%m%d%H%M%S")
            .to_string();
        let password = BASE64.encode(format!(
            "{}{}{}",
            self.config.shortcode,
            self.config.passkey.expose_secret(),
            timestamp
        ));

        StkPushBody {
            business_short_code: self.config.shortcode.clone(),
            password,
            timestamp,
            transaction_type: TRANSACTION_TYPE,
            amount: request.amount,
            party_a: request.phone_number.as_str().to_string(),
            party_b: self.config.shortcode.clone(),
            phone_number: request.phone_number.as_str().to_string(),
            call_back_url: self
                .signer
                .callback_url(&self.config.callback_base_url, &request.payment_id),
            account_reference: truncate(&self.config.account_reference, MAX_ACCOUNT_REFERENCE_LEN),
            transaction_desc: truncate(&self.config.transaction_description, MAX_DESCRIPTION_LEN),
        }
    }
}

#[async_trait]
impl PaymentGateway for DarajaPaymentAdapter {
    async fn push_payment(
        &self,
        request: PushPaymentRequest,
    ) -> Result<PushPaymentAccepted, PaymentGatewayError> {
        let token = self.access_token().await?;
        let body = self.build_push_body(&request);
        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.config.api_base_url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    PaymentGatewayError::unavailable(format!("gateway unreachable: {}", e))
                } else {
                    // The request may have been delivered
                    PaymentGatewayError::indeterminate(format!("no response from gateway: {}", e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PaymentGatewayError::indeterminate(format!("unreadable response: {}", e)))?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.forget_token().await;
            tracing::warn!(payment_id = %request.payment_id, "Daraja rejected access token");
            return Err(PaymentGatewayError::authentication("gateway rejected access token"));
        }

        match serde_json::from_str::<StkPushResponse>(&text) {
            Ok(StkPushResponse::Accepted(accepted)) if accepted.response_code == "0" => {
                tracing::info!(
                    payment_id = %request.payment_id,
                    checkout_request_id = %accepted.checkout_request_id,
                    phone = %request.phone_number.masked(),
                    amount = request.amount,
                    "STK push accepted"
                );
                Ok(PushPaymentAccepted {
                    checkout_request_id: accepted.checkout_request_id,
                    merchant_request_id: accepted.merchant_request_id,
                    customer_message: accepted.customer_message,
                })
            }
            Ok(StkPushResponse::Accepted(refused)) => {
                tracing::warn!(
                    payment_id = %request.payment_id,
                    response_code = %refused.response_code,
                    description = %refused.response_description,
                    "STK push refused"
                );
                Err(PaymentGatewayError::rejected(refused.response_description)
                    .with_provider_code(refused.response_code))
            }
            Ok(StkPushResponse::Error(error)) => {
                tracing::warn!(
                    payment_id = %request.payment_id,
                    status = %status,
                    error_code = %error.error_code,
                    error = %error.error_message,
                    "STK push rejected"
                );
                Err(PaymentGatewayError::rejected(error.error_message)
                    .with_provider_code(error.error_code))
            }
            Err(_) => {
                tracing::error!(
                    payment_id = %request.payment_id,
                    status = %status,
                    body = %text,
                    "Unexpected STK push response"
                );
                if status.is_client_error() {
                    Err(PaymentGatewayError::rejected(format!(
                        "gateway returned HTTP {}",
                        status.as_u16()
                    )))
                } else {
                    Err(PaymentGatewayError::indeterminate(format!(
                        "unexpected gateway response (HTTP {})",
                        status.as_u16()
                    )))
                }
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Wire types
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct OAuthResponse {
    access_token: String,
    /// Seconds, sent as a string by Daraja.
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

impl OAuthResponse {
    fn expires_in_secs(&self) -> u64 {
        match &self.expires_in {
            Some(serde_json::Value::String(s)) => s.parse().unwrap_or(3599),
            Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(3599),
            _ => 3599,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushBody {
    business_short_code: String,
    password: String,
    timestamp: String,
    transaction_type: &'static str,
    amount: u64,
    party_a: String,
    party_b: String,
    phone_number: String,
    #[serde(rename = "CallBackURL")]
    call_back_url: String,
    account_reference: String,
    transaction_desc: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StkPushResponse {
    Accepted(StkPushAccepted),
    Error(DarajaErrorBody),
}

#[derive(Debug, Deserialize)]
struct StkPushAccepted {
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    customer_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DarajaErrorBody {
    #[serde(default)]
    error_code: String,
    error_message: String,
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
