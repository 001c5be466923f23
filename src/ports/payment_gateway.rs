//! Payment gateway port for mobile-money push payments.
//!
//! Implementations obtain their own short-lived credentials, build the
//! callback URL for the payment and submit the push request. The final
//! outcome arrives later through the callback webhook, never from this call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::billing::PhoneNumber;
use crate::domain::foundation::{DomainError, ErrorCode, PaymentId};

/// Port for push-payment gateway integrations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Ask the payer's handset to approve a charge.
    ///
    /// Returns once the gateway has accepted the request, which says nothing
    /// about whether the payer will approve it.
    async fn push_payment(
        &self,
        request: PushPaymentRequest,
    ) -> Result<PushPaymentAccepted, PaymentGatewayError>;
}

/// A charge to push to the payer's handset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPaymentRequest {
    /// Local payment the callback must be routed back to.
    pub payment_id: PaymentId,
    pub phone_number: PhoneNumber,
    pub amount: u64,
}

/// Gateway acknowledgement of a push request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPaymentAccepted {
    /// Reference the callback will carry.
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    /// Message the gateway suggests showing to the payer.
    pub customer_message: Option<String>,
}

/// Errors from push-payment requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentGatewayError {
    pub kind: PaymentGatewayErrorKind,
    /// Gateway's stated reason, suitable for showing to the payer.
    pub message: String,
    /// Gateway's own error code, if it sent one.
    pub provider_code: Option<String>,
}

impl PaymentGatewayError {
    pub fn new(kind: PaymentGatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider_code: None,
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// The gateway refused the request.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(PaymentGatewayErrorKind::Rejected, message)
    }

    /// The gateway could not be reached before the request was sent.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(PaymentGatewayErrorKind::Unavailable, message)
    }

    /// Credentials were refused by the auth endpoint.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(PaymentGatewayErrorKind::Authentication, message)
    }

    /// The request may have reached the gateway but no answer came back.
    pub fn indeterminate(message: impl Into<String>) -> Self {
        Self::new(PaymentGatewayErrorKind::Indeterminate, message)
    }

    /// True when the gateway certainly did not start a charge.
    pub fn is_definitive(&self) -> bool {
        self.kind != PaymentGatewayErrorKind::Indeterminate
    }
}

impl std::fmt::Display for PaymentGatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for PaymentGatewayError {}

impl From<PaymentGatewayError> for DomainError {
    fn from(err: PaymentGatewayError) -> Self {
        DomainError::new(ErrorCode::ExternalServiceError, err.message)
            .with_detail("gateway_error", err.kind.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentGatewayErrorKind {
    Rejected,
    Unavailable,
    Authentication,
    /// Outcome unknown; the charge may still happen.
    Indeterminate,
}

impl std::fmt::Display for PaymentGatewayErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentGatewayErrorKind::Rejected => "rejected",
            PaymentGatewayErrorKind::Unavailable => "unavailable",
            PaymentGatewayErrorKind::Authentication => "authentication",
            PaymentGatewayErrorKind::Indeterminate => "indeterminate",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn PaymentGateway) {}
    }

    #[test]
    fn only_indeterminate_is_not_definitive() {
        assert!(PaymentGatewayError::rejected("Invalid PhoneNumber").is_definitive());
        assert!(PaymentGatewayError::unavailable("connect refused").is_definitive());
        assert!(PaymentGatewayError::authentication("bad key").is_definitive());
        assert!(!PaymentGatewayError::indeterminate("read timed out").is_definitive());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = PaymentGatewayError::rejected("Invalid Access Token").with_provider_code("404.001.03");
        assert_eq!(err.to_string(), "rejected: Invalid Access Token");
        assert_eq!(err.provider_code.as_deref(), Some("404.001.03"));
    }
}
