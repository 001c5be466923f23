//! Billing-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | ValidationFailed | 400 |
//! | Gateway | 502 |
//! | PaymentNotFound | 200 on the callback route, 404 elsewhere |
//! | MalformedCallback | 400 |
//! | InvalidCallbackToken | 401 |
//! | InvalidState | 409 |
//! | TrialAlreadyStarted | 409 |
//! | Persistence | 500 |

use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, UserId, ValidationError};

/// Billing errors surfaced by the application handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// Caller input was malformed (phone number, plan id, user id).
    ValidationFailed { field: String, message: String },

    /// The payment gateway refused or could not process the push request.
    Gateway { reason: String },

    /// A callback referenced a payment that does not exist.
    PaymentNotFound(PaymentId),

    /// The callback body could not be interpreted.
    MalformedCallback(String),

    /// The callback URL token did not match the payment.
    InvalidCallbackToken,

    /// The requested operation is illegal in the current state.
    InvalidState(String),

    /// The user already used their one-time trial.
    TrialAlreadyStarted(UserId),

    /// A storage read or write failed.
    Persistence(String),
}

impl BillingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn gateway(reason: impl Into<String>) -> Self {
        BillingError::Gateway {
            reason: reason.into(),
        }
    }

    pub fn payment_not_found(id: PaymentId) -> Self {
        BillingError::PaymentNotFound(id)
    }

    pub fn malformed_callback(reason: impl Into<String>) -> Self {
        BillingError::MalformedCallback(reason.into())
    }

    pub fn invalid_callback_token() -> Self {
        BillingError::InvalidCallbackToken
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        BillingError::InvalidState(message.into())
    }

    pub fn trial_already_started(user_id: UserId) -> Self {
        BillingError::TrialAlreadyStarted(user_id)
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        BillingError::Persistence(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            BillingError::ValidationFailed { .. } | BillingError::MalformedCallback(_) => {
                ErrorCode::ValidationFailed
            }
            BillingError::Gateway { .. } => ErrorCode::ExternalServiceError,
            BillingError::PaymentNotFound(_) => ErrorCode::PaymentNotFound,
            BillingError::InvalidCallbackToken => ErrorCode::ValidationFailed,
            BillingError::InvalidState(_) => ErrorCode::InvalidStateTransition,
            BillingError::TrialAlreadyStarted(_) => ErrorCode::Conflict,
            BillingError::Persistence(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-facing error message.
    pub fn message(&self) -> String {
        match self {
            BillingError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            BillingError::Gateway { reason } => format!("Payment request failed: {}", reason),
            BillingError::PaymentNotFound(id) => format!("Payment not found: {}", id),
            BillingError::MalformedCallback(reason) => {
                format!("Malformed payment callback: {}", reason)
            }
            BillingError::InvalidCallbackToken => "Invalid callback token".to_string(),
            BillingError::InvalidState(message) => message.clone(),
            BillingError::TrialAlreadyStarted(user_id) => {
                format!("Trial already used by user {}", user_id)
            }
            BillingError::Persistence(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if the caller (or the gateway's redelivery) should retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::Persistence(_))
    }
}

impl std::fmt::Display for BillingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for BillingError {}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        BillingError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => BillingError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::InvalidStateTransition
            | ErrorCode::PaymentAlreadyFinalized
            | ErrorCode::Conflict => BillingError::InvalidState(err.message),
            ErrorCode::ExternalServiceError => BillingError::Gateway {
                reason: err.message,
            },
            _ => BillingError::Persistence(err.to_string()),
        }
    }
}

impl From<BillingError> for DomainError {
    fn from(err: BillingError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_keeps_field() {
        let err: BillingError = ValidationError::invalid_format("phone_number", "too short").into();
        assert!(matches!(
            err,
            BillingError::ValidationFailed { ref field, .. } if field == "phone_number"
        ));
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
    }

    #[test]
    fn gateway_message_carries_reason() {
        let err = BillingError::gateway("Invalid PhoneNumber");
        assert_eq!(err.to_string(), "Payment request failed: Invalid PhoneNumber");
        assert_eq!(err.code(), ErrorCode::ExternalServiceError);
    }

    #[test]
    fn only_persistence_is_retryable() {
        assert!(BillingError::persistence("connection reset").is_retryable());
        assert!(!BillingError::gateway("declined").is_retryable());
        assert!(!BillingError::payment_not_found(PaymentId::new()).is_retryable());
    }

    #[test]
    fn domain_conflict_maps_to_invalid_state() {
        let err: BillingError = DomainError::new(ErrorCode::Conflict, "already").into();
        assert_eq!(err, BillingError::InvalidState("already".to_string()));
    }

    #[test]
    fn database_domain_error_maps_to_persistence() {
        let err: BillingError = DomainError::database("pool timed out").into();
        assert!(matches!(err, BillingError::Persistence(_)));
    }

    #[test]
    fn round_trips_code_into_domain_error() {
        let domain: DomainError = BillingError::invalid_callback_token().into();
        assert_eq!(domain.code, ErrorCode::ValidationFailed);
        assert_eq!(domain.message, "Invalid callback token");
    }
}
