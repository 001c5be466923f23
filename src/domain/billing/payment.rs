//! Pending payment aggregate.
//!
//! One row per charge attempt. Rows are never deleted and move out of
//! `Pending` at most once.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ChargeQuote, CoverageWindow, PhoneNumber, Plan, PlanId};
use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, StateMachine, Timestamp, UserId, ValidationError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "success" => Ok(PaymentStatus::Success),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown payment status '{}'", other),
            )),
        }
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::*;
        matches!((self, target), (Pending, Success) | (Pending, Failed))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![Success, Failed],
            Success | Failed => vec![],
        }
    }
}

/// Details of a gateway-confirmed charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub receipt_number: String,
    pub confirmed_amount: Option<u64>,
    pub transaction_date: Option<Timestamp>,
    pub window: CoverageWindow,
}

/// One in-flight or finished charge attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    /// Amount requested from the payer.
    pub amount: u64,
    pub is_prorated: bool,
    pub status: PaymentStatus,
    pub phone_number: PhoneNumber,
    /// Gateway checkout reference, set once the push is accepted.
    pub checkout_request_id: Option<String>,
    /// Gateway receipt number, set on success.
    pub gateway_transaction_id: Option<String>,
    /// Amount the gateway reports as actually paid.
    pub confirmed_amount: Option<u64>,
    pub failure_reason: Option<String>,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    /// Transaction time reported by the gateway.
    pub confirmed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PendingPayment {
    pub fn create(
        id: PaymentId,
        user_id: UserId,
        plan: &Plan,
        quote: ChargeQuote,
        phone_number: PhoneNumber,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id,
            plan_id: plan.id,
            amount: quote.amount,
            is_prorated: quote.is_prorated,
            status: PaymentStatus::Pending,
            phone_number,
            checkout_request_id: None,
            gateway_transaction_id: None,
            confirmed_amount: None,
            failure_reason: None,
            start_date: None,
            end_date: None,
            confirmed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    /// Records the gateway's checkout reference on a still-pending attempt.
    ///
    /// # Errors
    ///
    /// Returns error if the payment has already been finalized.
    pub fn attach_checkout_reference(
        &mut self,
        checkout_request_id: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        if !self.is_pending() {
            return Err(self.already_finalized());
        }
        self.checkout_request_id = Some(checkout_request_id.into());
        self.updated_at = now;
        Ok(())
    }

    /// Marks the attempt successful and stamps the coverage it bought.
    ///
    /// # Errors
    ///
    /// Returns error if the payment is not pending.
    pub fn confirm(&mut self, confirmation: PaymentConfirmation) -> Result<(), DomainError> {
        self.transition_to(PaymentStatus::Success)?;
        self.gateway_transaction_id = Some(confirmation.receipt_number);
        self.confirmed_amount = confirmation.confirmed_amount;
        self.confirmed_at = confirmation.transaction_date;
        self.start_date = Some(confirmation.window.start);
        self.end_date = Some(confirmation.window.end);
        self.updated_at = confirmation.window.start;
        Ok(())
    }

    /// Marks the attempt failed with the gateway's stated reason.
    ///
    /// # Errors
    ///
    /// Returns error if the payment is not pending.
    pub fn fail(&mut self, reason: impl Into<String>, now: Timestamp) -> Result<(), DomainError> {
        self.transition_to(PaymentStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        self.updated_at = now;
        Ok(())
    }

    /// True when the confirmed amount differs from the amount requested.
    pub fn has_amount_mismatch(&self) -> bool {
        matches!(self.confirmed_amount, Some(paid) if paid != self.amount)
    }

    /// A pending attempt older than `cutoff` that will likely never be confirmed.
    pub fn is_abandoned(&self, cutoff: Timestamp) -> bool {
        self.is_pending() && self.created_at.is_before(&cutoff)
    }

    fn already_finalized(&self) -> DomainError {
        DomainError::new(
            ErrorCode::PaymentAlreadyFinalized,
            format!("Payment {} is already {}", self.id, self.status),
        )
    }

    fn transition_to(&mut self, target: PaymentStatus) -> Result<(), DomainError> {
        if !self.is_pending() {
            return Err(self.already_finalized());
        }
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot transition payment from {:?} to {:?}", self.status, target),
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::PlanCatalog;

    fn pending(now: Timestamp) -> PendingPayment {
        let plan = PlanCatalog::default().get(PlanId::Monthly);
        PendingPayment::create(
            PaymentId::new(),
            UserId::new("user-1").unwrap(),
            &plan,
            ChargeQuote {
                amount: 24,
                is_prorated: true,
            },
            PhoneNumber::parse("0712345678").unwrap(),
            now,
        )
    }

    fn confirmation(now: Timestamp) -> PaymentConfirmation {
        PaymentConfirmation {
            receipt_number: "NLJ7RT61SV".to_string(),
            confirmed_amount: Some(24),
            transaction_date: Some(now),
            window: CoverageWindow {
                start: now,
                end: now.add_days(2),
                next_due: now.add_days(2).add_seconds(1),
            },
        }
    }

    #[test]
    fn pending_transitions_only_to_terminal_states() {
        assert!(PaymentStatus::Pending.can_transition_to(&PaymentStatus::Success));
        assert!(PaymentStatus::Pending.can_transition_to(&PaymentStatus::Failed));
        assert!(PaymentStatus::Success.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
    }

    #[test]
    fn status_parses_its_own_rendering() {
        for status in [PaymentStatus::Pending, PaymentStatus::Success, PaymentStatus::Failed] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert!("refunded".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn create_starts_pending_without_gateway_fields() {
        let payment = pending(Timestamp::now());
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount, 24);
        assert!(payment.is_prorated);
        assert!(payment.checkout_request_id.is_none());
        assert!(payment.start_date.is_none());
    }

    #[test]
    fn confirm_stamps_receipt_and_window() {
        let now = Timestamp::now();
        let mut payment = pending(now);
        payment.confirm(confirmation(now)).unwrap();

        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.gateway_transaction_id.as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(payment.start_date, Some(now));
        assert_eq!(payment.end_date, Some(now.add_days(2)));
        assert!(!payment.has_amount_mismatch());
    }

    #[test]
    fn second_outcome_is_rejected() {
        let now = Timestamp::now();
        let mut payment = pending(now);
        payment.confirm(confirmation(now)).unwrap();

        let err = payment.fail("Request cancelled by user", now).unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentAlreadyFinalized);
        assert_eq!(payment.status, PaymentStatus::Success);
    }

    #[test]
    fn failed_payment_keeps_reason() {
        let now = Timestamp::now();
        let mut payment = pending(now);
        payment.fail("Insufficient balance", now).unwrap();
        assert_eq!(payment.failure_reason.as_deref(), Some("Insufficient balance"));
        assert!(payment.attach_checkout_reference("ws_CO_1", now).is_err());
    }

    #[test]
    fn mismatch_is_detected() {
        let now = Timestamp::now();
        let mut payment = pending(now);
        let mut confirmed = confirmation(now);
        confirmed.confirmed_amount = Some(20);
        payment.confirm(confirmed).unwrap();
        assert!(payment.has_amount_mismatch());
    }

    #[test]
    fn only_old_pending_payments_are_abandoned() {
        let now = Timestamp::now();
        let payment = pending(now.minus_minutes(45));
        assert!(payment.is_abandoned(now.minus_minutes(30)));
        assert!(!payment.is_abandoned(now.minus_minutes(60)));

        let mut finished = pending(now.minus_minutes(45));
        finished.fail("timeout", now).unwrap();
        assert!(!finished.is_abandoned(now.minus_minutes(30)));
    }
}
