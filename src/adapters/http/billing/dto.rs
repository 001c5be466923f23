//! HTTP DTOs for billing endpoints.
//!
//! JSON request/response shapes for the billing API. Responses use camelCase
//! to match the mobile client.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::application::handlers::billing::{
    InitiatePaymentResult, ListAbandonedPaymentsResult, ListPlansResult, StartTrialResult,
};
use crate::domain::billing::{
    AccessStatus, BillingCadence, PaymentStatus, PendingPayment, Plan, PlanId,
    SubscriptionStatusView,
};
use crate::domain::foundation::{PaymentId, Timestamp};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a push payment.
#[derive(Debug, Clone, Deserialize)]
pub struct InitiatePaymentRequest {
    #[serde(alias = "phoneNumber")]
    pub phone_number: String,
    #[serde(alias = "planId")]
    pub plan_id: String,
}

/// Query string of the gateway callback URL.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParams {
    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
    pub token: Option<String>,
}

/// Query string of the abandoned-payments listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonedPaymentsParams {
    pub older_than_minutes: Option<u32>,
    pub limit: Option<u32>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub amount: u64,
    pub cadence: BillingCadence,
}

impl From<Plan> for PlanResponse {
    fn from(plan: Plan) -> Self {
        Self {
            amount: plan.amount,
            cadence: plan.cadence,
        }
    }
}

/// Plan catalog keyed by plan id.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct PlansResponse(BTreeMap<&'static str, PlanResponse>);

impl From<ListPlansResult> for PlansResponse {
    fn from(result: ListPlansResult) -> Self {
        Self(
            result
                .plans
                .into_iter()
                .map(|plan| (plan.id.as_str(), PlanResponse::from(plan)))
                .collect(),
        )
    }
}

/// Response once the gateway has accepted a push request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
    pub payment_id: PaymentId,
    pub checkout_request_id: String,
    pub amount: u64,
    pub is_prorated: bool,
    pub plan_id: PlanId,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_message: Option<String>,
}

impl From<InitiatePaymentResult> for InitiatePaymentResponse {
    fn from(result: InitiatePaymentResult) -> Self {
        Self {
            payment_id: result.payment.id,
            checkout_request_id: result.checkout_request_id,
            amount: result.payment.amount,
            is_prorated: result.payment.is_prorated,
            plan_id: result.payment.plan_id,
            status: result.payment.status,
            customer_message: result.customer_message,
        }
    }
}

/// Effective subscription status for the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusResponse {
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<PlanId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_in_trial: Option<bool>,
}

impl From<SubscriptionStatusView> for SubscriptionStatusResponse {
    fn from(view: SubscriptionStatusView) -> Self {
        Self {
            is_active: view.is_active,
            end_date: view.end_date,
            plan_type: view.plan_type,
            days_remaining: view.days_remaining,
            is_in_trial: view.is_in_trial,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialResponse {
    pub status: AccessStatus,
    pub trial_started_at: Option<Timestamp>,
    pub trial_ends_at: Option<Timestamp>,
}

impl From<StartTrialResult> for TrialResponse {
    fn from(result: StartTrialResult) -> Self {
        Self {
            status: result.access.status,
            trial_started_at: result.access.trial_started_at,
            trial_ends_at: result.access.trial_end(),
        }
    }
}

/// A pending payment awaiting reconciliation. The phone number is masked.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonedPaymentResponse {
    pub payment_id: PaymentId,
    pub user_id: String,
    pub plan_id: PlanId,
    pub amount: u64,
    pub phone_number: String,
    pub checkout_request_id: Option<String>,
    pub created_at: Timestamp,
}

impl From<PendingPayment> for AbandonedPaymentResponse {
    fn from(payment: PendingPayment) -> Self {
        Self {
            payment_id: payment.id,
            user_id: payment.user_id.as_str().to_string(),
            plan_id: payment.plan_id,
            amount: payment.amount,
            phone_number: payment.phone_number.masked(),
            checkout_request_id: payment.checkout_request_id,
            created_at: payment.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonedPaymentsResponse {
    pub older_than_minutes: u32,
    pub payments: Vec<AbandonedPaymentResponse>,
}

impl From<ListAbandonedPaymentsResult> for AbandonedPaymentsResponse {
    fn from(result: ListAbandonedPaymentsResult) -> Self {
        Self {
            older_than_minutes: result.older_than_minutes,
            payments: result
                .payments
                .into_iter()
                .map(AbandonedPaymentResponse::from)
                .collect(),
        }
    }
}

/// Standard error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::PlanCatalog;
    use serde_json::json;

    #[test]
    fn plans_response_is_keyed_by_plan() {
        let result = ListPlansResult {
            plans: PlanCatalog::default().plans().to_vec(),
        };
        let body = serde_json::to_value(PlansResponse::from(result)).unwrap();
        assert_eq!(
            body,
            json!({
                "monthly": {"amount": 250, "cadence": "monthly"},
                "annual": {"amount": 2500, "cadence": "annual"}
            })
        );
    }

    #[test]
    fn inactive_status_omits_optional_fields() {
        let body = serde_json::to_value(SubscriptionStatusResponse::from(
            SubscriptionStatusView::inactive(),
        ))
        .unwrap();
        assert_eq!(body, json!({"isActive": false}));
    }

    #[test]
    fn initiate_request_accepts_both_casings() {
        let snake: InitiatePaymentRequest =
            serde_json::from_value(json!({"phone_number": "0712345678", "plan_id": "monthly"}))
                .unwrap();
        let camel: InitiatePaymentRequest =
            serde_json::from_value(json!({"phoneNumber": "0712345678", "planId": "annual"}))
                .unwrap();
        assert_eq!(snake.plan_id, "monthly");
        assert_eq!(camel.phone_number, "0712345678");
    }
}
