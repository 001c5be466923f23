//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to the billing command/query handlers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequestParts, Json, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::adapters::mpesa::{CallbackAck, CallbackSigner, StkCallbackEnvelope};
use crate::application::handlers::billing::{
    GetSubscriptionStatusHandler, GetSubscriptionStatusQuery, HandlePaymentCallbackCommand,
    HandlePaymentCallbackHandler, InitiatePaymentCommand, InitiatePaymentHandler,
    ListAbandonedPaymentsHandler, ListAbandonedPaymentsQuery, ListPlansHandler, ListPlansQuery,
    StartTrialCommand, StartTrialHandler,
};
use crate::domain::billing::{BillingCalendar, BillingError, PlanCatalog};
use crate::domain::foundation::{PaymentId, UserId};
use crate::ports::{
    Clock, PaymentGateway, PaymentRepository, SubscriptionRepository, UserAccessRepository,
};

use super::dto::{
    AbandonedPaymentsParams, AbandonedPaymentsResponse, CallbackParams, ErrorResponse,
    InitiatePaymentRequest, InitiatePaymentResponse, PlansResponse, SubscriptionStatusResponse,
    TrialResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the billing routes.
///
/// Cloned per request; handlers are built on demand from the shared ports.
#[derive(Clone)]
pub struct BillingAppState {
    pub catalog: PlanCatalog,
    pub calendar: BillingCalendar,
    pub abandoned_after_minutes: u32,
    pub payments: Arc<dyn PaymentRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub user_access: Arc<dyn UserAccessRepository>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub clock: Arc<dyn Clock>,
    pub callback_signer: Arc<CallbackSigner>,
}

impl BillingAppState {
    pub fn list_plans_handler(&self) -> ListPlansHandler {
        ListPlansHandler::new(self.catalog)
    }

    pub fn initiate_payment_handler(&self) -> InitiatePaymentHandler {
        InitiatePaymentHandler::new(
            self.catalog,
            self.calendar,
            self.payments.clone(),
            self.subscriptions.clone(),
            self.gateway.clone(),
            self.clock.clone(),
        )
    }

    pub fn callback_handler(&self) -> HandlePaymentCallbackHandler {
        HandlePaymentCallbackHandler::new(
            self.calendar,
            self.payments.clone(),
            self.subscriptions.clone(),
            self.user_access.clone(),
            self.clock.clone(),
        )
    }

    pub fn status_handler(&self) -> GetSubscriptionStatusHandler {
        GetSubscriptionStatusHandler::new(
            self.user_access.clone(),
            self.subscriptions.clone(),
            self.clock.clone(),
        )
    }

    pub fn start_trial_handler(&self) -> StartTrialHandler {
        StartTrialHandler::new(self.user_access.clone(), self.clock.clone())
    }

    pub fn abandoned_payments_handler(&self) -> ListAbandonedPaymentsHandler {
        ListAbandonedPaymentsHandler::new(
            self.payments.clone(),
            self.clock.clone(),
            self.abandoned_after_minutes,
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Caller Identity
// ════════════════════════════════════════════════════════════════════════════════

/// Caller identity, taken from the `X-User-Id` header set by the upstream
/// authentication gateway.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection when no caller identity is present.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| UserId::new(s).ok())
            .ok_or(AuthenticationRequired)?;

        Ok(AuthenticatedUser { user_id })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/billing/plans - Plan catalog
pub async fn list_plans(State(state): State<BillingAppState>) -> impl IntoResponse {
    let result = state.list_plans_handler().handle(ListPlansQuery);
    Json(PlansResponse::from(result))
}

/// GET /api/billing/status - Effective subscription status for the caller
pub async fn get_status(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, BillingApiError> {
    let view = state
        .status_handler()
        .handle(GetSubscriptionStatusQuery {
            user_id: user.user_id,
        })
        .await?;

    Ok(Json(SubscriptionStatusResponse::from(view)))
}

/// GET /api/billing/admin/payments/abandoned - Pending payments past the threshold
pub async fn list_abandoned_payments(
    State(state): State<BillingAppState>,
    _user: AuthenticatedUser,
    Query(params): Query<AbandonedPaymentsParams>,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .abandoned_payments_handler()
        .handle(ListAbandonedPaymentsQuery {
            older_than_minutes: params.older_than_minutes,
            limit: params.limit,
        })
        .await?;

    Ok(Json(AbandonedPaymentsResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/billing/payments - Push a payment request to the caller's phone
pub async fn initiate_payment(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .initiate_payment_handler()
        .handle(InitiatePaymentCommand {
            user_id: user.user_id,
            phone_number: request.phone_number,
            plan_id: request.plan_id,
        })
        .await?;

    Ok((StatusCode::ACCEPTED, Json(InitiatePaymentResponse::from(result))))
}

/// POST /api/billing/trial - Arm the caller's one-time trial
pub async fn start_trial(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .start_trial_handler()
        .handle(StartTrialCommand {
            user_id: user.user_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(TrialResponse::from(result))))
}

/// POST /api/billing/callback?paymentId=&token= - Gateway payment callback
///
/// Unauthenticated; the URL token proves the gateway got the URL from us.
/// Unknown payment ids are acknowledged so the gateway stops redelivering.
/// Storage failures return 500 so it redelivers.
pub async fn handle_payment_callback(
    State(state): State<BillingAppState>,
    Query(params): Query<CallbackParams>,
    body: Bytes,
) -> Result<impl IntoResponse, BillingApiError> {
    let payment_id = params
        .payment_id
        .as_deref()
        .and_then(|raw| raw.parse::<PaymentId>().ok())
        .ok_or_else(|| {
            tracing::warn!("Payment callback without a valid paymentId");
            BillingError::invalid_callback_token()
        })?;

    let token = params.token.as_deref().unwrap_or_default();
    if !state.callback_signer.verify(&payment_id, token) {
        tracing::warn!(payment_id = %payment_id, "Payment callback with invalid token");
        return Err(BillingError::invalid_callback_token().into());
    }

    let outcome = StkCallbackEnvelope::parse(&body)
        .and_then(|envelope| envelope.into_outcome(state.calendar.offset()))
        .map_err(|e| {
            tracing::warn!(payment_id = %payment_id, error = %e, "Unreadable payment callback");
            e
        })?;

    match state
        .callback_handler()
        .handle(HandlePaymentCallbackCommand {
            payment_id,
            outcome,
        })
        .await
    {
        Ok(_) | Err(BillingError::PaymentNotFound(_)) => Ok(Json(CallbackAck::accepted())),
        Err(e) => Err(e.into()),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            BillingError::ValidationFailed { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
            BillingError::Gateway { .. } => (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR"),
            BillingError::PaymentNotFound(_) => (StatusCode::NOT_FOUND, "PAYMENT_NOT_FOUND"),
            BillingError::MalformedCallback(_) => (StatusCode::BAD_REQUEST, "MALFORMED_CALLBACK"),
            BillingError::InvalidCallbackToken => {
                (StatusCode::UNAUTHORIZED, "INVALID_CALLBACK_TOKEN")
            }
            BillingError::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
            BillingError::TrialAlreadyStarted(_) => {
                (StatusCode::CONFLICT, "TRIAL_ALREADY_STARTED")
            }
            BillingError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let message = match &self.0 {
            BillingError::Persistence(detail) => {
                tracing::error!(error = %detail, "Storage failure while serving request");
                "A temporary error occurred, please retry".to_string()
            }
            other => other.message(),
        };

        (status, Json(ErrorResponse::new(error_code, message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: BillingError) -> StatusCode {
        BillingApiError::from(err).into_response().status()
    }

    #[test]
    fn errors_map_to_http_statuses() {
        assert_eq!(status_of(BillingError::validation("plan_id", "unknown")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(BillingError::gateway("declined")), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_of(BillingError::payment_not_found(PaymentId::new())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(BillingError::malformed_callback("bad json")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(BillingError::invalid_callback_token()), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(BillingError::trial_already_started(UserId::new("u1").unwrap())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(BillingError::persistence("connection reset")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
