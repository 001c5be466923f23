//! Axum router configuration for billing endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    get_status, handle_payment_callback, initiate_payment, list_abandoned_payments, list_plans,
    start_trial, BillingAppState,
};

/// Create the billing API router.
///
/// # Routes
///
/// ## Caller Endpoints (`X-User-Id` required)
/// - `POST /payments` - Push a payment request
/// - `GET /status` - Effective subscription status
/// - `POST /trial` - Arm the one-time trial
///
/// ## Public Endpoints
/// - `GET /plans` - Plan catalog
///
/// ## Admin Endpoints
/// - `GET /admin/payments/abandoned` - Pending payments awaiting reconciliation
///
/// ## Gateway Endpoints (URL token verified)
/// - `POST /callback` - STK push callback
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/payments", post(initiate_payment))
        .route("/status", get(get_status))
        .route("/trial", post(start_trial))
        .route("/admin/payments/abandoned", get(list_abandoned_payments))
        .route("/callback", post(handle_payment_callback))
}

/// Billing router for mounting under `/api`.
///
/// ```ignore
/// let app = Router::new()
///     .nest("/api", billing_router())
///     .with_state(state);
/// ```
pub fn billing_router() -> Router<BillingAppState> {
    Router::new().nest("/billing", billing_routes())
}
