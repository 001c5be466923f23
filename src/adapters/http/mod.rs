//! HTTP adapters - REST API implementations.
//!
//! Assembles the billing routes with the health probe and the shared
//! middleware stack.

pub mod billing;

pub use billing::{billing_router, BillingAppState};

use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Full application router: `/health` plus the billing API under `/api`.
pub fn app_router(state: BillingAppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", billing_router())
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

/// GET /health - Liveness probe
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
