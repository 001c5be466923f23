//! HTTP adapter for billing endpoints.
//!
//! - `GET /api/billing/plans` - Plan catalog
//! - `POST /api/billing/payments` - Initiate an M-Pesa push payment
//! - `GET /api/billing/status` - Caller's effective subscription status
//! - `POST /api/billing/trial` - Start the one-time free trial
//! - `GET /api/billing/admin/payments/abandoned` - Reconciliation listing
//! - `POST /api/billing/callback` - Daraja STK push callback

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{AuthenticatedUser, BillingApiError, BillingAppState};
pub use routes::{billing_router, billing_routes};
