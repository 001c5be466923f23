//! Billing handlers.
//!
//! ## Commands
//! - Initiating a push payment for a plan
//! - Processing gateway payment callbacks
//! - Starting the one-time free trial
//!
//! ## Queries
//! - Effective subscription status
//! - Plan catalog
//! - Abandoned payments (reconciliation hook)

mod get_subscription_status;
mod handle_payment_callback;
mod initiate_payment;
mod list_abandoned_payments;
mod list_plans;
mod start_trial;

// Commands
pub use handle_payment_callback::{
    HandlePaymentCallbackCommand, HandlePaymentCallbackHandler, HandlePaymentCallbackResult,
};
pub use initiate_payment::{InitiatePaymentCommand, InitiatePaymentHandler, InitiatePaymentResult};
pub use start_trial::{StartTrialCommand, StartTrialHandler, StartTrialResult};

// Queries
pub use get_subscription_status::{
    GetSubscriptionStatusHandler, GetSubscriptionStatusQuery, GetSubscriptionStatusResult,
};
pub use list_abandoned_payments::{
    ListAbandonedPaymentsHandler, ListAbandonedPaymentsQuery, ListAbandonedPaymentsResult,
};
pub use list_plans::{ListPlansHandler, ListPlansQuery, ListPlansResult};
