//! Billing domain - Plans, proration, payment attempts and subscription state.
//!
//! # Module Structure
//!
//! - `plan` - The two purchasable plans and the catalog
//! - `calendar` - Calendar-anchored period boundaries in the billing timezone
//! - `proration` - First-payment amount calculation
//! - `phone` - Payer number validation and normalization
//! - `payment` - `PendingPayment` aggregate and its status machine
//! - `subscription` - `Subscription` aggregate (one per user)
//! - `access` - Per-user access projection and the one-time trial
//! - `status` - Read-only status view for client surfaces
//! - `callback` - Gateway outcome of a push payment
//! - `errors` - Billing error type

mod access;
mod calendar;
mod callback;
mod errors;
mod payment;
mod phone;
mod plan;
mod proration;
mod status;
mod subscription;

pub use access::{AccessStatus, UserAccess, TRIAL_PERIOD_DAYS};
pub use calendar::{
    days_in_month, days_in_period, days_remaining_inclusive, is_leap_year, next_period_start,
    BillingCalendar, CoverageWindow, DEFAULT_UTC_OFFSET_MINUTES,
};
pub use callback::{GatewayOutcome, SUCCESS_RESULT_CODE};
pub use errors::BillingError;
pub use payment::{PaymentConfirmation, PaymentStatus, PendingPayment};
pub use phone::PhoneNumber;
pub use plan::{BillingCadence, Plan, PlanCatalog, PlanId};
pub use proration::{compute_prorated_amount, qualifies_for_proration, quote_charge, ChargeQuote};
pub use status::SubscriptionStatusView;
pub use subscription::{Subscription, SubscriptionStatus};
