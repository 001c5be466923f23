//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the billing domain and the outside world. Adapters implement these ports.
//!
//! ## Gateway Ports
//!
//! - `PaymentGateway` - Mobile-money push payment requests
//!
//! ## Persistence Ports
//!
//! - `PaymentRepository` - Append-only payment attempts
//! - `SubscriptionRepository` - Per-user subscription and atomic confirmation
//! - `UserAccessRepository` - Access projection on the user record
//!
//! ## Time
//!
//! - `Clock` - Current time, pinned in tests

mod clock;
mod payment_gateway;
mod payment_repository;
mod subscription_repository;
mod user_access_repository;

pub use clock::{Clock, FixedClock, SystemClock};
pub use payment_gateway::{
    PaymentGateway, PaymentGatewayError, PaymentGatewayErrorKind, PushPaymentAccepted,
    PushPaymentRequest,
};
pub use payment_repository::PaymentRepository;
pub use subscription_repository::{ConfirmationCommit, SubscriptionRepository};
pub use user_access_repository::UserAccessRepository;
