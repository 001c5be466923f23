//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, the state machine trait and the error types that
//! the billing domain is written in.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{PaymentId, SubscriptionId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
