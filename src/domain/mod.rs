//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machines)
//! - `billing` - Plans, proration, payment attempts and subscription lifecycle

pub mod billing;
pub mod foundation;
