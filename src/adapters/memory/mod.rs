//! In-memory adapters.
//!
//! Implement the persistence ports without a database, for tests and local
//! runs.

mod billing_store;

pub use billing_store::InMemoryBillingStore;
