//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the billing domain to external systems:
//! - `http` - Axum routes for the billing API and the gateway callback
//! - `memory` - In-memory repositories for tests and local runs
//! - `mpesa` - Daraja STK push client, callback parsing and URL signing
//! - `postgres` - PostgreSQL repositories

pub mod http;
pub mod memory;
pub mod mpesa;
pub mod postgres;
