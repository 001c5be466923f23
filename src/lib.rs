//! Elimu Billing - Subscription billing over M-Pesa
//!
//! This crate implements plan pricing, first-payment proration, STK push
//! initiation, idempotent payment confirmation and subscription status for
//! a monthly/annual subscription product billed in Kenyan shillings.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use config::ServerConfig;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured filter. Production emits JSON lines;
/// every other environment uses the human-readable formatter.
pub fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if server.is_production() {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
