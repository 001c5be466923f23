//! Elimu Billing server entry point.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio::signal;

use elimu_billing::adapters::http::{app_router, billing::BillingAppState};
use elimu_billing::adapters::mpesa::{CallbackSigner, DarajaConfig, DarajaPaymentAdapter};
use elimu_billing::adapters::postgres::{
    self, PostgresPaymentRepository, PostgresSubscriptionRepository, PostgresUserAccessRepository,
};
use elimu_billing::config::AppConfig;
use elimu_billing::init_tracing;
use elimu_billing::ports::SystemClock;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        sandbox = config.mpesa.is_sandbox(),
        "Starting elimu-billing"
    );

    let pool = postgres::connect(&config.database).await?;

    let calendar = config.billing.calendar()?;
    let signer = CallbackSigner::new(&SecretString::new(
        config.mpesa.callback_signing_secret.clone(),
    ))
    .map_err(|e| format!("Invalid callback signing secret: {}", e))?;
    let signer = Arc::new(signer);

    let daraja = DarajaConfig::new(
        config.mpesa.consumer_key.clone(),
        config.mpesa.consumer_secret.clone(),
        config.mpesa.shortcode.clone(),
        config.mpesa.passkey.clone(),
        config.mpesa.callback_base_url.clone(),
    )
    .with_base_url(config.mpesa.base_url.clone())
    .with_account_reference(config.mpesa.account_reference.clone())
    .with_transaction_description(config.mpesa.transaction_description.clone())
    .with_timeout(config.mpesa.http_timeout())
    .with_timezone(calendar.offset());
    let gateway = DarajaPaymentAdapter::new(daraja, signer.clone())?;

    let state = BillingAppState {
        catalog: config.billing.catalog(),
        calendar,
        abandoned_after_minutes: config.billing.abandoned_after_minutes,
        payments: Arc::new(PostgresPaymentRepository::new(pool.clone())),
        subscriptions: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
        user_access: Arc::new(PostgresUserAccessRepository::new(pool)),
        gateway: Arc::new(gateway),
        clock: Arc::new(SystemClock),
        callback_signer: signer,
    };

    let app = app_router(state, config.server.request_timeout());

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
