//! M-Pesa payment gateway adapter.
//!
//! Implements the `PaymentGateway` port against Safaricom Daraja, including:
//! - OAuth client-credentials token exchange
//! - STK push (M-Pesa Express) requests
//! - Callback payload parsing
//! - Signed per-payment callback URLs
//!
//! # Security
//!
//! - Daraja callbacks are unsigned; each callback URL carries an HMAC-SHA256
//!   token over the payment id, checked in constant time
//! - Credentials and passkey are held as `secrecy::SecretString`

mod callback_signer;
mod callback_types;
mod daraja_adapter;
mod mock_gateway;

pub use callback_signer::{CallbackSigner, CALLBACK_PATH};
pub use callback_types::{
    CallbackAck, CallbackItem, CallbackMetadata, StkCallback, StkCallbackBody, StkCallbackEnvelope,
};
pub use daraja_adapter::{DarajaConfig, DarajaPaymentAdapter, SANDBOX_BASE_URL};
pub use mock_gateway::MockPaymentGateway;
