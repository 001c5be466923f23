//! Per-payment callback URL tokens.
//!
//! Daraja does not sign its callbacks, so the callback URL we hand it carries
//! an HMAC-SHA256 token over the payment id. The HTTP layer recomputes the
//! token before trusting a callback body.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::foundation::PaymentId;

type HmacSha256 = Hmac<Sha256>;

/// Path the gateway posts callbacks to, relative to the public base URL.
pub const CALLBACK_PATH: &str = "/api/billing/callback";

/// Signs and verifies callback URL tokens.
#[derive(Clone)]
pub struct CallbackSigner {
    mac: HmacSha256,
}

impl CallbackSigner {
    pub fn new(secret: &SecretString) -> Result<Self, hmac::digest::InvalidLength> {
        let mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())?;
        Ok(Self { mac })
    }

    /// Hex-encoded token bound to one payment.
    pub fn token_for(&self, payment_id: &PaymentId) -> String {
        let mut mac = self.mac.clone();
        mac.update(payment_id.to_string().as_bytes());
        hex_encode(&mac.finalize().into_bytes())
    }

    /// Constant-time check of a token presented on a callback.
    pub fn verify(&self, payment_id: &PaymentId, token: &str) -> bool {
        let Some(provided) = hex_decode(token) else {
            return false;
        };

        let mut mac = self.mac.clone();
        mac.update(payment_id.to_string().as_bytes());
        let expected = mac.finalize().into_bytes();

        if provided.len() != expected.len() {
            return false;
        }
        provided.ct_eq(expected.as_slice()).unwrap_u8() == 1
    }

    /// Full callback URL for a payment.
    pub fn callback_url(&self, base_url: &str, payment_id: &PaymentId) -> String {
        format!(
            "{}{}?paymentId={}&token={}",
            base_url.trim_end_matches('/'),
            CALLBACK_PATH,
            payment_id,
            self.token_for(payment_id)
        )
    }
}

impl std::fmt::Debug for CallbackSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSigner").finish_non_exhaustive()
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}
