//! Mobile-money payer numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ValidationError;

const COUNTRY_CODE: &str = "254";
const SUBSCRIBER_DIGITS: usize = 9;

/// A Kenyan mobile-money number in the gateway's international format
/// (`2547XXXXXXXX` / `2541XXXXXXXX`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parses a local (`07…`, `01…`) or international (`+2547…`, `+2541…`) number.
    ///
    /// Spaces and dashes are ignored. The subscriber part must be nine digits
    /// starting with 1 or 7.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();

        let subscriber = if let Some(rest) = compact.strip_prefix("+254") {
            rest
        } else if let Some(rest) = compact.strip_prefix('0') {
            rest
        } else {
            return Err(ValidationError::invalid_format(
                "phone_number",
                "must start with +254 or 0",
            ));
        };

        if subscriber.len() != SUBSCRIBER_DIGITS || !subscriber.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::invalid_format(
                "phone_number",
                "expected 9 digits after the prefix",
            ));
        }
        if !matches!(subscriber.as_bytes()[0], b'1' | b'7') {
            return Err(ValidationError::invalid_format(
                "phone_number",
                "subscriber number must start with 1 or 7",
            ));
        }

        Ok(Self(format!("{}{}", COUNTRY_CODE, subscriber)))
    }

    /// Rehydrates an already-normalized number from storage.
    pub fn from_normalized(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        match value.strip_prefix(COUNTRY_CODE) {
            Some(rest) => Self::parse(&format!("0{}", rest)),
            None => Err(ValidationError::invalid_format(
                "phone_number",
                "stored number is not in international format",
            )),
        }
    }

    /// The number as the gateway expects it, e.g. `254712345678`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Log-safe rendering that hides the middle digits.
    pub fn masked(&self) -> String {
        let (head, tail) = (&self.0[..6], &self.0[self.0.len() - 3..]);
        format!("{}***{}", head, tail)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}
