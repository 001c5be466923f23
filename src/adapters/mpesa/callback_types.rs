//! Daraja STK push callback payloads.
//!
//! The gateway posts one of these to our callback URL when the payer approves,
//! cancels, or lets the prompt time out:
//!
//! ```text
//! {"Body":{"stkCallback":{
//!     "MerchantRequestID":"29115-34620561-1",
//!     "CheckoutRequestID":"ws_CO_191220191020363925",
//!     "ResultCode":0,
//!     "ResultDesc":"The service request is processed successfully.",
//!     "CallbackMetadata":{"Item":[
//!         {"Name":"Amount","Value":1.00},
//!         {"Name":"MpesaReceiptNumber","Value":"NLJ7RT61SV"},
//!         {"Name":"TransactionDate","Value":20191219102115},
//!         {"Name":"PhoneNumber","Value":254708374149}]}}}}
//! ```

use chrono::{FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::billing::{BillingError, GatewayOutcome, SUCCESS_RESULT_CODE};
use crate::domain::foundation::Timestamp;

/// Top-level callback document.
#[derive(Debug, Clone, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,

    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,

    /// Numeric in practice; some sandbox builds send it as a string.
    #[serde(rename = "ResultCode")]
    pub result_code: Value,

    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,

    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Value", default)]
    pub value: Option<Value>,
}

impl StkCallbackEnvelope {
    /// Parses a raw callback body.
    pub fn parse(body: &[u8]) -> Result<Self, BillingError> {
        serde_json::from_slice(body)
            .map_err(|e| BillingError::malformed_callback(format!("invalid callback JSON: {}", e)))
    }

    /// Converts the wire payload into a domain outcome.
    ///
    /// `offset` is the zone the gateway reports `TransactionDate` in.
    pub fn into_outcome(self, offset: FixedOffset) -> Result<GatewayOutcome, BillingError> {
        let callback = self.body.stk_callback;
        let result_code = parse_result_code(&callback.result_code)?;

        if result_code != SUCCESS_RESULT_CODE {
            return Ok(GatewayOutcome::Declined {
                result_code,
                description: callback.result_desc,
            });
        }

        let metadata = callback.callback_metadata.unwrap_or_default();

        let receipt_number = metadata
            .find("MpesaReceiptNumber")
            .and_then(value_as_string)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                BillingError::malformed_callback("successful callback without MpesaReceiptNumber")
            })?;

        let amount = match metadata.find("Amount") {
            Some(value) => Some(value_as_amount(value).ok_or_else(|| {
                BillingError::malformed_callback(format!("unreadable Amount: {}", value))
            })?),
            None => None,
        };

        // Informational only; an odd date never blocks activation
        let transaction_date = metadata
            .find("TransactionDate")
            .and_then(value_as_string)
            .and_then(|raw| parse_transaction_date(&raw, offset));

        Ok(GatewayOutcome::Confirmed {
            amount,
            receipt_number,
            transaction_date,
        })
    }
}

impl CallbackMetadata {
    fn find(&self, name: &str) -> Option<&Value> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .and_then(|item| item.value.as_ref())
    }
}

/// Acknowledgement body Daraja expects back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i32,

    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted".to_string(),
        }
    }
}

fn parse_result_code(value: &Value) -> Result<i64, BillingError> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| BillingError::malformed_callback(format!("unreadable ResultCode: {}", value)))
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Amounts arrive as `1`, `1.0` or `"1.00"`; shillings are whole.
fn value_as_amount(value: &Value) -> Option<u64> {
    let amount = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    Some(amount.round() as u64)
}

/// `YYYYMMDDHHMMSS` in the gateway's local zone.
fn parse_transaction_date(raw: &str, offset: FixedOffset) -> Option<Timestamp> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y%m%d%H%M%S").ok()?;
    let local = offset.from_local_datetime(&naive).single()?;
    Some(Timestamp::from_datetime(local.with_timezone(&Utc)))
}
