//! Gateway-reported outcome of a push payment.

use crate::domain::foundation::Timestamp;

/// Result code the gateway uses for a completed payment.
pub const SUCCESS_RESULT_CODE: i64 = 0;

/// Outcome delivered by the gateway's asynchronous callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    /// Payer approved the charge.
    Confirmed {
        /// Amount actually paid, when the gateway reports it.
        amount: Option<u64>,
        receipt_number: String,
        transaction_date: Option<Timestamp>,
    },
    /// Payer cancelled, timed out, or had insufficient funds.
    Declined { result_code: i64, description: String },
}

impl GatewayOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, GatewayOutcome::Confirmed { .. })
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            GatewayOutcome::Confirmed { .. } => "confirmed",
            GatewayOutcome::Declined { .. } => "declined",
        }
    }
}
