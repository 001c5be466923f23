//! ListAbandonedPaymentsHandler - Query handler for the reconciliation hook.
//!
//! Lists payments still pending long after initiation. Nothing here changes
//! them; an external reconciliation job decides what to do.

use std::sync::Arc;

use crate::domain::billing::{BillingError, PendingPayment};
use crate::ports::{Clock, PaymentRepository};

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 500;

#[derive(Debug, Clone, Default)]
pub struct ListAbandonedPaymentsQuery {
    /// Overrides the configured age threshold.
    pub older_than_minutes: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ListAbandonedPaymentsResult {
    pub payments: Vec<PendingPayment>,
    pub older_than_minutes: u32,
}

pub struct ListAbandonedPaymentsHandler {
    payments: Arc<dyn PaymentRepository>,
    clock: Arc<dyn Clock>,
    abandoned_after_minutes: u32,
}

impl ListAbandonedPaymentsHandler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        clock: Arc<dyn Clock>,
        abandoned_after_minutes: u32,
    ) -> Self {
        Self {
            payments,
            clock,
            abandoned_after_minutes,
        }
    }

    pub async fn handle(
        &self,
        query: ListAbandonedPaymentsQuery,
    ) -> Result<ListAbandonedPaymentsResult, BillingError> {
        let older_than_minutes = query
            .older_than_minutes
            .unwrap_or(self.abandoned_after_minutes);
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let cutoff = self.clock.now().minus_minutes(i64::from(older_than_minutes));

        let payments = self
            .payments
            .find_pending_created_before(cutoff, limit)
            .await?;

        if !payments.is_empty() {
            tracing::info!(
                count = payments.len(),
                older_than_minutes = older_than_minutes,
                "Abandoned payments listed"
            );
        }

        Ok(ListAbandonedPaymentsResult {
            payments,
            older_than_minutes,
        })
    }
}
