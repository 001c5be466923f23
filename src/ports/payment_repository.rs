//! Payment repository port.
//!
//! Payment rows are append-only. Every update is conditional on the row
//! still being pending, so a finalized payment can never be overwritten.

use async_trait::async_trait;

use crate::domain::billing::PendingPayment;
use crate::domain::foundation::{DomainError, PaymentId, Timestamp};

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a new payment attempt.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn save(&self, payment: &PendingPayment) -> Result<(), DomainError>;

    /// Find a payment by its ID.
    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<PendingPayment>, DomainError>;

    /// Overwrite a payment, but only while the stored row is still pending.
    ///
    /// Returns `false` when the stored row was already finalized (or missing)
    /// and nothing was written.
    async fn update_if_pending(&self, payment: &PendingPayment) -> Result<bool, DomainError>;

    /// Pending payments created before `cutoff`, oldest first.
    ///
    /// Feeds the reconciliation hook for attempts the gateway never reported.
    async fn find_pending_created_before(
        &self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<PendingPayment>, DomainError>;
}
