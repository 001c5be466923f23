//! Subscription repository port.
//!
//! Confirmation of a payment touches three records (the payment row, the
//! user's subscription and the user access projection). They are written
//! together through [`SubscriptionRepository::commit_confirmation`] so a
//! failure part-way leaves none of them changed.

use async_trait::async_trait;

use crate::domain::billing::{PendingPayment, Subscription, UserAccess};
use crate::domain::foundation::{DomainError, UserId};

/// Result of committing a confirmed payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationCommit {
    /// All three records were written.
    Applied,
    /// The payment row was no longer pending; nothing was written.
    AlreadyFinalized,
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find the subscription for a user.
    ///
    /// Returns `None` if the user has never paid.
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError>;

    /// Atomically finalize `payment` as successful, upsert `subscription`
    /// (keyed by user) and upsert the user's `access` projection.
    ///
    /// The payment update is conditional on the stored row still being
    /// pending. When it is not, the whole unit is rolled back and
    /// `AlreadyFinalized` is returned.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure (nothing committed)
    async fn commit_confirmation(
        &self,
        payment: &PendingPayment,
        subscription: &Subscription,
        access: &UserAccess,
    ) -> Result<ConfirmationCommit, DomainError>;
}
