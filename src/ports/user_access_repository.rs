//! User access projection port.

use async_trait::async_trait;

use crate::domain::billing::UserAccess;
use crate::domain::foundation::{DomainError, UserId};

#[async_trait]
pub trait UserAccessRepository: Send + Sync {
    /// Find the access projection for a user.
    ///
    /// Returns `None` for users billing has never seen.
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<UserAccess>, DomainError>;

    /// Persist a freshly armed trial.
    ///
    /// Writes only if no trial was ever recorded for the user. Returns `false`
    /// when one already exists and nothing was written.
    async fn record_trial_start(&self, access: &UserAccess) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_access_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn UserAccessRepository) {}
    }
}
