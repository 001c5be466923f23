//! In-memory billing store.
//!
//! Implements every billing repository port over one mutex so the atomic
//! confirmation has the same all-or-nothing behaviour as the Postgres
//! transaction. Used by tests and by local runs without a database.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::billing::{PendingPayment, Subscription, UserAccess};
use crate::domain::foundation::{DomainError, PaymentId, Timestamp, UserId};
use crate::ports::{
    ConfirmationCommit, PaymentRepository, SubscriptionRepository, UserAccessRepository,
};

#[derive(Default)]
pub struct InMemoryBillingStore {
    inner: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    payments: HashMap<PaymentId, PendingPayment>,
    subscriptions: HashMap<UserId, Subscription>,
    users: HashMap<UserId, UserAccess>,
    fail_writes: bool,
}

impl StoreState {
    fn check_writable(&self) -> Result<(), DomainError> {
        if self.fail_writes {
            return Err(DomainError::database("Simulated write failure"));
        }
        Ok(())
    }
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    pub fn payments(&self) -> Vec<PendingPayment> {
        let mut payments: Vec<_> = self.state().payments.values().cloned().collect();
        payments.sort_by_key(|p| p.created_at);
        payments
    }

    pub fn payment_count(&self) -> usize {
        self.state().payments.len()
    }

    pub fn subscription_for(&self, user_id: &UserId) -> Option<Subscription> {
        self.state().subscriptions.get(user_id).cloned()
    }

    pub fn access_for(&self, user_id: &UserId) -> Option<UserAccess> {
        self.state().users.get(user_id).cloned()
    }

    pub fn insert_subscription(&self, subscription: Subscription) {
        self.state()
            .subscriptions
            .insert(subscription.user_id.clone(), subscription);
    }

    pub fn insert_access(&self, access: UserAccess) {
        self.state().users.insert(access.user_id.clone(), access);
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl PaymentRepository for InMemoryBillingStore {
    async fn save(&self, payment: &PendingPayment) -> Result<(), DomainError> {
        let mut state = self.state();
        state.check_writable()?;
        state.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<PendingPayment>, DomainError> {
        Ok(self.state().payments.get(id).cloned())
    }

    async fn update_if_pending(&self, payment: &PendingPayment) -> Result<bool, DomainError> {
        let mut state = self.state();
        state.check_writable()?;
        match state.payments.get_mut(&payment.id) {
            Some(stored) if stored.is_pending() => {
                *stored = payment.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_pending_created_before(
        &self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<PendingPayment>, DomainError> {
        let mut abandoned: Vec<_> = self
            .state()
            .payments
            .values()
            .filter(|p| p.is_abandoned(cutoff))
            .cloned()
            .collect();
        abandoned.sort_by_key(|p| p.created_at);
        abandoned.truncate(limit as usize);
        Ok(abandoned)
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryBillingStore {
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.state().subscriptions.get(user_id).cloned())
    }

    async fn commit_confirmation(
        &self,
        payment: &PendingPayment,
        subscription: &Subscription,
        access: &UserAccess,
    ) -> Result<ConfirmationCommit, DomainError> {
        let mut state = self.state();
        state.check_writable()?;

        match state.payments.get(&payment.id) {
            Some(stored) if stored.is_pending() => {}
            _ => return Ok(ConfirmationCommit::AlreadyFinalized),
        }

        state.payments.insert(payment.id, payment.clone());

        let newer_exists = state
            .subscriptions
            .get(&subscription.user_id)
            .map(|existing| subscription.last_payment_date.is_before(&existing.last_payment_date))
            .unwrap_or(false);
        // Subscription and user record move together or not at all
        if !newer_exists {
            state
                .subscriptions
                .insert(subscription.user_id.clone(), subscription.clone());
            state.users.insert(access.user_id.clone(), access.clone());
        }

        Ok(ConfirmationCommit::Applied)
    }
}

#[async_trait]
impl UserAccessRepository for InMemoryBillingStore {
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<UserAccess>, DomainError> {
        Ok(self.state().users.get(user_id).cloned())
    }

    async fn record_trial_start(&self, access: &UserAccess) -> Result<bool, DomainError> {
        let mut state = self.state();
        state.check_writable()?;
        let already_trialled = state
            .users
            .get(&access.user_id)
            .map(|existing| existing.trial_started_at.is_some())
            .unwrap_or(false);
        if already_trialled {
            return Ok(false);
        }
        state.users.insert(access.user_id.clone(), access.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{
        ChargeQuote, CoverageWindow, PaymentConfirmation, PhoneNumber, PlanCatalog, PlanId,
    };
    use crate::domain::foundation::SubscriptionId;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn pending_at(created_at: Timestamp) -> PendingPayment {
        PendingPayment::create(
            PaymentId::new(),
            user(),
            &PlanCatalog::default().get(PlanId::Monthly),
            ChargeQuote {
                amount: 250,
                is_prorated: false,
            },
            PhoneNumber::parse("0712345678").unwrap(),
            created_at,
        )
    }

    fn window(now: Timestamp) -> CoverageWindow {
        CoverageWindow {
            start: now,
            end: now.add_days(3),
            next_due: now.add_days(3).add_seconds(1),
        }
    }

    fn confirmed(mut payment: PendingPayment, now: Timestamp) -> PendingPayment {
        payment
            .confirm(PaymentConfirmation {
                receipt_number: "QKL1".to_string(),
                confirmed_amount: Some(250),
                transaction_date: None,
                window: window(now),
            })
            .unwrap();
        payment
    }

    #[tokio::test]
    async fn update_if_pending_skips_finalized_rows() {
        let store = InMemoryBillingStore::new();
        let now = Timestamp::now();
        let mut payment = pending_at(now);
        store.save(&payment).await.unwrap();

        payment.fail("cancelled", now).unwrap();
        assert!(store.update_if_pending(&payment).await.unwrap());

        payment.failure_reason = Some("overwritten".to_string());
        assert!(!store.update_if_pending(&payment).await.unwrap());
        let stored = PaymentRepository::find_by_id(&store, &payment.id).await.unwrap().unwrap();
        assert_eq!(stored.failure_reason.as_deref(), Some("cancelled"));
    }

    #[tokio::test]
    async fn commit_confirmation_applies_once() {
        let store = InMemoryBillingStore::new();
        let now = Timestamp::now();
        let payment = pending_at(now);
        store.save(&payment).await.unwrap();

        let payment = confirmed(payment, now);
        let subscription =
            Subscription::activate(SubscriptionId::new(), user(), PlanId::Monthly, window(now));
        let mut access = UserAccess::new(user());
        access.activate(subscription.end_date).unwrap();

        assert_eq!(
            store.commit_confirmation(&payment, &subscription, &access).await.unwrap(),
            ConfirmationCommit::Applied
        );
        assert_eq!(
            store.commit_confirmation(&payment, &subscription, &access).await.unwrap(),
            ConfirmationCommit::AlreadyFinalized
        );
        assert!(store.subscription_for(&user()).is_some());
    }

    #[tokio::test]
    async fn out_of_order_commit_leaves_newer_window_in_place() {
        let store = InMemoryBillingStore::new();
        let earlier = Timestamp::now();
        let later = earlier.add_days(1);

        let late_payment = pending_at(later);
        let early_payment = pending_at(earlier);
        store.save(&late_payment).await.unwrap();
        store.save(&early_payment).await.unwrap();

        // The later payment is committed first
        let newer =
            Subscription::activate(SubscriptionId::new(), user(), PlanId::Monthly, window(later));
        let mut newer_access = UserAccess::new(user());
        newer_access.activate(newer.end_date).unwrap();
        store
            .commit_confirmation(&confirmed(late_payment, later), &newer, &newer_access)
            .await
            .unwrap();

        let older =
            Subscription::activate(SubscriptionId::new(), user(), PlanId::Monthly, window(earlier));
        let mut older_access = UserAccess::new(user());
        older_access.activate(older.end_date).unwrap();
        let result = store
            .commit_confirmation(&confirmed(early_payment.clone(), earlier), &older, &older_access)
            .await
            .unwrap();

        assert_eq!(result, ConfirmationCommit::Applied);
        let subscription = store.subscription_for(&user()).unwrap();
        assert_eq!(subscription.end_date, newer.end_date);
        assert_eq!(
            store.access_for(&user()).unwrap().subscription_end_at,
            Some(subscription.end_date)
        );
        // The earlier payment itself is still finalized
        let stored = PaymentRepository::find_by_id(&store, &early_payment.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_pending());
    }

    #[tokio::test]
    async fn failed_commit_writes_nothing() {
        let store = InMemoryBillingStore::new();
        let now = Timestamp::now();
        let payment = pending_at(now);
        store.save(&payment).await.unwrap();
        store.fail_writes(true);

        let payment = confirmed(payment, now);
        let subscription =
            Subscription::activate(SubscriptionId::new(), user(), PlanId::Monthly, window(now));
        let access = UserAccess::new(user());
        assert!(store.commit_confirmation(&payment, &subscription, &access).await.is_err());

        assert!(store.subscription_for(&user()).is_none());
        assert!(store.access_for(&user()).is_none());
        assert!(store.payments()[0].is_pending());
    }

    #[tokio::test]
    async fn abandoned_lookup_filters_by_age_and_status() {
        let store = InMemoryBillingStore::new();
        let now = Timestamp::now();
        let old = pending_at(now.minus_minutes(90));
        let fresh = pending_at(now.minus_minutes(5));
        let mut old_failed = pending_at(now.minus_minutes(120));
        old_failed.fail("cancelled", now).unwrap();
        for payment in [&old, &fresh, &old_failed] {
            store.save(payment).await.unwrap();
        }

        let abandoned = store
            .find_pending_created_before(now.minus_minutes(30), 10)
            .await
            .unwrap();
        assert_eq!(abandoned.len(), 1);
        assert_eq!(abandoned[0].id, old.id);
    }

    #[tokio::test]
    async fn trial_is_recorded_only_once() {
        let store = InMemoryBillingStore::new();
        let mut access = UserAccess::new(user());
        access.start_trial(Timestamp::now()).unwrap();

        assert!(store.record_trial_start(&access).await.unwrap());
        assert!(!store.record_trial_start(&access).await.unwrap());
    }
}
