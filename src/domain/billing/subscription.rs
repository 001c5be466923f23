//! Subscription aggregate.
//!
//! One row per user, created by the first successful payment and updated in
//! place by every later one. `end_date` is the authoritative access boundary;
//! the stored status is only a hint about which boundary to compare against.

use serde::{Deserialize, Serialize};

use super::{BillingCadence, CoverageWindow, PlanId};
use crate::domain::foundation::{
    DomainError, ErrorCode, StateMachine, SubscriptionId, Timestamp, UserId,
};

/// Stored lifecycle status of a paid subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            (Active, Active) // Renewal
                | (Active, Expired)
                | (Expired, Active) // Re-subscription
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Active => vec![Active, Expired],
            Expired => vec![Active],
        }
    }
}

/// A user's paid subscription.
///
/// # Invariants
///
/// - `user_id` is unique (one subscription per user)
/// - `billing_cycle` always mirrors `plan_id`
/// - `start_date <= end_date < next_due_date`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub status: SubscriptionStatus,
    pub plan_id: PlanId,
    pub start_date: Timestamp,
    /// Last instant of paid access.
    pub end_date: Timestamp,
    pub billing_cycle: BillingCadence,
    /// When the next renewal falls due. Informational only.
    pub next_due_date: Timestamp,
    pub last_payment_date: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Creates the subscription bought by a user's first successful payment.
    pub fn activate(
        id: SubscriptionId,
        user_id: UserId,
        plan_id: PlanId,
        window: CoverageWindow,
    ) -> Self {
        Self {
            id,
            user_id,
            status: SubscriptionStatus::Active,
            plan_id,
            start_date: window.start,
            end_date: window.end,
            billing_cycle: plan_id.cadence(),
            next_due_date: window.next_due,
            last_payment_date: window.start,
            created_at: window.start,
            updated_at: window.start,
        }
    }

    /// Applies a later successful payment, possibly switching plans.
    ///
    /// # Errors
    ///
    /// Never in practice: both stored statuses may move to Active.
    pub fn renew(&mut self, plan_id: PlanId, window: CoverageWindow) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Active)?;
        self.plan_id = plan_id;
        self.billing_cycle = plan_id.cadence();
        self.start_date = window.start;
        self.end_date = window.end;
        self.next_due_date = window.next_due;
        self.last_payment_date = window.start;
        self.updated_at = window.start;
        Ok(())
    }

    /// True when the subscription no longer grants access at `now`.
    pub fn is_lapsed(&self, now: Timestamp) -> bool {
        self.status == SubscriptionStatus::Expired || !now.is_before(&self.end_date)
    }

    fn transition_to(&mut self, target: SubscriptionStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot transition subscription from {:?} to {:?}",
                    self.status, target
                ),
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: Timestamp, days: i64) -> CoverageWindow {
        let next_due = start.add_days(days);
        CoverageWindow {
            start,
            end: next_due.add_seconds(-1),
            next_due,
        }
    }

    fn active_subscription(now: Timestamp) -> Subscription {
        Subscription::activate(
            SubscriptionId::new(),
            UserId::new("user-1").unwrap(),
            PlanId::Monthly,
            window(now, 10),
        )
    }

    // ════════════════════════════════════════════════════════════════════════
    // State machine
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn active_can_renew_and_expire() {
        assert!(SubscriptionStatus::Active.can_transition_to(&SubscriptionStatus::Active));
        assert!(SubscriptionStatus::Active.can_transition_to(&SubscriptionStatus::Expired));
    }

    #[test]
    fn expired_can_only_reactivate() {
        assert_eq!(
            SubscriptionStatus::Expired.valid_transitions(),
            vec![SubscriptionStatus::Active]
        );
        assert!(SubscriptionStatus::Expired
            .transition_to(SubscriptionStatus::Expired)
            .is_err());
    }

    #[test]
    fn no_status_is_terminal() {
        assert!(!SubscriptionStatus::Active.is_terminal());
        assert!(!SubscriptionStatus::Expired.is_terminal());
    }

    // ════════════════════════════════════════════════════════════════════════
    // Aggregate
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn activate_copies_window_and_cadence() {
        let now = Timestamp::now();
        let subscription = Subscription::activate(
            SubscriptionId::new(),
            UserId::new("user-1").unwrap(),
            PlanId::Annual,
            window(now, 100),
        );
        assert_eq!(subscription.status, SubscriptionStatus::Active);
        assert_eq!(subscription.billing_cycle, BillingCadence::Annual);
        assert_eq!(subscription.start_date, now);
        assert_eq!(subscription.last_payment_date, now);
        assert_eq!(subscription.next_due_date, now.add_days(100));
    }

    #[test]
    fn renew_updates_in_place_and_keeps_identity() {
        let now = Timestamp::now();
        let mut subscription = active_subscription(now);
        let id = subscription.id;

        let later = now.add_days(9);
        subscription.renew(PlanId::Annual, window(later, 200)).unwrap();

        assert_eq!(subscription.id, id);
        assert_eq!(subscription.plan_id, PlanId::Annual);
        assert_eq!(subscription.billing_cycle, BillingCadence::Annual);
        assert_eq!(subscription.end_date, later.add_days(200).add_seconds(-1));
        assert_eq!(subscription.last_payment_date, later);
    }

    #[test]
    fn expired_subscription_reactivates_on_renewal() {
        let now = Timestamp::now();
        let mut subscription = active_subscription(now);
        subscription.status = SubscriptionStatus::Expired;
        assert!(subscription.renew(PlanId::Monthly, window(now, 5)).is_ok());
        assert_eq!(subscription.status, SubscriptionStatus::Active);
    }

    #[test]
    fn lapses_once_end_date_is_reached() {
        let now = Timestamp::now();
        let subscription = active_subscription(now);
        assert!(!subscription.is_lapsed(now));
        assert!(subscription.is_lapsed(subscription.end_date));
        assert!(subscription.is_lapsed(now.add_days(11)));
    }

    #[test]
    fn stored_expired_wins_over_future_end_date() {
        let now = Timestamp::now();
        let mut subscription = active_subscription(now);
        // Rows written as expired by an external sweep
        subscription.status = SubscriptionStatus::Expired;
        assert!(subscription.is_lapsed(now));
    }
}
