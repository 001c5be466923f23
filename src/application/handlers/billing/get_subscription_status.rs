//! GetSubscriptionStatusHandler - Query handler for a user's effective access.

use std::sync::Arc;

use crate::domain::billing::{AccessStatus, BillingError, SubscriptionStatusView};
use crate::domain::foundation::UserId;
use crate::ports::{Clock, SubscriptionRepository, UserAccessRepository};

#[derive(Debug, Clone)]
pub struct GetSubscriptionStatusQuery {
    pub user_id: UserId,
}

pub type GetSubscriptionStatusResult = SubscriptionStatusView;

/// Read-only; safe to call on every app refresh.
pub struct GetSubscriptionStatusHandler {
    access: Arc<dyn UserAccessRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    clock: Arc<dyn Clock>,
}

impl GetSubscriptionStatusHandler {
    pub fn new(
        access: Arc<dyn UserAccessRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            access,
            subscriptions,
            clock,
        }
    }

    pub async fn handle(
        &self,
        query: GetSubscriptionStatusQuery,
    ) -> Result<GetSubscriptionStatusResult, BillingError> {
        let now = self.clock.now();
        let access = self.access.find_by_user_id(&query.user_id).await?;

        // Only the paid branch reads the plan
        let subscription = match access.as_ref().map(|a| a.status) {
            Some(AccessStatus::Active) => self.subscriptions.find_by_user_id(&query.user_id).await?,
            _ => None,
        };

        Ok(SubscriptionStatusView::project(
            access.as_ref(),
            subscription.as_ref(),
            now,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::domain::billing::{BillingCadence, BillingCalendar, PlanId, Subscription, UserAccess};
    use crate::domain::foundation::{SubscriptionId, Timestamp};
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn handler(store: Arc<InMemoryBillingStore>, now: Timestamp) -> GetSubscriptionStatusHandler {
        GetSubscriptionStatusHandler::new(store.clone(), store, Arc::new(FixedClock::new(now)))
    }

    #[tokio::test]
    async fn unknown_user_is_inactive() {
        let store = Arc::new(InMemoryBillingStore::new());
        let view = handler(store, Timestamp::now())
            .handle(GetSubscriptionStatusQuery { user_id: user() })
            .await
            .unwrap();
        assert_eq!(view, SubscriptionStatusView::inactive());
    }

    #[tokio::test]
    async fn trial_started_eight_days_ago_is_inactive_but_in_trial() {
        let store = Arc::new(InMemoryBillingStore::new());
        let now = Timestamp::now();
        let mut access = UserAccess::new(user());
        access.start_trial(now.add_days(-8)).unwrap();
        store.insert_access(access);

        let view = handler(store, now)
            .handle(GetSubscriptionStatusQuery { user_id: user() })
            .await
            .unwrap();

        assert!(!view.is_active);
        assert_eq!(view.is_in_trial, Some(true));
    }

    #[tokio::test]
    async fn paid_user_reports_plan_and_days_left() {
        let store = Arc::new(InMemoryBillingStore::new());
        // 12:00 EAT on April 20th, a 30-day month
        let now = Timestamp::from_datetime(Utc.with_ymd_and_hms(2024, 4, 20, 9, 0, 0).unwrap());
        let window = BillingCalendar::default().coverage_for(BillingCadence::Monthly, now);
        store.insert_subscription(Subscription::activate(
            SubscriptionId::new(),
            user(),
            PlanId::Monthly,
            window,
        ));
        let mut access = UserAccess::new(user());
        access.activate(window.end).unwrap();
        store.insert_access(access);

        let view = handler(store, now)
            .handle(GetSubscriptionStatusQuery { user_id: user() })
            .await
            .unwrap();

        assert!(view.is_active);
        assert_eq!(view.days_remaining, Some(11));
        assert_eq!(view.plan_type, Some(PlanId::Monthly));
        assert_eq!(view.end_date, Some(window.end));
        assert_eq!(view.is_in_trial, Some(false));
    }

    #[tokio::test]
    async fn status_is_recomputed_as_time_passes() {
        let store = Arc::new(InMemoryBillingStore::new());
        let now = Timestamp::now();
        let mut access = UserAccess::new(user());
        access.activate(now.add_days(2)).unwrap();
        store.insert_access(access);

        let clock = Arc::new(FixedClock::new(now));
        let handler = GetSubscriptionStatusHandler::new(store.clone(), store, clock.clone());

        let query = GetSubscriptionStatusQuery { user_id: user() };
        assert!(handler.handle(query.clone()).await.unwrap().is_active);

        clock.advance_days(3);
        let view = handler.handle(query).await.unwrap();
        assert!(!view.is_active);
        assert_eq!(view.days_remaining, Some(0));
    }
}
