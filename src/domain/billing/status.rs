//! Read-only access projection for client surfaces.
//!
//! Effective activity is always derived from the stored boundaries and the
//! current time. The stored status only selects which boundary applies.

use serde::Serialize;

use super::{AccessStatus, PlanId, Subscription, UserAccess};
use crate::domain::foundation::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionStatusView {
    pub is_active: bool,
    pub end_date: Option<Timestamp>,
    pub plan_type: Option<PlanId>,
    pub days_remaining: Option<u32>,
    pub is_in_trial: Option<bool>,
}

impl SubscriptionStatusView {
    pub fn inactive() -> Self {
        Self {
            is_active: false,
            end_date: None,
            plan_type: None,
            days_remaining: None,
            is_in_trial: None,
        }
    }

    /// Projects a user's stored access onto `now`.
    pub fn project(
        access: Option<&UserAccess>,
        subscription: Option<&Subscription>,
        now: Timestamp,
    ) -> Self {
        let Some(access) = access else {
            return Self::inactive();
        };

        match (access.status, access.trial_end(), access.subscription_end_at) {
            (AccessStatus::Trial, Some(trial_end), _) => Self::bounded(trial_end, None, true, now),
            (AccessStatus::Active, _, Some(end)) => {
                let plan_type = subscription.map(|s| s.plan_id);
                Self::bounded(end, plan_type, false, now)
            }
            _ => Self::inactive(),
        }
    }

    fn bounded(end: Timestamp, plan_type: Option<PlanId>, in_trial: bool, now: Timestamp) -> Self {
        Self {
            is_active: now.is_before(&end),
            end_date: Some(end),
            plan_type,
            // zero once the boundary has passed
            days_remaining: Some(now.days_until_ceil(&end)),
            is_in_trial: Some(in_trial),
        }
    }
}
