//! First-payment proration.
//!
//! A user's first paid subscription is charged only for the part of the current
//! calendar period that remains, today included. Renewals pay full price.

use chrono::NaiveDate;

use super::calendar::{days_in_period, days_remaining_inclusive};
use super::{Plan, PlanId, Subscription};
use crate::domain::foundation::Timestamp;

/// Amount to charge for one payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeQuote {
    pub amount: u64,
    pub is_prorated: bool,
}

/// Prorated first-payment amount for `plan_id` on `reference_date`.
///
/// `round(full_amount * days_remaining / days_in_period)` with ties rounding
/// up, clamped to `1..=full_amount`.
pub fn compute_prorated_amount(plan_id: PlanId, full_amount: u64, reference_date: NaiveDate) -> u64 {
    if full_amount == 0 {
        return 0;
    }
    let cadence = plan_id.cadence();
    let total = u128::from(days_in_period(cadence, reference_date));
    let remaining = u128::from(days_remaining_inclusive(cadence, reference_date));

    // half-up: floor((2 * full * remaining + total) / (2 * total))
    let numerator = 2 * u128::from(full_amount) * remaining + total;
    let rounded = (numerator / (2 * total)) as u64;
    rounded.clamp(1, full_amount)
}

/// Whether a payment made now would be the user's first paid period.
///
/// True when there is no subscription row, or the existing row has lapsed
/// (stored as expired, or its end date has passed).
pub fn qualifies_for_proration(existing: Option<&Subscription>, now: Timestamp) -> bool {
    match existing {
        None => true,
        Some(subscription) => subscription.is_lapsed(now),
    }
}

/// Prices a charge for `plan`, prorating only a first paid subscription.
pub fn quote_charge(
    plan: &Plan,
    existing: Option<&Subscription>,
    now: Timestamp,
    reference_date: NaiveDate,
) -> ChargeQuote {
    if qualifies_for_proration(existing, now) {
        let amount = compute_prorated_amount(plan.id, plan.amount, reference_date);
        ChargeQuote {
            amount,
            is_prorated: amount < plan.amount,
        }
    } else {
        ChargeQuote {
            amount: plan.amount,
            is_prorated: false,
        }
    }
}
