//! Calendar-anchored billing periods.
//!
//! All boundaries are computed on the local calendar of the billing timezone:
//! a monthly period runs from the 1st to the last day of the month, an annual
//! period from January 1st to December 31st. Access granted by a payment lasts
//! until the last second of the period's final day.

use chrono::{Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

use super::BillingCadence;
use crate::domain::foundation::Timestamp;

/// East Africa Time, the default billing timezone.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 180;

/// Dates stamped onto a subscription by one successful payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageWindow {
    /// Moment the payment was applied.
    pub start: Timestamp,
    /// Last instant of access (23:59:59 local on the period's final day).
    pub end: Timestamp,
    /// First instant of the next period, when the renewal is due.
    pub next_due: Timestamp,
}

/// Billing calendar pinned to a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingCalendar {
    offset: FixedOffset,
}

impl BillingCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Builds a calendar from an offset in minutes east of UTC.
    ///
    /// Returns `None` for offsets outside ±24h.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local_date(&self, at: Timestamp) -> NaiveDate {
        at.local_date(self.offset)
    }

    /// Coverage bought by a payment applied at `now`.
    pub fn coverage_for(&self, cadence: BillingCadence, now: Timestamp) -> CoverageWindow {
        let next_start = next_period_start(cadence, self.local_date(now));
        let next_due = self.start_of_day(next_start);
        CoverageWindow {
            start: now,
            end: next_due.add_seconds(-1),
            next_due,
        }
    }

    /// Midnight local time at the start of `date`, as a UTC timestamp.
    pub fn start_of_day(&self, date: NaiveDate) -> Timestamp {
        let local = date.and_time(NaiveTime::MIN);
        let utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Timestamp::from_datetime(utc.and_utc())
    }
}

impl Default for BillingCalendar {
    fn default() -> Self {
        Self::from_offset_minutes(DEFAULT_UTC_OFFSET_MINUTES).unwrap_or(Self::new(Utc.fix()))
    }
}

/// First day of the period following the one containing `date`.
pub fn next_period_start(cadence: BillingCadence, date: NaiveDate) -> NaiveDate {
    match cadence {
        BillingCadence::Monthly => first_of_next_month(date),
        BillingCadence::Annual => NaiveDate::from_ymd_opt(date.year() + 1, 1, 1).unwrap_or(date),
    }
}

/// Number of days in the period containing `date`.
pub fn days_in_period(cadence: BillingCadence, date: NaiveDate) -> u32 {
    match cadence {
        BillingCadence::Monthly => days_in_month(date),
        BillingCadence::Annual => {
            if is_leap_year(date.year()) {
                366
            } else {
                365
            }
        }
    }
}

/// Days left in the period containing `date`, counting `date` itself.
pub fn days_remaining_inclusive(cadence: BillingCadence, date: NaiveDate) -> u32 {
    let elapsed_before = match cadence {
        BillingCadence::Monthly => date.day() - 1,
        BillingCadence::Annual => date.ordinal() - 1,
    };
    days_in_period(cadence, date) - elapsed_before
}

pub fn days_in_month(date: NaiveDate) -> u32 {
    let first = date.with_day(1).unwrap_or(date);
    first_of_next_month(date)
        .signed_duration_since(first)
        .num_days() as u32
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap())
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(date(2024, 2, 10)), 29);
        assert_eq!(days_in_month(date(2023, 2, 10)), 28);
        assert_eq!(days_in_month(date(2024, 4, 30)), 30);
        assert_eq!(days_in_month(date(2024, 12, 1)), 31);
    }

    #[test]
    fn leap_years() {
        assert!(is_leap_year(2024));
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2023));
    }

    #[test]
    fn remaining_days_count_today() {
        assert_eq!(days_remaining_inclusive(BillingCadence::Monthly, date(2024, 3, 29)), 3);
        assert_eq!(days_remaining_inclusive(BillingCadence::Monthly, date(2024, 3, 1)), 31);
        assert_eq!(days_remaining_inclusive(BillingCadence::Monthly, date(2024, 3, 31)), 1);
        assert_eq!(days_remaining_inclusive(BillingCadence::Annual, date(2024, 12, 31)), 1);
        assert_eq!(days_remaining_inclusive(BillingCadence::Annual, date(2024, 1, 1)), 366);
    }

    #[test]
    fn monthly_coverage_ends_on_last_day_local() {
        let calendar = BillingCalendar::default();
        // 09:00 EAT on March 29th
        let window = calendar.coverage_for(BillingCadence::Monthly, utc(2024, 3, 29, 6, 0));
        let end_local = window.end.as_datetime().with_timezone(&calendar.offset());
        assert_eq!(end_local.date_naive(), date(2024, 3, 31));
        assert_eq!((end_local.hour(), end_local.minute(), end_local.second()), (23, 59, 59));
        assert_eq!(calendar.local_date(window.next_due), date(2024, 4, 1));
    }

    #[test]
    fn annual_coverage_ends_december_31st() {
        let calendar = BillingCalendar::default();
        let window = calendar.coverage_for(BillingCadence::Annual, utc(2024, 6, 15, 12, 0));
        assert_eq!(calendar.local_date(window.end), date(2024, 12, 31));
        assert_eq!(calendar.local_date(window.next_due), date(2025, 1, 1));
    }

    #[test]
    fn december_rolls_into_next_year() {
        let calendar = BillingCalendar::default();
        let window = calendar.coverage_for(BillingCadence::Monthly, utc(2024, 12, 10, 12, 0));
        assert_eq!(calendar.local_date(window.next_due), date(2025, 1, 1));
    }

    #[test]
    fn local_day_decides_the_period() {
        // 22:30 UTC on Jan 31st is already Feb 1st in EAT
        let calendar = BillingCalendar::default();
        let window = calendar.coverage_for(BillingCadence::Monthly, utc(2024, 1, 31, 22, 30));
        assert_eq!(calendar.local_date(window.end), date(2024, 2, 29));
    }

    #[test]
    fn rejects_absurd_offsets() {
        assert!(BillingCalendar::from_offset_minutes(25 * 60).is_none());
        assert!(BillingCalendar::from_offset_minutes(-300).is_some());
    }
}
