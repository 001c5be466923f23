//! Billing configuration

use serde::Deserialize;

use crate::domain::billing::{BillingCalendar, PlanCatalog, DEFAULT_UTC_OFFSET_MINUTES};

use super::error::ValidationError;

/// Plan prices, billing timezone and reconciliation threshold
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Monthly plan price in whole shillings
    #[serde(default = "default_monthly_amount")]
    pub monthly_amount: u64,

    /// Annual plan price in whole shillings
    #[serde(default = "default_annual_amount")]
    pub annual_amount: u64,

    /// Billing timezone, in minutes east of UTC
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    /// Pending payments older than this are reported as abandoned
    #[serde(default = "default_abandoned_after_minutes")]
    pub abandoned_after_minutes: u32,
}

impl BillingConfig {
    pub fn catalog(&self) -> PlanCatalog {
        PlanCatalog::new(self.monthly_amount, self.annual_amount)
    }

    pub fn calendar(&self) -> Result<BillingCalendar, ValidationError> {
        BillingCalendar::from_offset_minutes(self.utc_offset_minutes)
            .ok_or(ValidationError::InvalidUtcOffset)
    }

    /// Validate billing configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.monthly_amount == 0 {
            return Err(ValidationError::InvalidPlanPrice("monthly"));
        }
        if self.annual_amount == 0 {
            return Err(ValidationError::InvalidPlanPrice("annual"));
        }
        if self.utc_offset_minutes.abs() > 14 * 60 {
            return Err(ValidationError::InvalidUtcOffset);
        }
        if self.abandoned_after_minutes == 0 {
            return Err(ValidationError::InvalidAbandonedThreshold);
        }
        self.calendar()?;
        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            monthly_amount: default_monthly_amount(),
            annual_amount: default_annual_amount(),
            utc_offset_minutes: default_utc_offset_minutes(),
            abandoned_after_minutes: default_abandoned_after_minutes(),
        }
    }
}

fn default_monthly_amount() -> u64 {
    250
}

fn default_annual_amount() -> u64 {
    2500
}

fn default_utc_offset_minutes() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}

fn default_abandoned_after_minutes() -> u32 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::PlanId;

    #[test]
    fn defaults_match_published_prices() {
        let config = BillingConfig::default();
        let catalog = config.catalog();
        assert_eq!(catalog.get(PlanId::Monthly).amount, 250);
        assert_eq!(catalog.get(PlanId::Annual).amount, 2500);
        assert_eq!(config.calendar().unwrap(), BillingCalendar::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn free_plans_are_rejected() {
        let config = BillingConfig {
            annual_amount: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidPlanPrice("annual")));
    }

    #[test]
    fn offset_beyond_fourteen_hours_is_rejected() {
        let config = BillingConfig {
            utc_offset_minutes: 15 * 60,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidUtcOffset));
    }

    #[test]
    fn zero_abandoned_threshold_is_rejected() {
        let config = BillingConfig {
            abandoned_after_minutes: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidAbandonedThreshold)
        );
    }
}
