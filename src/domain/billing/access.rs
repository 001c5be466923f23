//! Per-user access projection.
//!
//! Mirrors the subscription outcome onto the user record together with the
//! one-time free trial.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    DomainError, ErrorCode, StateMachine, Timestamp, UserId, ValidationError,
};

/// Length of the free trial.
pub const TRIAL_PERIOD_DAYS: i64 = 7;

/// Stored access status on the user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessStatus {
    /// Never trialled, never paid.
    None,
    Trial,
    Active,
    Expired,
}

impl AccessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessStatus::None => "none",
            AccessStatus::Trial => "trial",
            AccessStatus::Active => "active",
            AccessStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AccessStatus::None),
            "trial" => Ok(AccessStatus::Trial),
            "active" => Ok(AccessStatus::Active),
            "expired" => Ok(AccessStatus::Expired),
            other => Err(ValidationError::invalid_format(
                "subscription_status",
                format!("unknown access status '{}'", other),
            )),
        }
    }
}

impl StateMachine for AccessStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use AccessStatus::*;
        matches!(
            (self, target),
            // From NONE
            (None, Trial)
                | (None, Active)
            // From TRIAL
                | (Trial, Active)
                | (Trial, Expired)
            // From ACTIVE
                | (Active, Active) // Renewal
                | (Active, Expired)
            // From EXPIRED
                | (Expired, Active)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use AccessStatus::*;
        match self {
            None => vec![Trial, Active],
            Trial => vec![Active, Expired],
            Active => vec![Active, Expired],
            Expired => vec![Active],
        }
    }
}

/// The `users` projection consulted by the status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccess {
    pub user_id: UserId,
    pub status: AccessStatus,
    pub trial_started_at: Option<Timestamp>,
    pub subscription_end_at: Option<Timestamp>,
}

impl UserAccess {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            status: AccessStatus::None,
            trial_started_at: None,
            subscription_end_at: None,
        }
    }

    /// Arms the one-time trial.
    ///
    /// # Errors
    ///
    /// `Conflict` if a trial was ever started or the user has already paid.
    pub fn start_trial(&mut self, now: Timestamp) -> Result<(), DomainError> {
        if self.trial_started_at.is_some() {
            return Err(DomainError::new(
                ErrorCode::Conflict,
                format!("Trial already started for user {}", self.user_id),
            ));
        }
        self.transition_to(AccessStatus::Trial)?;
        self.trial_started_at = Some(now);
        Ok(())
    }

    /// Mirrors a successful payment onto the user record.
    ///
    /// # Errors
    ///
    /// Never in practice: every status may move to Active.
    pub fn activate(&mut self, end: Timestamp) -> Result<(), DomainError> {
        self.transition_to(AccessStatus::Active)?;
        self.subscription_end_at = Some(end);
        Ok(())
    }

    /// End of the trial window, if a trial was ever started.
    pub fn trial_end(&self) -> Option<Timestamp> {
        self.trial_started_at
            .map(|started| started.add_days(TRIAL_PERIOD_DAYS))
    }

    fn transition_to(&mut self, target: AccessStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot transition access from {:?} to {:?}", self.status, target),
            )
        })?;
        Ok(())
    }
}
