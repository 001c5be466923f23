//! StartTrialHandler - Command handler for arming the one-time free trial.

use std::sync::Arc;

use crate::domain::billing::{BillingError, UserAccess};
use crate::domain::foundation::{ErrorCode, UserId};
use crate::ports::{Clock, UserAccessRepository};

#[derive(Debug, Clone)]
pub struct StartTrialCommand {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct StartTrialResult {
    pub access: UserAccess,
}

/// Arms the trial for a user who has neither trialled nor paid.
pub struct StartTrialHandler {
    access: Arc<dyn UserAccessRepository>,
    clock: Arc<dyn Clock>,
}

impl StartTrialHandler {
    pub fn new(access: Arc<dyn UserAccessRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { access, clock }
    }

    pub async fn handle(&self, cmd: StartTrialCommand) -> Result<StartTrialResult, BillingError> {
        let mut access = self
            .access
            .find_by_user_id(&cmd.user_id)
            .await?
            .unwrap_or_else(|| UserAccess::new(cmd.user_id.clone()));

        access.start_trial(self.clock.now()).map_err(|e| match e.code {
            ErrorCode::Conflict => BillingError::trial_already_started(cmd.user_id.clone()),
            _ => BillingError::from(e),
        })?;

        if !self.access.record_trial_start(&access).await? {
            return Err(BillingError::trial_already_started(cmd.user_id));
        }

        tracing::info!(
            user_id = %access.user_id,
            trial_end = ?access.trial_end().map(|t| *t.as_datetime()),
            "Trial started"
        );
        Ok(StartTrialResult { access })
    }
}
