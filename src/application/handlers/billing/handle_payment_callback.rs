//! HandlePaymentCallbackHandler - Command handler for gateway payment callbacks.

use std::sync::Arc;

use crate::domain::billing::{
    BillingCalendar, BillingError, GatewayOutcome, PaymentConfirmation, PaymentStatus,
    PendingPayment, Subscription, UserAccess,
};
use crate::domain::foundation::{PaymentId, SubscriptionId};
use crate::ports::{
    Clock, ConfirmationCommit, PaymentRepository, SubscriptionRepository, UserAccessRepository,
};

/// Command carrying one callback delivery.
#[derive(Debug, Clone)]
pub struct HandlePaymentCallbackCommand {
    pub payment_id: PaymentId,
    pub outcome: GatewayOutcome,
}

/// Result of callback processing.
#[derive(Debug, Clone)]
pub enum HandlePaymentCallbackResult {
    /// Payment confirmed and the subscription extended.
    Activated {
        payment_id: PaymentId,
        subscription: Subscription,
    },
    /// Payer declined; the payment is now failed.
    Declined { payment_id: PaymentId },
    /// The payment already carried this outcome. Nothing was written.
    Replayed { payment_id: PaymentId },
    /// The payment is already finalized with the opposite outcome. Nothing was written.
    Conflicting {
        payment_id: PaymentId,
        stored: PaymentStatus,
    },
}

/// Handler for gateway callbacks.
///
/// Deliveries are assumed at-least-once. A payment leaves `Pending` exactly
/// once; later deliveries are acknowledged without writes.
pub struct HandlePaymentCallbackHandler {
    calendar: BillingCalendar,
    payments: Arc<dyn PaymentRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    access: Arc<dyn UserAccessRepository>,
    clock: Arc<dyn Clock>,
}

impl HandlePaymentCallbackHandler {
    pub fn new(
        calendar: BillingCalendar,
        payments: Arc<dyn PaymentRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        access: Arc<dyn UserAccessRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            calendar,
            payments,
            subscriptions,
            access,
            clock,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandlePaymentCallbackCommand,
    ) -> Result<HandlePaymentCallbackResult, BillingError> {
        // 1. Locate the originating payment
        let payment = match self.payments.find_by_id(&cmd.payment_id).await? {
            Some(payment) => payment,
            None => {
                tracing::warn!(
                    payment_id = %cmd.payment_id,
                    outcome = cmd.outcome.label(),
                    "Callback for unknown payment"
                );
                return Err(BillingError::payment_not_found(cmd.payment_id));
            }
        };

        // 2. Finalized rows are never touched again
        if !payment.is_pending() {
            return Ok(classify_finalized(&payment, &cmd.outcome));
        }

        // 3. Apply the outcome
        match &cmd.outcome {
            GatewayOutcome::Declined {
                result_code,
                description,
            } => {
                self.apply_declined(payment, &cmd.outcome, *result_code, description)
                    .await
            }
            GatewayOutcome::Confirmed {
                amount,
                receipt_number,
                transaction_date,
            } => {
                let confirmation = PaymentConfirmation {
                    receipt_number: receipt_number.clone(),
                    confirmed_amount: *amount,
                    transaction_date: *transaction_date,
                    window: self
                        .calendar
                        .coverage_for(payment.plan_id.cadence(), self.clock.now()),
                };
                self.apply_confirmed(payment, &cmd.outcome, confirmation).await
            }
        }
    }

    async fn apply_declined(
        &self,
        mut payment: PendingPayment,
        outcome: &GatewayOutcome,
        result_code: i64,
        description: &str,
    ) -> Result<HandlePaymentCallbackResult, BillingError> {
        payment.fail(description, self.clock.now())?;

        if !self.payments.update_if_pending(&payment).await? {
            return self.reclassify(payment.id, outcome).await;
        }

        tracing::info!(
            payment_id = %payment.id,
            user_id = %payment.user_id,
            result_code = result_code,
            reason = %description,
            "Payment declined"
        );
        Ok(HandlePaymentCallbackResult::Declined {
            payment_id: payment.id,
        })
    }

    async fn apply_confirmed(
        &self,
        mut payment: PendingPayment,
        outcome: &GatewayOutcome,
        confirmation: PaymentConfirmation,
    ) -> Result<HandlePaymentCallbackResult, BillingError> {
        let window = confirmation.window;
        payment.confirm(confirmation)?;

        if payment.has_amount_mismatch() {
            tracing::warn!(
                payment_id = %payment.id,
                requested = payment.amount,
                confirmed = ?payment.confirmed_amount,
                "Confirmed amount differs from requested amount"
            );
        }

        let subscription = match self.subscriptions.find_by_user_id(&payment.user_id).await? {
            Some(mut existing) => {
                existing.renew(payment.plan_id, window)?;
                existing
            }
            None => Subscription::activate(
                SubscriptionId::new(),
                payment.user_id.clone(),
                payment.plan_id,
                window,
            ),
        };

        let mut access = self
            .access
            .find_by_user_id(&payment.user_id)
            .await?
            .unwrap_or_else(|| UserAccess::new(payment.user_id.clone()));
        access.activate(window.end)?;

        match self
            .subscriptions
            .commit_confirmation(&payment, &subscription, &access)
            .await?
        {
            ConfirmationCommit::Applied => {
                tracing::info!(
                    payment_id = %payment.id,
                    user_id = %payment.user_id,
                    plan_id = %payment.plan_id,
                    receipt = ?payment.gateway_transaction_id,
                    end_date = %subscription.end_date.as_datetime(),
                    "Payment confirmed, subscription active"
                );
                Ok(HandlePaymentCallbackResult::Activated {
                    payment_id: payment.id,
                    subscription,
                })
            }
            ConfirmationCommit::AlreadyFinalized => self.reclassify(payment.id, outcome).await,
        }
    }

    /// Another delivery finalized the payment between our read and write.
    async fn reclassify(
        &self,
        payment_id: PaymentId,
        outcome: &GatewayOutcome,
    ) -> Result<HandlePaymentCallbackResult, BillingError> {
        let stored = self
            .payments
            .find_by_id(&payment_id)
            .await?
            .ok_or_else(|| BillingError::payment_not_found(payment_id))?;
        Ok(classify_finalized(&stored, outcome))
    }
}

fn classify_finalized(payment: &PendingPayment, outcome: &GatewayOutcome) -> HandlePaymentCallbackResult {
    let matches = matches!(
        (payment.status, outcome),
        (PaymentStatus::Success, GatewayOutcome::Confirmed { .. })
            | (PaymentStatus::Failed, GatewayOutcome::Declined { .. })
    );

    if matches {
        tracing::info!(
            payment_id = %payment.id,
            status = %payment.status,
            "Duplicate callback delivery ignored"
        );
        HandlePaymentCallbackResult::Replayed {
            payment_id: payment.id,
        }
    } else {
        tracing::warn!(
            payment_id = %payment.id,
            stored = %payment.status,
            received = outcome.label(),
            "Callback outcome conflicts with finalized payment"
        );
        HandlePaymentCallbackResult::Conflicting {
            payment_id: payment.id,
            stored: payment.status,
        }
    }
}
