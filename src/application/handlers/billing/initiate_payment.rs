//! InitiatePaymentHandler - Command handler for starting a mobile-money payment.

use std::sync::Arc;

use crate::domain::billing::{
    quote_charge, BillingCalendar, BillingError, PendingPayment, PhoneNumber, PlanCatalog,
};
use crate::domain::foundation::{PaymentId, UserId};
use crate::ports::{
    Clock, PaymentGateway, PaymentGatewayError, PaymentRepository, PushPaymentRequest,
    SubscriptionRepository,
};

/// Command to charge a user for a plan.
#[derive(Debug, Clone)]
pub struct InitiatePaymentCommand {
    pub user_id: UserId,
    /// As typed by the user; validated and normalized by the handler.
    pub phone_number: String,
    pub plan_id: String,
}

/// Result of a push request the gateway accepted.
#[derive(Debug, Clone)]
pub struct InitiatePaymentResult {
    pub payment: PendingPayment,
    pub checkout_request_id: String,
    pub customer_message: Option<String>,
}

/// Handler for initiating push payments.
///
/// The pending payment row is written before the gateway is contacted, so a
/// charge can never exist at the gateway without a local record of it.
pub struct InitiatePaymentHandler {
    catalog: PlanCatalog,
    calendar: BillingCalendar,
    payments: Arc<dyn PaymentRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
}

impl InitiatePaymentHandler {
    pub fn new(
        catalog: PlanCatalog,
        calendar: BillingCalendar,
        payments: Arc<dyn PaymentRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            calendar,
            payments,
            subscriptions,
            gateway,
            clock,
        }
    }

    pub async fn handle(
        &self,
        cmd: InitiatePaymentCommand,
    ) -> Result<InitiatePaymentResult, BillingError> {
        // 1. Validate input before touching storage
        let phone_number = PhoneNumber::parse(&cmd.phone_number)?;
        let plan = self.catalog.resolve(&cmd.plan_id)?;

        // 2. Price the charge
        let now = self.clock.now();
        let existing = self.subscriptions.find_by_user_id(&cmd.user_id).await?;
        let quote = quote_charge(&plan, existing.as_ref(), now, self.calendar.local_date(now));

        // 3. Persist the attempt; fail closed if this write fails
        let mut payment = PendingPayment::create(
            PaymentId::new(),
            cmd.user_id,
            &plan,
            quote,
            phone_number,
            now,
        );
        self.payments.save(&payment).await?;

        tracing::info!(
            payment_id = %payment.id,
            user_id = %payment.user_id,
            plan_id = %plan.id,
            amount = payment.amount,
            is_prorated = payment.is_prorated,
            phone = %payment.phone_number,
            "Payment initiated"
        );

        // 4. Ask the gateway to push the charge
        let request = PushPaymentRequest {
            payment_id: payment.id,
            phone_number: payment.phone_number.clone(),
            amount: payment.amount,
        };

        match self.gateway.push_payment(request).await {
            Ok(accepted) => {
                self.attach_reference(&mut payment, &accepted.checkout_request_id)
                    .await;
                Ok(InitiatePaymentResult {
                    payment,
                    checkout_request_id: accepted.checkout_request_id,
                    customer_message: accepted.customer_message,
                })
            }
            Err(err) => {
                self.record_gateway_failure(&mut payment, &err).await;
                Err(BillingError::gateway(err.message))
            }
        }
    }

    /// Stores the checkout reference. The charge is already live at the
    /// gateway, so a failure here is logged rather than returned.
    async fn attach_reference(&self, payment: &mut PendingPayment, checkout_request_id: &str) {
        let now = self.clock.now();
        if let Err(e) = payment.attach_checkout_reference(checkout_request_id, now) {
            tracing::warn!(payment_id = %payment.id, "Cannot attach checkout reference: {}", e);
            return;
        }

        match self.payments.update_if_pending(payment).await {
            Ok(true) => {
                tracing::info!(
                    payment_id = %payment.id,
                    checkout_request_id = %checkout_request_id,
                    "Gateway accepted push request"
                );
            }
            Ok(false) => {
                // The callback beat us to it; the finalized row stays as is.
                tracing::debug!(
                    payment_id = %payment.id,
                    "Payment finalized before checkout reference was stored"
                );
            }
            Err(e) => {
                tracing::error!(
                    payment_id = %payment.id,
                    checkout_request_id = %checkout_request_id,
                    "Failed to store checkout reference, payment left pending: {}",
                    e
                );
            }
        }
    }

    async fn record_gateway_failure(&self, payment: &mut PendingPayment, err: &PaymentGatewayError) {
        if !err.is_definitive() {
            tracing::warn!(
                payment_id = %payment.id,
                error = %err,
                "Gateway outcome unknown, payment left pending for reconciliation"
            );
            return;
        }

        tracing::warn!(payment_id = %payment.id, error = %err, "Gateway rejected push request");

        if let Err(e) = payment.fail(err.message.clone(), self.clock.now()) {
            tracing::warn!(payment_id = %payment.id, "Cannot mark payment failed: {}", e);
            return;
        }
        match self.payments.update_if_pending(payment).await {
            Ok(_) => {}
            Err(e) => {
                tracing::error!(
                    payment_id = %payment.id,
                    "Failed to mark payment failed, left pending: {}",
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::adapters::mpesa::MockPaymentGateway;
    use crate::domain::billing::{
        CoverageWindow, PaymentStatus, PlanId, Subscription,
    };
    use crate::domain::foundation::{SubscriptionId, Timestamp};
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    /// 09:00 EAT on March 29th 2024.
    fn march_29th() -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(2024, 3, 29, 6, 0, 0).unwrap())
    }

    struct Fixture {
        store: Arc<InMemoryBillingStore>,
        gateway: Arc<MockPaymentGateway>,
        handler: InitiatePaymentHandler,
    }

    fn fixture_with(gateway: MockPaymentGateway, now: Timestamp) -> Fixture {
        let store = Arc::new(InMemoryBillingStore::new());
        let gateway = Arc::new(gateway);
        let handler = InitiatePaymentHandler::new(
            PlanCatalog::default(),
            BillingCalendar::default(),
            store.clone(),
            store.clone(),
            gateway.clone(),
            Arc::new(FixedClock::new(now)),
        );
        Fixture {
            store,
            gateway,
            handler,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockPaymentGateway::new(), march_29th())
    }

    fn command(phone: &str, plan: &str) -> InitiatePaymentCommand {
        InitiatePaymentCommand {
            user_id: user(),
            phone_number: phone.to_string(),
            plan_id: plan.to_string(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Success Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn first_payment_on_march_29th_is_prorated() {
        let f = fixture();
        let result = f.handler.handle(command("0712345678", "monthly")).await.unwrap();

        assert_eq!(result.payment.amount, 24);
        assert!(result.payment.is_prorated);
        assert_eq!(result.checkout_request_id, "ws_CO_mock_1");

        let requests = f.gateway.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].amount, 24);
        assert_eq!(requests[0].phone_number.as_str(), "254712345678");
        assert_eq!(requests[0].payment_id, result.payment.id);
    }

    #[tokio::test]
    async fn accepted_push_stores_checkout_reference() {
        let f = fixture();
        let result = f.handler.handle(command("0712345678", "monthly")).await.unwrap();

        let stored = f.store.payments();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, result.payment.id);
        assert_eq!(stored[0].status, PaymentStatus::Pending);
        assert_eq!(stored[0].checkout_request_id.as_deref(), Some("ws_CO_mock_1"));
    }

    #[tokio::test]
    async fn active_subscriber_renewing_is_charged_full_amount() {
        let f = fixture();
        let now = march_29th();
        f.store.insert_subscription(Subscription::activate(
            SubscriptionId::new(),
            user(),
            PlanId::Monthly,
            CoverageWindow {
                start: now.add_days(-20),
                end: now.add_days(3),
                next_due: now.add_days(3).add_seconds(1),
            },
        ));

        let result = f.handler.handle(command("0712345678", "monthly")).await.unwrap();
        assert_eq!(result.payment.amount, 250);
        assert!(!result.payment.is_prorated);
    }

    #[tokio::test]
    async fn lapsed_subscriber_is_prorated() {
        let f = fixture();
        let now = march_29th();
        f.store.insert_subscription(Subscription::activate(
            SubscriptionId::new(),
            user(),
            PlanId::Monthly,
            CoverageWindow {
                start: now.add_days(-60),
                end: now.add_days(-29),
                next_due: now.add_days(-29).add_seconds(1),
            },
        ));

        let result = f.handler.handle(command("0712345678", "monthly")).await.unwrap();
        assert_eq!(result.payment.amount, 24);
    }

    #[tokio::test]
    async fn annual_plan_uses_year_proration() {
        let f = fixture();
        let result = f.handler.handle(command("+254712345678", "annual")).await.unwrap();
        // March 29th 2024 is day 89 of 366: 278 days left -> round(2500 * 278 / 366) = 1899
        assert_eq!(result.payment.amount, 1899);
        assert_eq!(result.payment.plan_id, PlanId::Annual);
    }

    #[tokio::test]
    async fn repeated_taps_create_separate_attempts() {
        let f = fixture();
        f.handler.handle(command("0712345678", "monthly")).await.unwrap();
        f.handler.handle(command("0712345678", "monthly")).await.unwrap();
        assert_eq!(f.store.payment_count(), 2);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Validation Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn invalid_phone_is_rejected_without_side_effects() {
        let f = fixture();
        let err = f.handler.handle(command("12345", "monthly")).await.unwrap_err();

        assert!(matches!(
            err,
            BillingError::ValidationFailed { ref field, .. } if field == "phone_number"
        ));
        assert_eq!(f.store.payment_count(), 0);
        assert_eq!(f.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_plan_is_rejected_without_side_effects() {
        let f = fixture();
        let err = f.handler.handle(command("0712345678", "weekly")).await.unwrap_err();

        assert!(matches!(
            err,
            BillingError::ValidationFailed { ref field, .. } if field == "plan_id"
        ));
        assert_eq!(f.store.payment_count(), 0);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failure Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn gateway_rejection_marks_payment_failed() {
        let f = fixture_with(
            MockPaymentGateway::failing_with(PaymentGatewayError::rejected("Invalid PhoneNumber")),
            march_29th(),
        );
        let err = f.handler.handle(command("0712345678", "monthly")).await.unwrap_err();

        assert_eq!(err, BillingError::gateway("Invalid PhoneNumber"));
        let stored = f.store.payments();
        assert_eq!(stored[0].status, PaymentStatus::Failed);
        assert_eq!(stored[0].failure_reason.as_deref(), Some("Invalid PhoneNumber"));
    }

    #[tokio::test]
    async fn auth_failure_marks_payment_failed() {
        let f = fixture_with(
            MockPaymentGateway::failing_with(PaymentGatewayError::authentication("Invalid credentials")),
            march_29th(),
        );
        assert!(f.handler.handle(command("0712345678", "monthly")).await.is_err());
        assert_eq!(f.store.payments()[0].status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn indeterminate_gateway_error_leaves_payment_pending() {
        let f = fixture_with(
            MockPaymentGateway::failing_with(PaymentGatewayError::indeterminate("read timed out")),
            march_29th(),
        );
        let err = f.handler.handle(command("0712345678", "monthly")).await.unwrap_err();

        assert!(matches!(err, BillingError::Gateway { .. }));
        assert_eq!(f.store.payments()[0].status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn persistence_failure_skips_gateway() {
        let f = fixture();
        f.store.fail_writes(true);

        let err = f.handler.handle(command("0712345678", "monthly")).await.unwrap_err();

        assert!(matches!(err, BillingError::Persistence(_)));
        assert_eq!(f.gateway.call_count(), 0);
    }
}
