//! Mock payment gateway for testing.
//!
//! Accepts every push by default, handing out sequential checkout
//! references. Errors can be queued and every request is recorded.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::ports::{PaymentGateway, PaymentGatewayError, PushPaymentAccepted, PushPaymentRequest};

#[derive(Default)]
pub struct MockPaymentGateway {
    inner: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    /// Errors returned by the next calls, in order.
    queued_errors: VecDeque<PaymentGatewayError>,
    /// Every request received.
    requests: Vec<PushPaymentRequest>,
    accepted: u32,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose next push fails with `error`.
    pub fn failing_with(error: PaymentGatewayError) -> Self {
        let mock = Self::new();
        mock.queue_error(error);
        mock
    }

    pub fn queue_error(&self, error: PaymentGatewayError) {
        self.state().queued_errors.push_back(error);
    }

    pub fn requests(&self) -> Vec<PushPaymentRequest> {
        self.state().requests.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().requests.len()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn push_payment(
        &self,
        request: PushPaymentRequest,
    ) -> Result<PushPaymentAccepted, PaymentGatewayError> {
        let mut state = self.state();
        state.requests.push(request);

        if let Some(error) = state.queued_errors.pop_front() {
            return Err(error);
        }

        state.accepted += 1;
        Ok(PushPaymentAccepted {
            checkout_request_id: format!("ws_CO_mock_{}", state.accepted),
            merchant_request_id: format!("mock-merchant-{}", state.accepted),
            customer_message: Some("Success. Request accepted for processing".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::PhoneNumber;
    use crate::domain::foundation::PaymentId;

    fn request() -> PushPaymentRequest {
        PushPaymentRequest {
            payment_id: PaymentId::new(),
            phone_number: PhoneNumber::parse("0712345678").unwrap(),
            amount: 24,
        }
    }

    #[tokio::test]
    async fn accepts_with_sequential_references() {
        let gateway = MockPaymentGateway::new();
        let first = gateway.push_payment(request()).await.unwrap();
        let second = gateway.push_payment(request()).await.unwrap();
        assert_eq!(first.checkout_request_id, "ws_CO_mock_1");
        assert_eq!(second.checkout_request_id, "ws_CO_mock_2");
        assert_eq!(gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn queued_error_is_returned_once() {
        let gateway = MockPaymentGateway::failing_with(PaymentGatewayError::rejected("Invalid PhoneNumber"));
        assert!(gateway.push_payment(request()).await.is_err());
        assert!(gateway.push_payment(request()).await.is_ok());
    }
}
