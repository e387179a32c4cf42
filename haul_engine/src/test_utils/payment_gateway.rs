use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
    Mutex,
};

use haul_common::Won;
use log::*;

use crate::traits::{PaymentGateway, PaymentGatewayError, PaymentRequest, PaymentResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentCall {
    Request(PaymentRequest),
    Verify(String),
    Cancel { payment_id: String, amount: Won },
    DebitHelper { helper_id: i64, order_id: i64, amount: Won },
}

/// An in-memory payment provider that records every call. Switch it to failing mode to exercise the dispatch
/// failure and retry paths.
#[derive(Debug, Clone, Default)]
pub struct RecordingPaymentGateway {
    calls: Arc<Mutex<Vec<PaymentCall>>>,
    failing: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
}

impl RecordingPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<PaymentCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn debits(&self) -> Vec<PaymentCall> {
        self.calls().into_iter().filter(|c| matches!(c, PaymentCall::DebitHelper { .. })).collect()
    }

    pub fn refunds(&self) -> Vec<PaymentCall> {
        self.calls().into_iter().filter(|c| matches!(c, PaymentCall::Cancel { .. })).collect()
    }

    fn record(&self, call: PaymentCall) -> Result<PaymentResult, PaymentGatewayError> {
        trace!("💳️ {call:?}");
        self.calls.lock().unwrap().push(call);
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentGatewayError::Unavailable("test gateway is failing".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentResult::succeeded(format!("pay_{id}"), "completed"))
    }
}

impl PaymentGateway for RecordingPaymentGateway {
    async fn request_payment(&self, request: PaymentRequest) -> Result<PaymentResult, PaymentGatewayError> {
        self.record(PaymentCall::Request(request))
    }

    async fn verify_payment(&self, payment_id: &str) -> Result<PaymentResult, PaymentGatewayError> {
        self.record(PaymentCall::Verify(payment_id.to_string()))
    }

    async fn cancel_payment(
        &self,
        payment_id: &str,
        amount: Won,
        _reason: &str,
    ) -> Result<PaymentResult, PaymentGatewayError> {
        self.record(PaymentCall::Cancel { payment_id: payment_id.to_string(), amount })
    }

    async fn debit_helper_payout(
        &self,
        helper_id: i64,
        order_id: i64,
        amount: Won,
        _reason: &str,
    ) -> Result<PaymentResult, PaymentGatewayError> {
        self.record(PaymentCall::DebitHelper { helper_id, order_id, amount })
    }
}
