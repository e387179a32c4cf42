//! A sandbox payment provider.
//!
//! It approves every request, hands out sequential payment ids and logs each call, so that the full order lifecycle
//! can be run without a card processor behind it. A production deployment swaps in an adapter for its processor by
//! implementing [`PaymentGateway`].
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use haul_common::Won;
use haul_engine::{PaymentGateway, PaymentGatewayError, PaymentRequest, PaymentResult};
use log::*;

#[derive(Debug, Clone, Default)]
pub struct SandboxPaymentProvider {
    next_id: Arc<AtomicU64>,
}

impl SandboxPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_payment_id(&self, prefix: &str) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}_{id:08}")
    }
}

impl PaymentGateway for SandboxPaymentProvider {
    async fn request_payment(&self, request: PaymentRequest) -> Result<PaymentResult, PaymentGatewayError> {
        let id = self.next_payment_id("dep");
        info!(
            "💳️ Payment {id} of {} requested from user #{} for order #{}",
            request.amount, request.payer_id, request.order_id
        );
        Ok(PaymentResult::succeeded(id, "requested"))
    }

    async fn verify_payment(&self, payment_id: &str) -> Result<PaymentResult, PaymentGatewayError> {
        info!("💳️ Payment {payment_id} verified");
        Ok(PaymentResult::succeeded(payment_id, "paid"))
    }

    async fn cancel_payment(
        &self,
        payment_id: &str,
        amount: Won,
        reason: &str,
    ) -> Result<PaymentResult, PaymentGatewayError> {
        let id = self.next_payment_id("ref");
        info!("💳️ Refund {id}: {amount} of payment {payment_id} returned to the payer. {reason}");
        Ok(PaymentResult::succeeded(id, "cancelled"))
    }

    async fn debit_helper_payout(
        &self,
        helper_id: i64,
        order_id: i64,
        amount: Won,
        reason: &str,
    ) -> Result<PaymentResult, PaymentGatewayError> {
        let id = self.next_payment_id("deb");
        info!("💳️ Debit {id}: {amount} withheld from helper #{helper_id}'s payout for order #{order_id}. {reason}");
        Ok(PaymentResult::succeeded(id, "debited"))
    }
}
