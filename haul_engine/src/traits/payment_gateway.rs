use haul_common::Won;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The result of any call into the payment collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub success: bool,
    pub payment_id: Option<String>,
    /// The provider's own status string, recorded as-is.
    pub status: String,
}

impl PaymentResult {
    pub fn succeeded<S: Into<String>>(payment_id: S, status: &str) -> Self {
        Self { success: true, payment_id: Some(payment_id.into()), status: status.to_string() }
    }

    pub fn failed(status: &str) -> Self {
        Self { success: false, payment_id: None, status: status.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_id: i64,
    pub payer_id: i64,
    pub amount: Won,
    pub description: String,
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("The payment provider could not be reached. {0}")]
    Unavailable(String),
    #[error("The payment provider returned an invalid response. {0}")]
    InvalidResponse(String),
}

/// The external payment collaborator.
///
/// The lifecycle never rolls back a recorded decision because one of these calls failed. Failures are recorded on the
/// relevant row and retried out of band.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    /// Asks the requester to pay for an order (the deposit).
    async fn request_payment(&self, request: PaymentRequest) -> Result<PaymentResult, PaymentGatewayError>;

    /// Checks whether the payment with the given id has been completed.
    async fn verify_payment(&self, payment_id: &str) -> Result<PaymentResult, PaymentGatewayError>;

    /// Cancels `amount` of a completed payment, refunding it to the payer. This is how requester refunds are paid.
    async fn cancel_payment(&self, payment_id: &str, amount: Won, reason: &str)
        -> Result<PaymentResult, PaymentGatewayError>;

    /// Debits `amount` from the helper's payout for the order.
    async fn debit_helper_payout(
        &self,
        helper_id: i64,
        order_id: i64,
        amount: Won,
        reason: &str,
    ) -> Result<PaymentResult, PaymentGatewayError>;
}
