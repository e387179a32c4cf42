//! Request and response bodies that are specific to the HTTP surface. Where an engine type already has the right shape
//! (`NewIncident`, `NewClosingReport`, `NewCommissionPolicy`), the routes accept it directly.
use haul_common::Won;
use haul_engine::{
    db_types::{
        Application,
        ApprovalStatus,
        ClosingReport,
        DeductionMethod,
        HelperStatus,
        IncidentStatus,
        NewOrder,
        Order,
    },
    helpers::SettlementCalculation,
    PaymentResult,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(flatten)]
    pub order: NewOrder,
    /// Admins posting on behalf of a requester name them here. Requesters leave it out.
    #[serde(default)]
    pub requester_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositResponse {
    pub order: Order,
    pub payment: PaymentResult,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub status: ApprovalStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInResponse {
    pub application: Application,
    pub order: Order,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosingResponse {
    pub report: ClosingReport,
    pub calculation: SettlementCalculation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyRequest {
    pub reply: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRequest {
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangeRequest {
    pub status: IncidentStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperResponseRequest {
    pub status: HelperStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductionRequest {
    pub amount: Won,
    pub reason: String,
    pub method: DeductionMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceProcessRequest {
    pub reason: String,
    #[serde(default)]
    pub amount: Option<Won>,
    #[serde(default)]
    pub method: Option<DeductionMethod>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeadlineResponse {
    pub incident_id: i64,
    pub deadline_passed: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TeamAssignment {
    pub helper_id: i64,
    pub team_id: i64,
}
