use chrono::{DateTime, Utc};
use haul_common::Won;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{
        Application,
        CommissionSnapshot,
        DeductionLeg,
        DeductionMethod,
        HelperStatus,
        Incident,
        IncidentStatus,
        NewClosingReport,
        Order,
    },
    helpers::SettlementCalculation,
};

/// Everything the match commit point needs, resolved up front so that the backend can apply it in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCommand {
    pub order_id: i64,
    pub application_id: i64,
    pub helper_id: i64,
    pub snapshot: CommissionSnapshot,
    pub accepted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub order: Order,
    pub application: Application,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosingSubmission {
    pub order_id: i64,
    pub application_id: i64,
    pub helper_id: i64,
    pub report: NewClosingReport,
    pub calculation: SettlementCalculation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub order: Order,
    pub application: Application,
    /// Incidents whose deductions were carried into this settlement, now in `applied` status.
    pub applied_incidents: Vec<Incident>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentStatusChange {
    pub incident_id: i64,
    pub actor_id: i64,
    /// The status the caller observed. The change only applies if the incident is still in this status.
    pub from: IncidentStatus,
    pub to: IncidentStatus,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentStatusChanged {
    pub incident: Incident,
    pub order: Order,
    pub old_status: IncidentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperResponse {
    pub incident_id: i64,
    pub helper_id: i64,
    pub status: HelperStatus,
    pub note: Option<String>,
}

/// The decision recorded by `confirm_deduction` and `force_process`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeductionCommand {
    pub incident_id: i64,
    pub actor_id: i64,
    /// `None` resolves the incident without a deduction. Only forced processing may do this.
    pub deduction: Option<(Won, DeductionMethod)>,
    pub reason: String,
    /// Set for forced processing. Forced processing only succeeds while the helper has not responded.
    pub forced: bool,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionOutcome {
    pub incident: Incident,
    pub order: Order,
    pub legs: Vec<DeductionLeg>,
}
