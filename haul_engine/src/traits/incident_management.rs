use chrono::{DateTime, Utc};

use crate::{
    api::errors::LifecycleError,
    db_types::{DeductionLeg, DispatchStatus, Incident, IncidentAction, NewIncident, NewIncidentAction, Order},
    traits::{
        data_objects::{DeductionCommand, DeductionOutcome, HelperResponse, IncidentStatusChange, IncidentStatusChanged},
        OrderManagement,
    },
};

/// Storage for incidents, their append-only audit trail and the deduction ledger.
///
/// Any method that changes an incident's status also brings the owning order's dispute status in line with the
/// statuses of all of its incidents (see [`OrderStatusType::dispute_status_for`](crate::db_types::OrderStatusType)).
/// Settled orders keep their status.
#[allow(async_fn_in_trait)]
pub trait IncidentManagement: Clone + OrderManagement {
    async fn insert_incident(
        &self,
        order_id: i64,
        reporter_id: i64,
        incident: NewIncident,
        helper_response_deadline: Option<DateTime<Utc>>,
    ) -> Result<(Incident, Order), LifecycleError>;

    async fn fetch_incident(&self, incident_id: i64) -> Result<Option<Incident>, LifecycleError>;

    async fn fetch_incidents_for_order(&self, order_id: i64) -> Result<Vec<Incident>, LifecycleError>;

    async fn fetch_incident_actions(&self, incident_id: i64) -> Result<Vec<IncidentAction>, LifecycleError>;

    async fn append_incident_action(&self, action: NewIncidentAction) -> Result<IncidentAction, LifecycleError>;

    /// Sets the admin reply and appends a `reply` action. The status is untouched.
    async fn record_admin_reply(&self, incident_id: i64, actor_id: i64, reply: &str) -> Result<Incident, LifecycleError>;

    /// Compare-and-set status change, logged as a `status_change` action.
    async fn change_incident_status(
        &self,
        change: IncidentStatusChange,
    ) -> Result<IncidentStatusChanged, LifecycleError>;

    /// Records the accused helper's answer. Succeeds at most once, and only while the incident is open.
    async fn record_helper_response(&self, response: HelperResponse) -> Result<Incident, LifecycleError>;

    /// Resolves an open incident and records one deduction leg per debited party, in one transaction. A second call
    /// for the same incident fails with `AlreadyResolved` and writes nothing.
    async fn finalize_deduction(&self, command: DeductionCommand) -> Result<DeductionOutcome, LifecycleError>;

    async fn fetch_deduction_legs_for_incident(&self, incident_id: i64) -> Result<Vec<DeductionLeg>, LifecycleError>;

    /// Claims a `failed` or stalled `pending` leg for another dispatch attempt. The leg must be unchanged since the
    /// caller fetched it. Returns `None` if another worker got there first.
    async fn claim_leg_for_retry(&self, leg: &DeductionLeg) -> Result<Option<DeductionLeg>, LifecycleError>;

    /// Records the outcome of a dispatch attempt against the leg.
    async fn record_dispatch_outcome(
        &self,
        leg_id: i64,
        status: DispatchStatus,
        payment_id: Option<String>,
        failure_reason: Option<String>,
    ) -> Result<DeductionLeg, LifecycleError>;

    /// Legs that are `failed` or still `pending`, oldest first.
    async fn fetch_undispatched_legs(&self) -> Result<Vec<DeductionLeg>, LifecycleError>;
}
