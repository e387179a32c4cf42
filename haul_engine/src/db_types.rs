//! Data types that are stored in, and loaded from, the lifecycle database.
//!
//! Every status or type column is a closed string enumeration. The string stored in the database is the canonical
//! snake_case name given in the `string_enum!` invocation below; there is exactly one spelling per concept.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

pub use haul_common::{Rate, Won};

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConversionError(String);

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[sqlx(rename = $s)]
                #[serde(rename = $s)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $s,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($name::$variant),)+
                    other => Err(ConversionError(format!("Invalid {}: {other}", stringify!($name)))),
                }
            }
        }
    };
}

//--------------------------------------        Actors         ---------------------------------------------------------
string_enum! {
    /// The platform role an authenticated caller acts under.
    Role {
        Requester => "requester",
        Helper => "helper",
        Admin => "admin",
    }
}

/// The identity behind a call into the engine. Authentication happens upstream; the engine only checks that the
/// actor has the relationship to the record that the operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    pub const fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    pub const fn requester(id: i64) -> Self {
        Self::new(id, Role::Requester)
    }

    pub const fn helper(id: i64) -> Self {
        Self::new(id, Role::Helper)
    }

    pub const fn admin(id: i64) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_helper(&self) -> bool {
        self.role == Role::Helper
    }

    pub fn is_requester(&self) -> bool {
        self.role == Role::Requester
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.role, self.id)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
string_enum! {
    OrderStatusType {
        /// Created by the requester; the deposit has not been verified yet.
        AwaitingDeposit => "awaiting_deposit",
        /// Deposit verified. Visible to helpers once moderation approves it.
        Registered => "registered",
        /// At least one helper has applied.
        Matching => "matching",
        /// An application has been accepted and the commission snapshot is frozen.
        Scheduled => "scheduled",
        /// The matched helper has checked in.
        InProgress => "in_progress",
        /// The matched helper has submitted a closing report.
        ClosingSubmitted => "closing_submitted",
        DisputeRequested => "dispute_requested",
        DisputeReviewing => "dispute_reviewing",
        DisputeResolved => "dispute_resolved",
        DisputeRejected => "dispute_rejected",
        /// Final. Payouts have been fixed.
        Settled => "settled",
    }
}

impl OrderStatusType {
    /// Helpers may apply while the order is in one of these states (and moderation has approved it).
    pub fn accepts_applications(&self) -> bool {
        matches!(self, Self::Registered | Self::Matching)
    }

    pub fn is_dispute(&self) -> bool {
        matches!(self, Self::DisputeRequested | Self::DisputeReviewing | Self::DisputeResolved | Self::DisputeRejected)
    }

    /// Incidents can only be raised once the work has been closed.
    pub fn accepts_incidents(&self) -> bool {
        matches!(self, Self::ClosingSubmitted | Self::Settled) || self.is_dispute()
    }

    /// States from which `finalize_settlement` may move the order to `Settled`.
    pub fn can_settle(&self) -> bool {
        matches!(self, Self::ClosingSubmitted | Self::DisputeResolved | Self::DisputeRejected)
    }

    /// The dispute status an order should carry given the statuses of all of its incidents.
    ///
    /// Any open incident keeps the dispute open (`dispute_reviewing` if one is under review). Once every incident is
    /// closed, the order is `dispute_resolved` if at least one was decided in the reporter's favour, and
    /// `dispute_rejected` otherwise. Returns `None` when there are no incidents.
    pub fn dispute_status_for(incidents: &[IncidentStatus]) -> Option<Self> {
        use IncidentStatus::*;
        if incidents.is_empty() {
            return None;
        }
        let status = if incidents.contains(&Reviewing) {
            Self::DisputeReviewing
        } else if incidents.contains(&Submitted) {
            Self::DisputeRequested
        } else if incidents.iter().any(|s| matches!(s, Resolved | Applied)) {
            Self::DisputeResolved
        } else {
            Self::DisputeRejected
        };
        Some(status)
    }
}

string_enum! {
    /// Outcome of the external moderation step.
    ApprovalStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub requester_id: i64,
    pub title: String,
    pub memo: Option<String>,
    pub price_per_unit: Won,
    pub max_helpers: i64,
    pub current_helpers: i64,
    pub status: OrderStatusType,
    pub approval_status: ApprovalStatus,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub matched_helper_id: Option<i64>,
    pub snapshot_platform_rate: Option<Rate>,
    pub snapshot_team_leader_rate: Option<Rate>,
    pub snapshot_commission_rate: Option<Rate>,
    pub base_price_per_box: Won,
    pub final_price_per_box: Option<Won>,
    /// Frozen once the order is matched.
    pub min_total: Option<Won>,
    /// Whether `min_total` raised the supply amount of the closing report. False until a report is submitted.
    pub min_total_applied: bool,
    pub deposit_amount: Won,
    pub deposit_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub hidden_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_full(&self) -> bool {
        self.current_helpers >= self.max_helpers
    }

    pub fn is_visible_to_helpers(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved && self.status.accepts_applications() && self.hidden_at.is_none()
    }

    pub fn is_matched(&self) -> bool {
        self.matched_helper_id.is_some()
    }

    /// The pricing inputs frozen at match time. `None` until the order has been matched.
    pub fn pricing_snapshot(&self) -> Option<PricingSnapshot> {
        let final_price_per_box = self.final_price_per_box?;
        Some(PricingSnapshot {
            base_price_per_box: self.base_price_per_box,
            final_price_per_box,
            min_total: self.min_total,
        })
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub title: String,
    #[serde(default)]
    pub memo: Option<String>,
    /// Price per delivered or returned box.
    pub price_per_unit: Won,
    pub max_helpers: i64,
    /// A floor for the supply amount of the job, if the requester agreed to one.
    #[serde(default)]
    pub min_total: Option<Won>,
    #[serde(default)]
    pub scheduled_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_end: Option<DateTime<Utc>>,
    pub deposit_amount: Won,
}

impl NewOrder {
    pub fn new<S: Into<String>>(title: S, price_per_unit: Won, max_helpers: i64) -> Self {
        Self {
            title: title.into(),
            memo: None,
            price_per_unit,
            max_helpers,
            min_total: None,
            scheduled_start: None,
            scheduled_end: None,
            deposit_amount: Won::zero(),
        }
    }

    pub fn with_memo<S: Into<String>>(mut self, memo: S) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_min_total(mut self, min_total: Won) -> Self {
        self.min_total = Some(min_total);
        self
    }

    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.scheduled_start = Some(start);
        self.scheduled_end = Some(end);
        self
    }

    pub fn with_deposit(mut self, deposit: Won) -> Self {
        self.deposit_amount = deposit;
        self
    }
}

//--------------------------------------  ApplicationStatus    ---------------------------------------------------------
string_enum! {
    ApplicationStatus {
        Applied => "applied",
        Selected => "selected",
        Scheduled => "scheduled",
        InProgress => "in_progress",
        ClosingSubmitted => "closing_submitted",
        Completed => "completed",
        Rejected => "rejected",
    }
}

impl ApplicationStatus {
    /// The statuses that count as "the" accepted application for an order. At most one row per order may be in one
    /// of these states; the database enforces this with a partial unique index.
    pub const ACCEPTED: [ApplicationStatus; 5] =
        [Self::Selected, Self::Scheduled, Self::InProgress, Self::ClosingSubmitted, Self::Completed];

    pub fn is_accepted(&self) -> bool {
        Self::ACCEPTED.contains(self)
    }
}

//--------------------------------------     Application       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub order_id: i64,
    pub helper_id: i64,
    pub status: ApplicationStatus,
    pub note: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub selected_at: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub closing_submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub snapshot_platform_rate: Option<Rate>,
    pub snapshot_team_leader_rate: Option<Rate>,
    pub snapshot_commission_rate: Option<Rate>,
    pub snapshot_source: Option<SnapshotSource>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// The commission snapshot frozen when this application was accepted.
    pub fn snapshot(&self) -> Option<CommissionSnapshot> {
        Some(CommissionSnapshot {
            platform_rate: self.snapshot_platform_rate?,
            team_leader_rate: self.snapshot_team_leader_rate?,
            total_rate: self.snapshot_commission_rate?,
            source: self.snapshot_source?,
        })
    }
}

//--------------------------------------  Commission policies  ---------------------------------------------------------
string_enum! {
    /// Which policy tier produced a commission snapshot.
    SnapshotSource {
        HelperOverride => "helper_override",
        TeamOverride => "team_override",
        GlobalDefault => "global_default",
    }
}

string_enum! {
    PolicyScope {
        Global => "global",
        Team => "team",
        Helper => "helper",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CommissionPolicy {
    pub id: i64,
    pub scope: PolicyScope,
    /// The team id for `Team` policies, the helper id for `Helper` policies, and `None` for the global default.
    pub subject_id: Option<i64>,
    pub platform_rate: Rate,
    pub team_leader_rate: Rate,
    pub effective_from: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommissionPolicy {
    pub scope: PolicyScope,
    #[serde(default)]
    pub subject_id: Option<i64>,
    pub platform_rate: Rate,
    pub team_leader_rate: Rate,
    pub effective_from: DateTime<Utc>,
}

impl NewCommissionPolicy {
    pub fn global(platform_rate: Rate, team_leader_rate: Rate, effective_from: DateTime<Utc>) -> Self {
        Self { scope: PolicyScope::Global, subject_id: None, platform_rate, team_leader_rate, effective_from }
    }

    pub fn team(team_id: i64, platform_rate: Rate, team_leader_rate: Rate, effective_from: DateTime<Utc>) -> Self {
        Self { scope: PolicyScope::Team, subject_id: Some(team_id), platform_rate, team_leader_rate, effective_from }
    }

    pub fn helper(helper_id: i64, platform_rate: Rate, team_leader_rate: Rate, effective_from: DateTime<Utc>) -> Self {
        Self { scope: PolicyScope::Helper, subject_id: Some(helper_id), platform_rate, team_leader_rate, effective_from }
    }
}

/// The commission split frozen onto an order and its accepted application at match time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSnapshot {
    pub platform_rate: Rate,
    pub team_leader_rate: Rate,
    pub total_rate: Rate,
    pub source: SnapshotSource,
}

/// Pricing inputs frozen onto the order at match time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSnapshot {
    pub base_price_per_box: Won,
    pub final_price_per_box: Won,
    pub min_total: Option<Won>,
}

//--------------------------------------    Closing report     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraCost {
    pub label: String,
    pub amount: Won,
}

impl ExtraCost {
    pub fn new<S: Into<String>>(label: S, amount: Won) -> Self {
        Self { label: label.into(), amount }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClosingReport {
    pub delivered_count: i64,
    pub returned_count: i64,
    #[serde(default)]
    pub etc_count: i64,
    #[serde(default)]
    pub etc_unit_price: Won,
    #[serde(default)]
    pub extra_costs: Vec<ExtraCost>,
    #[serde(default)]
    pub memo: Option<String>,
}

impl NewClosingReport {
    pub fn new(delivered_count: i64, returned_count: i64) -> Self {
        Self { delivered_count, returned_count, ..Default::default() }
    }

    pub fn with_etc(mut self, etc_count: i64, etc_unit_price: Won) -> Self {
        self.etc_count = etc_count;
        self.etc_unit_price = etc_unit_price;
        self
    }

    pub fn with_extra_cost(mut self, cost: ExtraCost) -> Self {
        self.extra_costs.push(cost);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ClosingReport {
    pub id: i64,
    pub order_id: i64,
    pub application_id: i64,
    pub helper_id: i64,
    pub delivered_count: i64,
    pub returned_count: i64,
    pub etc_count: i64,
    pub etc_unit_price: Won,
    pub extra_costs: Json<Vec<ExtraCost>>,
    pub memo: Option<String>,
    /// The figures computed when the report was submitted. Kept so later recomputation can be checked against them.
    pub supply_amount: Won,
    pub vat_amount: Won,
    pub total_amount: Won,
    pub min_total_applied: bool,
    pub submitted_at: DateTime<Utc>,
}

//--------------------------------------       Incidents       ---------------------------------------------------------
string_enum! {
    IncidentType {
        Damage => "damage",
        Loss => "loss",
        Misdelivery => "misdelivery",
        Delay => "delay",
        CountMismatch => "count_mismatch",
        AmountError => "amount_error",
        Other => "other",
    }
}

string_enum! {
    IncidentStatus {
        Submitted => "submitted",
        Reviewing => "reviewing",
        /// The incident was decided, with or without a deduction.
        Resolved => "resolved",
        Rejected => "rejected",
        /// The resolved deduction has been carried into a finalized settlement.
        Applied => "applied",
        Cancelled => "cancelled",
    }
}

impl IncidentStatus {
    /// Open incidents can still be reviewed, decided or force-processed.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Submitted | Self::Reviewing)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }

    /// The explicit status-change table. Deductions use their own entry points, which move an open incident to
    /// `Resolved`; the only exit from a terminal state is `Resolved → Applied`.
    pub fn can_transition_to(&self, next: IncidentStatus) -> bool {
        use IncidentStatus::*;
        matches!(
            (self, next),
            (Submitted, Reviewing | Resolved | Rejected | Cancelled) |
                (Reviewing, Resolved | Rejected | Cancelled) |
                (Resolved, Applied)
        )
    }
}

string_enum! {
    /// The accused helper's own answer to an incident, tracked independently of the admin-facing status.
    HelperStatus {
        Confirmed => "confirmed",
        ItemFound => "item_found",
        RequestHandling => "request_handling",
    }
}

string_enum! {
    DeductionMethod {
        HelperDeduct => "helper_deduct",
        RequesterRefund => "requester_refund",
        Both => "both",
    }
}

impl DeductionMethod {
    /// The debit legs this method dispatches. Each leg carries the full deduction amount.
    pub fn legs(&self) -> Vec<LegKind> {
        match self {
            Self::HelperDeduct => vec![LegKind::HelperDeduction],
            Self::RequesterRefund => vec![LegKind::RequesterRefund],
            Self::Both => vec![LegKind::HelperDeduction, LegKind::RequesterRefund],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Incident {
    pub id: i64,
    pub order_id: i64,
    pub reporter_id: i64,
    pub incident_type: IncidentType,
    pub description: String,
    pub requested_amount: Option<Won>,
    pub evidence: Json<Vec<String>>,
    pub admin_reply: Option<String>,
    pub status: IncidentStatus,
    pub deduction_amount: Option<Won>,
    pub deduction_reason: Option<String>,
    pub deduction_method: Option<DeductionMethod>,
    pub helper_status: Option<HelperStatus>,
    pub helper_note: Option<String>,
    pub helper_responded_at: Option<DateTime<Utc>>,
    pub helper_response_deadline: Option<DateTime<Utc>>,
    pub helper_response_required: bool,
    pub admin_force_processed: bool,
    pub admin_force_reason: Option<String>,
    pub admin_force_processed_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    /// Whether the helper response deadline has elapsed at `now`. Incidents without a deadline never lapse.
    ///
    /// This is advisory only. Nothing changes state when the deadline passes.
    pub fn is_deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.helper_response_deadline.map(|deadline| now > deadline).unwrap_or(false)
    }

    pub fn helper_has_responded(&self) -> bool {
        self.helper_status.is_some()
    }

    /// `force_process` is offered while the helper is silent and the incident is still open.
    pub fn can_force_process(&self) -> bool {
        self.helper_status.is_none() && self.status.is_open()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIncident {
    pub incident_type: IncidentType,
    pub description: String,
    #[serde(default)]
    pub requested_amount: Option<Won>,
    #[serde(default)]
    pub evidence: Vec<String>,
    /// When true, the accused helper is given a response deadline.
    #[serde(default)]
    pub helper_response_required: bool,
}

impl NewIncident {
    pub fn new<S: Into<String>>(incident_type: IncidentType, description: S) -> Self {
        Self {
            incident_type,
            description: description.into(),
            requested_amount: None,
            evidence: Vec::new(),
            helper_response_required: false,
        }
    }

    pub fn with_requested_amount(mut self, amount: Won) -> Self {
        self.requested_amount = Some(amount);
        self
    }

    pub fn with_evidence<S: Into<String>>(mut self, url: S) -> Self {
        self.evidence.push(url.into());
        self
    }

    pub fn requiring_helper_response(mut self) -> Self {
        self.helper_response_required = true;
        self
    }
}

/// Computes the helper response deadline for a new incident.
pub fn response_deadline(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now + window
}

//--------------------------------------   Incident actions    ---------------------------------------------------------
string_enum! {
    IncidentActionType {
        Comment => "comment",
        StatusChange => "status_change",
        Reply => "reply",
        EvidenceRequest => "evidence_request",
        HelperResponse => "helper_response",
        DeductionConfirmed => "deduction_confirmed",
        ForceProcessed => "force_processed",
    }
}

/// Append-only audit entry on an incident.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct IncidentAction {
    pub id: i64,
    pub incident_id: i64,
    pub actor_id: i64,
    pub action_type: IncidentActionType,
    pub body: Option<String>,
    pub from_status: Option<IncidentStatus>,
    pub to_status: Option<IncidentStatus>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIncidentAction {
    pub incident_id: i64,
    pub actor_id: i64,
    pub action_type: IncidentActionType,
    pub body: Option<String>,
    pub from_status: Option<IncidentStatus>,
    pub to_status: Option<IncidentStatus>,
}

impl NewIncidentAction {
    pub fn new(incident_id: i64, actor_id: i64, action_type: IncidentActionType) -> Self {
        Self { incident_id, actor_id, action_type, body: None, from_status: None, to_status: None }
    }

    pub fn with_body<S: Into<String>>(mut self, body: S) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_transition(mut self, from: IncidentStatus, to: IncidentStatus) -> Self {
        self.from_status = Some(from);
        self.to_status = Some(to);
        self
    }
}

//--------------------------------------    Deduction legs     ---------------------------------------------------------
string_enum! {
    LegKind {
        HelperDeduction => "helper_deduction",
        RequesterRefund => "requester_refund",
    }
}

string_enum! {
    DispatchStatus {
        Pending => "pending",
        Dispatched => "dispatched",
        Failed => "failed",
    }
}

/// One debit recorded against an order as the outcome of an incident. The leg is part of the ledger from the moment
/// the deduction is confirmed; `dispatch_status` only tracks whether the payment collaborator has executed it.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DeductionLeg {
    pub id: i64,
    pub incident_id: i64,
    pub order_id: i64,
    pub leg: LegKind,
    pub amount: Won,
    pub dispatch_status: DispatchStatus,
    pub payment_id: Option<String>,
    pub failure_reason: Option<String>,
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn enum_strings_round_trip() {
        for status in OrderStatusType::ALL {
            assert_eq!(status.as_str().parse::<OrderStatusType>().unwrap(), *status);
        }
        assert_eq!(IncidentType::CountMismatch.to_string(), "count_mismatch");
        assert_eq!(serde_json::to_string(&DeductionMethod::HelperDeduct).unwrap(), "\"helper_deduct\"");
        assert!("lost".parse::<IncidentType>().is_err());
        assert!("pending".parse::<IncidentStatus>().is_err());
    }

    #[test]
    fn incident_transition_table() {
        use IncidentStatus::*;
        assert!(Submitted.can_transition_to(Reviewing));
        assert!(Reviewing.can_transition_to(Rejected));
        assert!(Resolved.can_transition_to(Applied));
        assert!(!Reviewing.can_transition_to(Submitted));
        assert!(!Rejected.can_transition_to(Reviewing));
        assert!(!Submitted.can_transition_to(Applied));
        assert!(!Cancelled.can_transition_to(Resolved));
        assert!(!Submitted.can_transition_to(Submitted));
    }

    #[test]
    fn order_status_groups() {
        use OrderStatusType::*;
        assert!(Registered.accepts_applications());
        assert!(Matching.accepts_applications());
        assert!(!Scheduled.accepts_applications());
        assert!(!InProgress.accepts_incidents());
        assert!(ClosingSubmitted.accepts_incidents());
        assert!(Settled.accepts_incidents());
        assert!(!DisputeRequested.can_settle());
        assert!(DisputeRejected.can_settle());
    }

    #[test]
    fn dispute_status_follows_incidents() {
        use IncidentStatus::*;
        assert_eq!(OrderStatusType::dispute_status_for(&[]), None);
        assert_eq!(OrderStatusType::dispute_status_for(&[Submitted]), Some(OrderStatusType::DisputeRequested));
        assert_eq!(
            OrderStatusType::dispute_status_for(&[Submitted, Reviewing, Resolved]),
            Some(OrderStatusType::DisputeReviewing)
        );
        assert_eq!(OrderStatusType::dispute_status_for(&[Resolved, Rejected]), Some(OrderStatusType::DisputeResolved));
        assert_eq!(
            OrderStatusType::dispute_status_for(&[Rejected, Cancelled]),
            Some(OrderStatusType::DisputeRejected)
        );
    }

    #[test]
    fn deduction_legs() {
        assert_eq!(DeductionMethod::Both.legs(), vec![LegKind::HelperDeduction, LegKind::RequesterRefund]);
        assert_eq!(DeductionMethod::RequesterRefund.legs(), vec![LegKind::RequesterRefund]);
    }

    #[test]
    fn deadline_is_advisory_and_strict() {
        let deadline = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let incident = Incident {
            id: 1,
            order_id: 1,
            reporter_id: 1,
            incident_type: IncidentType::Damage,
            description: "box crushed".into(),
            requested_amount: None,
            evidence: Json(vec![]),
            admin_reply: None,
            status: IncidentStatus::Submitted,
            deduction_amount: None,
            deduction_reason: None,
            deduction_method: None,
            helper_status: None,
            helper_note: None,
            helper_responded_at: None,
            helper_response_deadline: Some(deadline),
            helper_response_required: true,
            admin_force_processed: false,
            admin_force_reason: None,
            admin_force_processed_at: None,
            resolved_at: None,
            created_at: deadline,
            updated_at: deadline,
        };
        assert!(!incident.is_deadline_passed(deadline));
        assert!(incident.is_deadline_passed(deadline + Duration::seconds(1)));
        assert!(incident.can_force_process());
        let no_deadline = Incident { helper_response_deadline: None, ..incident };
        assert!(!no_deadline.is_deadline_passed(deadline + Duration::days(365)));
    }
}
