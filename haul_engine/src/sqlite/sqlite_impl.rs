//! `SqliteDatabase` is a concrete implementation of a lifecycle engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`traits`] module.
//!
//! [`traits`]: crate::traits
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{applications, closing, commission, db_url, incidents, is_unique_violation, ledger, new_pool, orders};
use crate::{
    api::errors::LifecycleError,
    db_types::{
        Application,
        ApplicationStatus,
        ApprovalStatus,
        ClosingReport,
        CommissionPolicy,
        DeductionLeg,
        DispatchStatus,
        Incident,
        IncidentAction,
        IncidentActionType,
        IncidentStatus,
        NewCommissionPolicy,
        NewIncident,
        NewIncidentAction,
        NewOrder,
        Order,
        OrderStatusType,
    },
    traits::{
        ClosingSubmission,
        CommissionManagement,
        DeductionCommand,
        DeductionOutcome,
        HelperResponse,
        IncidentManagement,
        IncidentStatusChange,
        IncidentStatusChanged,
        LifecycleDatabase,
        MatchCommand,
        MatchOutcome,
        OrderManagement,
        SettlementOutcome,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs the embedded migrations against this database.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await
    }
}

//--------------------------------------   Failure diagnosis   ---------------------------------------------------------
// Each of these runs after a guarded write touched no rows, inside the same transaction, and explains why.

async fn require_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Order, LifecycleError> {
    orders::fetch_order(order_id, conn).await?.ok_or(LifecycleError::OrderNotFound(order_id))
}

async fn require_application(id: i64, conn: &mut SqliteConnection) -> Result<Application, LifecycleError> {
    applications::fetch_application(id, conn).await?.ok_or(LifecycleError::ApplicationNotFound(id))
}

async fn require_incident(id: i64, conn: &mut SqliteConnection) -> Result<Incident, LifecycleError> {
    incidents::fetch_incident(id, conn).await?.ok_or(LifecycleError::IncidentNotFound(id))
}

async fn apply_rejected(order_id: i64, conn: &mut SqliteConnection) -> LifecycleError {
    match require_order(order_id, conn).await {
        Ok(order) if order.is_full() => LifecycleError::CapacityExceeded(order_id),
        Ok(_) => LifecycleError::OrderNotOpen(order_id),
        Err(e) => e,
    }
}

async fn match_rejected(order_id: i64, conn: &mut SqliteConnection) -> LifecycleError {
    match require_order(order_id, conn).await {
        Ok(order) if order.is_full() => LifecycleError::CapacityExceeded(order_id),
        Ok(order) if order.is_matched() => LifecycleError::OrderAlreadyMatched(order_id),
        Ok(order) if order.approval_status != ApprovalStatus::Approved => LifecycleError::OrderNotOpen(order_id),
        Ok(order) => LifecycleError::InvalidOrderTransition {
            id: order_id,
            from: order.status,
            to: OrderStatusType::Scheduled,
        },
        Err(e) => e,
    }
}

async fn order_transition_rejected(order_id: i64, to: OrderStatusType, conn: &mut SqliteConnection) -> LifecycleError {
    match require_order(order_id, conn).await {
        Ok(order) => LifecycleError::InvalidOrderTransition { id: order_id, from: order.status, to },
        Err(e) => e,
    }
}

async fn application_transition_rejected(
    id: i64,
    to: ApplicationStatus,
    conn: &mut SqliteConnection,
) -> LifecycleError {
    match require_application(id, conn).await {
        Ok(app) => LifecycleError::InvalidApplicationTransition { id, from: app.status, to },
        Err(e) => e,
    }
}

async fn resolution_rejected(id: i64, forced: bool, conn: &mut SqliteConnection) -> LifecycleError {
    match require_incident(id, conn).await {
        Ok(incident) if incident.status.is_terminal() => LifecycleError::AlreadyResolved(id),
        Ok(_) if forced => LifecycleError::HelperAlreadyResponded(id),
        Ok(incident) => {
            LifecycleError::InvalidIncidentTransition { id, from: incident.status, to: IncidentStatus::Resolved }
        },
        Err(e) => e,
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order(order_id, &mut conn).await?)
    }

    async fn fetch_open_orders(&self) -> Result<Vec<Order>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_open_orders(&mut conn).await?)
    }

    async fn fetch_orders_for_requester(&self, requester_id: i64) -> Result<Vec<Order>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_requester(requester_id, &mut conn).await?)
    }

    async fn fetch_application(&self, application_id: i64) -> Result<Option<Application>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(applications::fetch_application(application_id, &mut conn).await?)
    }

    async fn fetch_applications_for_order(&self, order_id: i64) -> Result<Vec<Application>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(applications::fetch_applications_for_order(order_id, &mut conn).await?)
    }

    async fn fetch_applications_for_helper(&self, helper_id: i64) -> Result<Vec<Application>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(applications::fetch_applications_for_helper(helper_id, &mut conn).await?)
    }

    async fn fetch_accepted_application(&self, order_id: i64) -> Result<Option<Application>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(applications::fetch_accepted_application(order_id, &mut conn).await?)
    }

    async fn fetch_closing_report(&self, order_id: i64) -> Result<Option<ClosingReport>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(closing::fetch_closing_report(order_id, &mut conn).await?)
    }

    async fn fetch_deduction_legs_for_order(&self, order_id: i64) -> Result<Vec<DeductionLeg>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::fetch_legs_for_order(order_id, &mut conn).await?)
    }
}

impl LifecycleDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, requester_id: i64, order: NewOrder) -> Result<Order, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(requester_id, order, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn set_deposit_payment(&self, order_id: i64, payment_id: &str) -> Result<Order, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let order = match orders::set_deposit_payment(order_id, payment_id, &mut tx).await? {
            Some(order) => order,
            None => return Err(order_transition_rejected(order_id, OrderStatusType::AwaitingDeposit, &mut tx).await),
        };
        tx.commit().await?;
        Ok(order)
    }

    async fn mark_deposit_confirmed(&self, order_id: i64) -> Result<Order, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let from = [OrderStatusType::AwaitingDeposit];
        let order = match orders::transition_order(order_id, &from, OrderStatusType::Registered, &mut tx).await? {
            Some(order) => order,
            None => return Err(order_transition_rejected(order_id, OrderStatusType::Registered, &mut tx).await),
        };
        tx.commit().await?;
        info!("📦️ Deposit for order #{order_id} confirmed. Order is registered");
        Ok(order)
    }

    async fn set_approval_status(&self, order_id: i64, status: ApprovalStatus) -> Result<Order, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::set_approval_status(order_id, status, &mut tx)
            .await?
            .ok_or(LifecycleError::OrderNotFound(order_id))?;
        tx.commit().await?;
        info!("📦️ Order #{order_id} moderation status is now {status}");
        Ok(order)
    }

    async fn insert_application(
        &self,
        order_id: i64,
        helper_id: i64,
        note: Option<String>,
    ) -> Result<(Application, Order), LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let application = match applications::insert_application(order_id, helper_id, note, &mut tx).await {
            Ok(Some(application)) => application,
            Ok(None) => return Err(apply_rejected(order_id, &mut tx).await),
            Err(e) if is_unique_violation(&e) => {
                return Err(LifecycleError::DuplicateApplication { order_id, helper_id });
            },
            Err(e) => return Err(e.into()),
        };
        let from = [OrderStatusType::Registered];
        let order = match orders::transition_order(order_id, &from, OrderStatusType::Matching, &mut tx).await? {
            Some(order) => order,
            None => require_order(order_id, &mut tx).await?,
        };
        tx.commit().await?;
        Ok((application, order))
    }

    async fn decline_application(&self, application_id: i64) -> Result<Application, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let (from, to) = (ApplicationStatus::Applied, ApplicationStatus::Rejected);
        let application = match applications::transition_application(application_id, from, to, &mut tx).await? {
            Some(application) => application,
            None => return Err(application_transition_rejected(application_id, to, &mut tx).await),
        };
        tx.commit().await?;
        Ok(application)
    }

    async fn commit_match(&self, command: MatchCommand) -> Result<MatchOutcome, LifecycleError> {
        let MatchCommand { order_id, application_id, helper_id, snapshot, accepted_at } = command;
        let mut tx = self.pool.begin().await?;
        let order = match orders::claim_match(order_id, helper_id, &snapshot, accepted_at, &mut tx).await? {
            Some(order) => order,
            None => return Err(match_rejected(order_id, &mut tx).await),
        };
        let application = match applications::accept_application(application_id, order_id, &snapshot, &mut tx).await {
            Ok(Some(application)) => application,
            Ok(None) => {
                return Err(application_transition_rejected(application_id, ApplicationStatus::Selected, &mut tx).await)
            },
            Err(e) if is_unique_violation(&e) => return Err(LifecycleError::OrderAlreadyMatched(order_id)),
            Err(e) => return Err(e.into()),
        };
        if application.helper_id != helper_id {
            return Err(LifecycleError::validation(format!(
                "Application #{application_id} belongs to helper #{}, not #{helper_id}",
                application.helper_id
            )));
        }
        tx.commit().await?;
        info!(
            "🤝️ Order #{order_id} matched to helper #{helper_id}. Commission {} frozen from {}",
            snapshot.total_rate, snapshot.source
        );
        Ok(MatchOutcome { order, application })
    }

    async fn confirm_schedule(&self, application_id: i64) -> Result<Application, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let (from, to) = (ApplicationStatus::Selected, ApplicationStatus::Scheduled);
        let application = match applications::transition_application(application_id, from, to, &mut tx).await? {
            Some(application) => application,
            None => return Err(application_transition_rejected(application_id, to, &mut tx).await),
        };
        tx.commit().await?;
        Ok(application)
    }

    async fn check_in(&self, application_id: i64) -> Result<(Application, Order), LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let (from, to) = (ApplicationStatus::Scheduled, ApplicationStatus::InProgress);
        let application = match applications::transition_application(application_id, from, to, &mut tx).await? {
            Some(application) => application,
            None => return Err(application_transition_rejected(application_id, to, &mut tx).await),
        };
        let order_id = application.order_id;
        let from = [OrderStatusType::Scheduled];
        let order = match orders::transition_order(order_id, &from, OrderStatusType::InProgress, &mut tx).await? {
            Some(order) => order,
            None => return Err(order_transition_rejected(order_id, OrderStatusType::InProgress, &mut tx).await),
        };
        tx.commit().await?;
        info!("📦️ Helper #{} checked in on order #{order_id}", application.helper_id);
        Ok((application, order))
    }

    async fn submit_closing(
        &self,
        submission: ClosingSubmission,
    ) -> Result<(ClosingReport, Application, Order), LifecycleError> {
        let ClosingSubmission { order_id, application_id, helper_id, report, calculation } = submission;
        let mut tx = self.pool.begin().await?;
        let (from, to) = (ApplicationStatus::InProgress, ApplicationStatus::ClosingSubmitted);
        let application = match applications::transition_application(application_id, from, to, &mut tx).await? {
            Some(application) => application,
            None => return Err(application_transition_rejected(application_id, to, &mut tx).await),
        };
        let order = match orders::record_closing(order_id, calculation.min_total_applied, &mut tx).await? {
            Some(order) => order,
            None => return Err(order_transition_rejected(order_id, OrderStatusType::ClosingSubmitted, &mut tx).await),
        };
        let report =
            closing::insert_closing_report(order_id, application_id, helper_id, report, &calculation, &mut tx).await?;
        tx.commit().await?;
        info!("🧾️ Closing report submitted for order #{order_id}. Provisional total {}", report.total_amount);
        Ok((report, application, order))
    }

    async fn finalize_settlement(&self, order_id: i64, actor_id: i64) -> Result<SettlementOutcome, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let order = match orders::settle_order(order_id, &mut tx).await? {
            Some(order) => order,
            None => {
                let open = incidents::count_open_incidents(order_id, &mut tx).await?;
                if open > 0 {
                    return Err(LifecycleError::OpenIncidents(order_id));
                }
                return Err(order_transition_rejected(order_id, OrderStatusType::Settled, &mut tx).await);
            },
        };
        let accepted = applications::fetch_accepted_application(order_id, &mut tx)
            .await?
            .ok_or_else(|| LifecycleError::validation(format!("Order #{order_id} has no accepted application")))?;
        let (from, to) = (ApplicationStatus::ClosingSubmitted, ApplicationStatus::Completed);
        let application = match applications::transition_application(accepted.id, from, to, &mut tx).await? {
            Some(application) => application,
            None => return Err(application_transition_rejected(accepted.id, to, &mut tx).await),
        };
        let applied_incidents = incidents::apply_resolved_deductions(order_id, &mut tx).await?;
        for incident in &applied_incidents {
            let action = NewIncidentAction::new(incident.id, actor_id, IncidentActionType::StatusChange)
                .with_body("Deduction applied to the final settlement")
                .with_transition(IncidentStatus::Resolved, IncidentStatus::Applied);
            incidents::insert_action(action, &mut tx).await?;
        }
        tx.commit().await?;
        info!("🧾️ Order #{order_id} settled. {} incident deduction(s) applied", applied_incidents.len());
        Ok(SettlementOutcome { order, application, applied_incidents })
    }

    async fn hide_settled_orders(&self, settled_before: DateTime<Utc>) -> Result<Vec<Order>, LifecycleError> {
        let candidates = {
            let mut conn = self.pool.acquire().await?;
            orders::fetch_visible_settled_orders(&mut conn).await?
        };
        let mut tx = self.pool.begin().await?;
        let mut hidden = Vec::new();
        for order in candidates.into_iter().filter(|o| o.updated_at < settled_before) {
            if let Some(order) = orders::hide_order(order.id, &mut tx).await? {
                hidden.push(order);
            }
        }
        tx.commit().await?;
        if !hidden.is_empty() {
            info!("📦️ {} settled orders hidden", hidden.len());
        }
        Ok(hidden)
    }

    async fn close(&mut self) -> Result<(), LifecycleError> {
        self.pool.close().await;
        Ok(())
    }
}

impl CommissionManagement for SqliteDatabase {
    async fn insert_policy(&self, policy: NewCommissionPolicy) -> Result<CommissionPolicy, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let policy = commission::insert_policy(policy, &mut tx).await?;
        tx.commit().await?;
        Ok(policy)
    }

    async fn fetch_policies(&self) -> Result<Vec<CommissionPolicy>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(commission::fetch_policies(&mut conn).await?)
    }

    async fn fetch_policies_for_helper(
        &self,
        helper_id: i64,
        team_id: Option<i64>,
    ) -> Result<Vec<CommissionPolicy>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(commission::fetch_policies_for_helper(helper_id, team_id, &mut conn).await?)
    }

    async fn assign_team(&self, helper_id: i64, team_id: i64) -> Result<(), LifecycleError> {
        let mut tx = self.pool.begin().await?;
        commission::assign_team(helper_id, team_id, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_team_for_helper(&self, helper_id: i64) -> Result<Option<i64>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(commission::fetch_team_for_helper(helper_id, &mut conn).await?)
    }
}

impl IncidentManagement for SqliteDatabase {
    async fn insert_incident(
        &self,
        order_id: i64,
        reporter_id: i64,
        incident: NewIncident,
        helper_response_deadline: Option<DateTime<Utc>>,
    ) -> Result<(Incident, Order), LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let incident =
            incidents::insert_incident(order_id, reporter_id, incident, helper_response_deadline, &mut tx).await?;
        let order = incidents::sync_order_dispute_status(order_id, &mut tx)
            .await?
            .ok_or(LifecycleError::OrderNotFound(order_id))?;
        tx.commit().await?;
        Ok((incident, order))
    }

    async fn fetch_incident(&self, incident_id: i64) -> Result<Option<Incident>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(incidents::fetch_incident(incident_id, &mut conn).await?)
    }

    async fn fetch_incidents_for_order(&self, order_id: i64) -> Result<Vec<Incident>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(incidents::fetch_incidents_for_order(order_id, &mut conn).await?)
    }

    async fn fetch_incident_actions(&self, incident_id: i64) -> Result<Vec<IncidentAction>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(incidents::fetch_actions(incident_id, &mut conn).await?)
    }

    async fn append_incident_action(&self, action: NewIncidentAction) -> Result<IncidentAction, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let action = incidents::insert_action(action, &mut tx).await?;
        tx.commit().await?;
        Ok(action)
    }

    async fn record_admin_reply(&self, incident_id: i64, actor_id: i64, reply: &str) -> Result<Incident, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let incident = incidents::set_admin_reply(incident_id, reply, &mut tx)
            .await?
            .ok_or(LifecycleError::IncidentNotFound(incident_id))?;
        let action = NewIncidentAction::new(incident_id, actor_id, IncidentActionType::Reply).with_body(reply);
        incidents::insert_action(action, &mut tx).await?;
        tx.commit().await?;
        Ok(incident)
    }

    async fn change_incident_status(
        &self,
        change: IncidentStatusChange,
    ) -> Result<IncidentStatusChanged, LifecycleError> {
        let IncidentStatusChange { incident_id, actor_id, from, to, note } = change;
        let mut tx = self.pool.begin().await?;
        let incident = match incidents::transition_incident(incident_id, from, to, &mut tx).await? {
            Some(incident) => incident,
            None => {
                let current = require_incident(incident_id, &mut tx).await?;
                return Err(LifecycleError::InvalidIncidentTransition { id: incident_id, from: current.status, to });
            },
        };
        let mut action =
            NewIncidentAction::new(incident_id, actor_id, IncidentActionType::StatusChange).with_transition(from, to);
        action.body = note;
        incidents::insert_action(action, &mut tx).await?;
        let order = incidents::sync_order_dispute_status(incident.order_id, &mut tx)
            .await?
            .ok_or(LifecycleError::OrderNotFound(incident.order_id))?;
        tx.commit().await?;
        Ok(IncidentStatusChanged { incident, order, old_status: from })
    }

    async fn record_helper_response(&self, response: HelperResponse) -> Result<Incident, LifecycleError> {
        let HelperResponse { incident_id, helper_id, status, note } = response;
        let mut tx = self.pool.begin().await?;
        let incident = match incidents::set_helper_response(incident_id, status, note.clone(), &mut tx).await? {
            Some(incident) => incident,
            None => {
                let current = require_incident(incident_id, &mut tx).await?;
                return Err(if current.status.is_terminal() {
                    LifecycleError::AlreadyResolved(incident_id)
                } else {
                    LifecycleError::HelperAlreadyResponded(incident_id)
                });
            },
        };
        let body = match note {
            Some(note) => format!("{status}: {note}"),
            None => status.to_string(),
        };
        let action = NewIncidentAction::new(incident_id, helper_id, IncidentActionType::HelperResponse).with_body(body);
        incidents::insert_action(action, &mut tx).await?;
        tx.commit().await?;
        info!("🚨️ Helper #{helper_id} responded to incident #{incident_id} with {status}");
        Ok(incident)
    }

    async fn finalize_deduction(&self, command: DeductionCommand) -> Result<DeductionOutcome, LifecycleError> {
        let DeductionCommand { incident_id, actor_id, deduction, reason, forced, decided_at } = command;
        let mut tx = self.pool.begin().await?;
        let resolved = if forced {
            incidents::force_resolve(incident_id, deduction, &reason, decided_at, &mut tx).await?
        } else {
            incidents::resolve_with_deduction(incident_id, deduction, &reason, decided_at, &mut tx).await?
        };
        let incident = match resolved {
            Some(incident) => incident,
            None => return Err(resolution_rejected(incident_id, forced, &mut tx).await),
        };
        let order_id = incident.order_id;
        let mut legs = Vec::new();
        if let Some((amount, method)) = deduction {
            for kind in method.legs() {
                legs.push(ledger::insert_leg(incident_id, order_id, kind, amount, &mut tx).await?);
            }
        }
        let action_type = if forced { IncidentActionType::ForceProcessed } else { IncidentActionType::DeductionConfirmed };
        let body = match deduction {
            Some((amount, method)) => format!("{amount} via {method}. {reason}"),
            None => format!("No deduction. {reason}"),
        };
        let mut action = NewIncidentAction::new(incident_id, actor_id, action_type).with_body(body);
        action.to_status = Some(IncidentStatus::Resolved);
        incidents::insert_action(action, &mut tx).await?;
        let order =
            incidents::sync_order_dispute_status(order_id, &mut tx).await?.ok_or(LifecycleError::OrderNotFound(order_id))?;
        tx.commit().await?;
        info!(
            "🚨️ Incident #{incident_id} resolved{} with {} deduction leg(s)",
            if forced { " by forced processing" } else { "" },
            legs.len()
        );
        Ok(DeductionOutcome { incident, order, legs })
    }

    async fn fetch_deduction_legs_for_incident(&self, incident_id: i64) -> Result<Vec<DeductionLeg>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::fetch_legs_for_incident(incident_id, &mut conn).await?)
    }

    async fn claim_leg_for_retry(&self, leg: &DeductionLeg) -> Result<Option<DeductionLeg>, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let claimed = ledger::claim_leg_for_retry(leg, &mut tx).await?;
        tx.commit().await?;
        Ok(claimed)
    }

    async fn record_dispatch_outcome(
        &self,
        leg_id: i64,
        status: DispatchStatus,
        payment_id: Option<String>,
        failure_reason: Option<String>,
    ) -> Result<DeductionLeg, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let leg = match ledger::record_dispatch_outcome(leg_id, status, payment_id, failure_reason, &mut tx).await? {
            Some(leg) => leg,
            None => {
                warn!("🧾️ Dispatch outcome for leg #{leg_id} ignored. The leg is missing or already dispatched");
                return Err(LifecycleError::validation(format!("Deduction leg #{leg_id} cannot be updated")));
            },
        };
        tx.commit().await?;
        Ok(leg)
    }

    async fn fetch_undispatched_legs(&self) -> Result<Vec<DeductionLeg>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::fetch_undispatched_legs(&mut conn).await?)
    }
}
