use std::fmt::Debug;

use chrono::{Duration, Utc};
use futures_util::future::join_all;
use haul_common::Won;
use log::*;

use crate::{
    api::{
        access::{ensure_admin, ensure_helper, ensure_party, ensure_requester_or_admin, is_matched_helper},
        errors::LifecycleError,
    },
    db_types::{
        Actor,
        DeductionLeg,
        DeductionMethod,
        DispatchStatus,
        HelperStatus,
        Incident,
        IncidentAction,
        IncidentActionType,
        IncidentStatus,
        LegKind,
        NewIncident,
        NewIncidentAction,
        Order,
        OrderStatusType,
        response_deadline,
    },
    events::{DispatchFailedEvent, EventProducers, IncidentOpenedEvent, IncidentResolvedEvent, OrderStatusChangedEvent},
    traits::{
        DeductionCommand,
        DeductionOutcome,
        HelperResponse,
        IncidentManagement,
        IncidentStatusChange,
        PaymentGateway,
        PaymentResult,
    },
};

pub const DEFAULT_RESPONSE_WINDOW_HOURS: i64 = 48;
/// A `pending` leg untouched for this long is assumed lost (a crash between the decision and the dispatch, or an
/// outcome that could not be recorded) and is dispatched again.
pub const DEFAULT_STALLED_DISPATCH_MINUTES: i64 = 10;

/// The incident and dispute resolver.
///
/// Incidents are raised against closed orders. While any incident is open the order sits in a dispute state, and it
/// cannot be settled. A decision is final: `confirm_deduction` and `force_process` resolve the incident and record
/// the deduction legs in one transaction, and only then call out to the payment provider. Provider failures are
/// recorded against the leg and retried later by [`IncidentApi::retry_failed_dispatches`]; they never undo the
/// decision.
pub struct IncidentApi<B, P> {
    db: B,
    gateway: P,
    producers: EventProducers,
    response_window: Duration,
    stalled_after: Duration,
}

impl<B, P> Debug for IncidentApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IncidentApi (response window: {}h)", self.response_window.num_hours())
    }
}

impl<B, P> IncidentApi<B, P> {
    pub fn new(db: B, gateway: P, producers: EventProducers) -> Self {
        let response_window = Duration::hours(DEFAULT_RESPONSE_WINDOW_HOURS);
        let stalled_after = Duration::minutes(DEFAULT_STALLED_DISPATCH_MINUTES);
        Self { db, gateway, producers, response_window, stalled_after }
    }

    /// The time a helper has to respond to an incident that requires a response.
    pub fn with_response_window(mut self, window: Duration) -> Self {
        self.response_window = window;
        self
    }

    /// How long a leg may sit in `pending` before a retry picks it up.
    pub fn with_stalled_dispatch_after(mut self, stalled_after: Duration) -> Self {
        self.stalled_after = stalled_after;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, P> IncidentApi<B, P>
where
    B: IncidentManagement,
    P: PaymentGateway,
{
    /// Raises an incident against an order. The order moves into (or stays in) its dispute state.
    pub async fn submit(&self, actor: &Actor, order_id: i64, incident: NewIncident) -> Result<Incident, LifecycleError> {
        let order = self.fetch_existing_order(order_id).await?;
        ensure_requester_or_admin(actor, &order, "report incidents")?;
        if !order.status.accepts_incidents() {
            return Err(LifecycleError::InvalidOrderTransition {
                id: order_id,
                from: order.status,
                to: OrderStatusType::DisputeRequested,
            });
        }
        validate_new_incident(&incident)?;
        let deadline = incident.helper_response_required.then(|| response_deadline(Utc::now(), self.response_window));
        let (incident, updated) = self.db.insert_incident(order_id, actor.id, incident, deadline).await?;
        info!("🚨️ Incident #{} ({}) raised against order #{order_id} by {actor}", incident.id, incident.incident_type);
        self.producers.publish_incident_opened(IncidentOpenedEvent::new(incident.clone())).await;
        self.notify_order_status(&updated, order.status).await;
        Ok(incident)
    }

    /// Records the admin's reply. The status is untouched.
    pub async fn reply(&self, actor: &Actor, incident_id: i64, reply: &str) -> Result<Incident, LifecycleError> {
        ensure_admin(actor, "reply to incidents")?;
        if reply.trim().is_empty() {
            return Err(LifecycleError::validation("A reply cannot be empty"));
        }
        self.db.record_admin_reply(incident_id, actor.id, reply).await
    }

    /// Adds a comment to the incident's trail. Any party to the order may comment.
    pub async fn comment(&self, actor: &Actor, incident_id: i64, body: &str) -> Result<IncidentAction, LifecycleError> {
        let (incident, order) = self.fetch_incident_and_order(incident_id).await?;
        ensure_party(actor, &order, "comment on its incidents")?;
        if body.trim().is_empty() {
            return Err(LifecycleError::validation("A comment cannot be empty"));
        }
        let action = NewIncidentAction::new(incident.id, actor.id, IncidentActionType::Comment).with_body(body);
        self.db.append_incident_action(action).await
    }

    pub async fn request_evidence(
        &self,
        actor: &Actor,
        incident_id: i64,
        note: &str,
    ) -> Result<IncidentAction, LifecycleError> {
        ensure_admin(actor, "request evidence")?;
        let incident = self.fetch_existing_incident(incident_id).await?;
        if incident.status.is_terminal() {
            return Err(LifecycleError::AlreadyResolved(incident_id));
        }
        let action = NewIncidentAction::new(incident_id, actor.id, IncidentActionType::EvidenceRequest).with_body(note);
        let action = self.db.append_incident_action(action).await?;
        debug!("🚨️ Evidence requested on incident #{incident_id}");
        Ok(action)
    }

    /// Moves an incident through the status table. `applied` is reserved for settlement.
    pub async fn change_status(
        &self,
        actor: &Actor,
        incident_id: i64,
        to: IncidentStatus,
        note: Option<String>,
    ) -> Result<Incident, LifecycleError> {
        ensure_admin(actor, "change incident status")?;
        if to == IncidentStatus::Applied {
            return Err(LifecycleError::validation("Deductions are applied by finalizing the order's settlement"));
        }
        let incident = self.fetch_existing_incident(incident_id).await?;
        let from = incident.status;
        if !from.can_transition_to(to) {
            return Err(LifecycleError::InvalidIncidentTransition { id: incident_id, from, to });
        }
        let old_order_status = self.fetch_existing_order(incident.order_id).await?.status;
        let change = IncidentStatusChange { incident_id, actor_id: actor.id, from, to, note };
        let changed = self.db.change_incident_status(change).await?;
        info!("🚨️ Incident #{incident_id} moved from {from} to {to}");
        if to == IncidentStatus::Resolved {
            let event = IncidentResolvedEvent::new(changed.incident.clone(), Vec::new());
            self.producers.publish_incident_resolved(event).await;
        }
        self.notify_order_status(&changed.order, old_order_status).await;
        Ok(changed.incident)
    }

    /// The accused helper's answer to an incident. A helper may respond once, while the incident is open.
    pub async fn respond_as_helper(
        &self,
        actor: &Actor,
        incident_id: i64,
        status: HelperStatus,
        note: Option<String>,
    ) -> Result<Incident, LifecycleError> {
        ensure_helper(actor, "respond to incidents")?;
        let (incident, order) = self.fetch_incident_and_order(incident_id).await?;
        if !is_matched_helper(actor, &order) {
            return Err(LifecycleError::unauthorized(format!(
                "Only the helper matched to order #{} may respond to incident #{incident_id}",
                order.id
            )));
        }
        if incident.status.is_terminal() {
            return Err(LifecycleError::AlreadyResolved(incident_id));
        }
        let response = HelperResponse { incident_id, helper_id: actor.id, status, note };
        self.db.record_helper_response(response).await
    }

    /// Resolves an open incident with a deduction. Under [`DeductionMethod::Both`] the helper and the requester
    /// legs each carry the full `amount`.
    ///
    /// Calling this a second time for the same incident fails with `AlreadyResolved` and dispatches nothing.
    pub async fn confirm_deduction(
        &self,
        actor: &Actor,
        incident_id: i64,
        amount: Won,
        reason: &str,
        method: DeductionMethod,
    ) -> Result<DeductionOutcome, LifecycleError> {
        let (incident, order) = self.fetch_incident_and_order(incident_id).await?;
        ensure_requester_or_admin(actor, &order, "confirm deductions")?;
        validate_deduction(Some(amount), reason)?;
        if incident.status.is_terminal() {
            return Err(LifecycleError::AlreadyResolved(incident_id));
        }
        let command = DeductionCommand {
            incident_id,
            actor_id: actor.id,
            deduction: Some((amount, method)),
            reason: reason.to_string(),
            forced: false,
            decided_at: Utc::now(),
        };
        self.finalize(command, order.status).await
    }

    /// Lets an admin decide an incident the helper has not answered. The response deadline is advisory, so this is
    /// allowed before it passes.
    ///
    /// A deduction amount without a method is taken from the helper. A method without an amount is rejected.
    pub async fn force_process(
        &self,
        actor: &Actor,
        incident_id: i64,
        reason: &str,
        amount: Option<Won>,
        method: Option<DeductionMethod>,
    ) -> Result<DeductionOutcome, LifecycleError> {
        ensure_admin(actor, "force-process incidents")?;
        validate_deduction(amount, reason)?;
        let deduction = match (amount, method) {
            (Some(amount), method) => Some((amount, method.unwrap_or(DeductionMethod::HelperDeduct))),
            (None, Some(_)) => return Err(LifecycleError::validation("A deduction method needs a deduction amount")),
            (None, None) => None,
        };
        let (incident, order) = self.fetch_incident_and_order(incident_id).await?;
        if incident.status.is_terminal() {
            return Err(LifecycleError::AlreadyResolved(incident_id));
        }
        if incident.helper_has_responded() {
            return Err(LifecycleError::HelperAlreadyResponded(incident_id));
        }
        if incident.is_deadline_passed(Utc::now()) {
            debug!("🚨️ Force-processing incident #{incident_id} after its response deadline");
        } else {
            debug!("🚨️ Force-processing incident #{incident_id} before its response deadline");
        }
        let command = DeductionCommand {
            incident_id,
            actor_id: actor.id,
            deduction,
            reason: reason.to_string(),
            forced: true,
            decided_at: Utc::now(),
        };
        self.finalize(command, order.status).await
    }

    /// Whether the helper response deadline of the incident has passed. Advisory only.
    pub async fn is_deadline_passed(&self, actor: &Actor, incident_id: i64) -> Result<bool, LifecycleError> {
        let (incident, order) = self.fetch_incident_and_order(incident_id).await?;
        ensure_party(actor, &order, "view its incidents")?;
        Ok(incident.is_deadline_passed(Utc::now()))
    }

    pub async fn incident(&self, actor: &Actor, incident_id: i64) -> Result<Incident, LifecycleError> {
        let (incident, order) = self.fetch_incident_and_order(incident_id).await?;
        ensure_party(actor, &order, "view its incidents")?;
        Ok(incident)
    }

    /// The incident's audit trail, oldest first.
    pub async fn actions(&self, actor: &Actor, incident_id: i64) -> Result<Vec<IncidentAction>, LifecycleError> {
        let (incident, order) = self.fetch_incident_and_order(incident_id).await?;
        ensure_party(actor, &order, "view its incidents")?;
        self.db.fetch_incident_actions(incident.id).await
    }

    pub async fn incidents_for_order(&self, actor: &Actor, order_id: i64) -> Result<Vec<Incident>, LifecycleError> {
        let order = self.fetch_existing_order(order_id).await?;
        ensure_party(actor, &order, "view its incidents")?;
        self.db.fetch_incidents_for_order(order_id).await
    }

    /// Re-dispatches every failed deduction leg, and every `pending` leg that has stalled for longer than the
    /// configured window. Legs claimed by a concurrent retry are skipped.
    ///
    /// Returns the legs that were attempted, with their new dispatch status.
    pub async fn retry_failed_dispatches(&self) -> Result<Vec<DeductionLeg>, LifecycleError> {
        let stalled_before = Utc::now() - self.stalled_after;
        let retryable = self
            .db
            .fetch_undispatched_legs()
            .await?
            .into_iter()
            .filter(|leg| match leg.dispatch_status {
                DispatchStatus::Failed => true,
                DispatchStatus::Pending => leg.updated_at <= stalled_before,
                DispatchStatus::Dispatched => false,
            })
            .collect::<Vec<_>>();
        if retryable.is_empty() {
            return Ok(retryable);
        }
        debug!("🚨️ {} undispatched deduction leg(s) to retry", retryable.len());
        let mut attempts = Vec::with_capacity(retryable.len());
        for leg in retryable {
            let Some(leg) = self.db.claim_leg_for_retry(&leg).await? else {
                trace!("🚨️ Leg #{} was claimed elsewhere", leg.id);
                continue;
            };
            let (incident, order) = self.fetch_incident_and_order(leg.incident_id).await?;
            let reason = incident.deduction_reason.unwrap_or_else(|| format!("Incident #{}", incident.id));
            attempts.push((leg, order, reason));
        }
        let retries = attempts.into_iter().map(|(leg, order, reason)| async move {
            self.dispatch_leg(&order, leg, &reason).await
        });
        let results = join_all(retries).await;
        let dispatched = results.iter().filter(|l| l.dispatch_status == DispatchStatus::Dispatched).count();
        info!("🚨️ Retried {} deduction leg(s). {dispatched} dispatched", results.len());
        Ok(results)
    }

    async fn finalize(
        &self,
        command: DeductionCommand,
        old_order_status: OrderStatusType,
    ) -> Result<DeductionOutcome, LifecycleError> {
        let reason = command.reason.clone();
        let outcome = self.db.finalize_deduction(command).await?;
        let DeductionOutcome { incident, order, legs } = outcome;
        let legs = join_all(legs.into_iter().map(|leg| self.dispatch_leg(&order, leg, &reason))).await;
        let event = IncidentResolvedEvent::new(incident.clone(), legs.clone());
        self.producers.publish_incident_resolved(event).await;
        self.notify_order_status(&order, old_order_status).await;
        Ok(DeductionOutcome { incident, order, legs })
    }

    /// Sends one leg to the payment provider and records the outcome against it. Never fails: a provider error is
    /// recorded on the leg and published as a [`DispatchFailedEvent`].
    async fn dispatch_leg(&self, order: &Order, leg: DeductionLeg, reason: &str) -> DeductionLeg {
        let result = match self.send_leg(order, &leg, reason).await {
            Ok(result) if result.success => Ok(result.payment_id),
            Ok(result) => Err(format!("The payment provider declined the {}: {}", leg.leg, result.status)),
            Err(e) => Err(e),
        };
        let (status, payment_id, failure) = match result {
            Ok(payment_id) => (DispatchStatus::Dispatched, payment_id, None),
            Err(reason) => (DispatchStatus::Failed, None, Some(reason)),
        };
        let updated = match self.db.record_dispatch_outcome(leg.id, status, payment_id, failure.clone()).await {
            Ok(updated) => updated,
            Err(e) => {
                error!("🚨️ Could not record the dispatch outcome of leg #{}. {e}", leg.id);
                leg
            },
        };
        if let Some(reason) = failure {
            warn!("🚨️ Deduction leg #{} for order #{} failed to dispatch. {reason}", updated.id, order.id);
            self.producers.publish_dispatch_failed(DispatchFailedEvent::new(updated.clone(), reason)).await;
        } else {
            debug!("🚨️ Deduction leg #{} ({} {}) dispatched", updated.id, updated.leg, updated.amount);
        }
        updated
    }

    async fn send_leg(&self, order: &Order, leg: &DeductionLeg, reason: &str) -> Result<PaymentResult, String> {
        match leg.leg {
            LegKind::HelperDeduction => {
                let helper_id =
                    order.matched_helper_id.ok_or_else(|| format!("Order #{} has no matched helper", order.id))?;
                self.gateway
                    .debit_helper_payout(helper_id, order.id, leg.amount, reason)
                    .await
                    .map_err(|e| e.to_string())
            },
            LegKind::RequesterRefund => {
                let payment_id = order
                    .deposit_payment_id
                    .as_deref()
                    .ok_or_else(|| format!("Order #{} has no deposit payment", order.id))?;
                self.gateway.cancel_payment(payment_id, leg.amount, reason).await.map_err(|e| e.to_string())
            },
        }
    }

    async fn fetch_existing_order(&self, order_id: i64) -> Result<Order, LifecycleError> {
        self.db.fetch_order(order_id).await?.ok_or(LifecycleError::OrderNotFound(order_id))
    }

    async fn fetch_existing_incident(&self, incident_id: i64) -> Result<Incident, LifecycleError> {
        self.db.fetch_incident(incident_id).await?.ok_or(LifecycleError::IncidentNotFound(incident_id))
    }

    async fn fetch_incident_and_order(&self, incident_id: i64) -> Result<(Incident, Order), LifecycleError> {
        let incident = self.fetch_existing_incident(incident_id).await?;
        let order = self.fetch_existing_order(incident.order_id).await?;
        Ok((incident, order))
    }

    async fn notify_order_status(&self, order: &Order, old_status: OrderStatusType) {
        if order.status != old_status {
            let event = OrderStatusChangedEvent::new(order.clone(), old_status);
            self.producers.publish_order_status_changed(event).await;
        }
    }
}

fn validate_new_incident(incident: &NewIncident) -> Result<(), LifecycleError> {
    if incident.description.trim().is_empty() {
        return Err(LifecycleError::validation("An incident needs a description"));
    }
    if incident.requested_amount.map(|a| a.is_negative()).unwrap_or(false) {
        return Err(LifecycleError::validation("The requested amount cannot be negative"));
    }
    if incident.evidence.iter().any(|e| e.trim().is_empty()) {
        return Err(LifecycleError::validation("Evidence links cannot be empty"));
    }
    Ok(())
}

fn validate_deduction(amount: Option<Won>, reason: &str) -> Result<(), LifecycleError> {
    if reason.trim().is_empty() {
        return Err(LifecycleError::validation("A deduction decision needs a reason"));
    }
    match amount {
        Some(amount) if !amount.is_positive() => {
            Err(LifecycleError::validation(format!("The deduction amount must be positive, not {amount}")))
        },
        _ => Ok(()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::IncidentType;

    #[test]
    fn incident_validation() {
        let ok = NewIncident::new(IncidentType::Damage, "two boxes crushed").with_evidence("https://img/1.jpg");
        assert!(validate_new_incident(&ok).is_ok());
        assert!(validate_new_incident(&NewIncident::new(IncidentType::Loss, " ")).is_err());
        let negative = NewIncident::new(IncidentType::Loss, "lost").with_requested_amount(Won::from(-10));
        assert!(validate_new_incident(&negative).is_err());
        assert!(validate_new_incident(&NewIncident::new(IncidentType::Loss, "lost").with_evidence("")).is_err());
    }

    #[test]
    fn deduction_validation() {
        assert!(validate_deduction(Some(Won::from(50_000)), "damaged goods").is_ok());
        assert!(validate_deduction(None, "no fault found").is_ok());
        assert!(validate_deduction(Some(Won::from(50_000)), "").is_err());
        assert!(validate_deduction(Some(Won::zero()), "nothing").is_err());
        assert!(validate_deduction(Some(Won::from(-1)), "refund").is_err());
    }
}
