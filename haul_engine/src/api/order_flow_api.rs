use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    api::{
        access::{ensure_admin, ensure_helper, ensure_party, ensure_requester_or_admin},
        errors::LifecycleError,
    },
    db_types::{Actor, Application, ApprovalStatus, ClosingReport, NewClosingReport, NewOrder, Order, OrderStatusType},
    events::{EventProducers, OrderStatusChangedEvent},
    helpers::{calculate_settlement, SettlementCalculation},
    traits::{ClosingSubmission, LifecycleDatabase, PaymentGateway, PaymentRequest, PaymentResult},
};

/// `OrderFlowApi` drives an order from posting to closing: deposit, moderation, scheduling, check-in and the closing
/// report. Matching lives in [`MatchingApi`](crate::MatchingApi), and everything after closing in
/// [`SettlementApi`](crate::SettlementApi) and [`IncidentApi`](crate::IncidentApi).
pub struct OrderFlowApi<B, P> {
    db: B,
    gateway: P,
    producers: EventProducers,
}

impl<B, P> Debug for OrderFlowApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, P> OrderFlowApi<B, P> {
    pub fn new(db: B, gateway: P, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B, P> OrderFlowApi<B, P>
where
    B: LifecycleDatabase,
    P: PaymentGateway,
{
    /// Posts a new order for `requester_id`. Requesters may only post for themselves; admins may post on behalf of
    /// any requester.
    ///
    /// The order starts in `awaiting_deposit` with moderation pending.
    pub async fn create_order(&self, actor: &Actor, requester_id: i64, order: NewOrder) -> Result<Order, LifecycleError> {
        if !(actor.is_admin() || (actor.is_requester() && actor.id == requester_id)) {
            return Err(LifecycleError::unauthorized("Orders can only be posted by their requester or an admin"));
        }
        validate_new_order(&order)?;
        let order = self.db.insert_order(requester_id, order).await?;
        info!("📦️ Order #{} posted by requester #{requester_id}", order.id);
        Ok(order)
    }

    /// Asks the payment provider to collect the order's deposit and records the payment id against the order.
    pub async fn request_deposit(&self, actor: &Actor, order_id: i64) -> Result<(Order, PaymentResult), LifecycleError> {
        let order = self.fetch_existing_order(order_id).await?;
        ensure_requester_or_admin(actor, &order, "request a deposit")?;
        if order.status != OrderStatusType::AwaitingDeposit {
            return Err(LifecycleError::InvalidOrderTransition {
                id: order_id,
                from: order.status,
                to: OrderStatusType::AwaitingDeposit,
            });
        }
        let request = PaymentRequest {
            order_id,
            payer_id: order.requester_id,
            amount: order.deposit_amount,
            description: format!("Deposit for order #{order_id}: {}", order.title),
        };
        let result = self.gateway.request_payment(request).await.map_err(|e| {
            warn!("📦️ Deposit request for order #{order_id} failed. {e}");
            LifecycleError::PaymentRejected(e.to_string())
        })?;
        let payment_id = match (&result.success, &result.payment_id) {
            (true, Some(id)) => id.clone(),
            _ => return Err(LifecycleError::PaymentRejected(result.status)),
        };
        let order = self.db.set_deposit_payment(order_id, &payment_id).await?;
        debug!("📦️ Deposit {payment_id} requested for order #{order_id}");
        Ok((order, result))
    }

    /// Verifies the deposit with the payment provider and, if it has been paid, registers the order.
    pub async fn confirm_deposit(&self, actor: &Actor, order_id: i64) -> Result<Order, LifecycleError> {
        let order = self.fetch_existing_order(order_id).await?;
        ensure_requester_or_admin(actor, &order, "confirm a deposit")?;
        let payment_id = order
            .deposit_payment_id
            .clone()
            .ok_or_else(|| LifecycleError::validation(format!("No deposit has been requested for order #{order_id}")))?;
        let result = self.gateway.verify_payment(&payment_id).await.map_err(|e| {
            warn!("📦️ Deposit verification for order #{order_id} failed. {e}");
            LifecycleError::PaymentRejected(e.to_string())
        })?;
        if !result.success {
            return Err(LifecycleError::PaymentRejected(format!(
                "Deposit {payment_id} is not complete ({})",
                result.status
            )));
        }
        let updated = self.db.mark_deposit_confirmed(order_id).await?;
        self.notify_status_change(&updated, order.status).await;
        Ok(updated)
    }

    /// Records the outcome of the external moderation step.
    pub async fn record_approval(
        &self,
        actor: &Actor,
        order_id: i64,
        status: ApprovalStatus,
    ) -> Result<Order, LifecycleError> {
        ensure_admin(actor, "moderate orders")?;
        self.db.set_approval_status(order_id, status).await
    }

    /// The helper confirms the schedule of an accepted application.
    pub async fn confirm_schedule(&self, actor: &Actor, application_id: i64) -> Result<Application, LifecycleError> {
        let application = self.fetch_own_application(actor, application_id, "confirm a schedule").await?;
        self.db.confirm_schedule(application.id).await
    }

    /// The matched helper checks in on site. The order moves to `in_progress`.
    pub async fn check_in(&self, actor: &Actor, application_id: i64) -> Result<(Application, Order), LifecycleError> {
        let application = self.fetch_own_application(actor, application_id, "check in").await?;
        let (application, order) = self.db.check_in(application.id).await?;
        self.notify_status_change(&order, OrderStatusType::Scheduled).await;
        Ok((application, order))
    }

    /// The matched helper submits the closing report. The provisional settlement is computed from the report and the
    /// snapshots frozen at match time, and stored with the report.
    pub async fn submit_closing(
        &self,
        actor: &Actor,
        application_id: i64,
        report: NewClosingReport,
    ) -> Result<(ClosingReport, SettlementCalculation), LifecycleError> {
        let application = self.fetch_own_application(actor, application_id, "submit a closing report").await?;
        let order = self.fetch_existing_order(application.order_id).await?;
        let pricing = order
            .pricing_snapshot()
            .ok_or_else(|| LifecycleError::validation(format!("Order #{} has not been matched", order.id)))?;
        let commission = application.snapshot().ok_or_else(|| {
            LifecycleError::validation(format!("Application #{application_id} has no commission snapshot"))
        })?;
        let calculation = calculate_settlement(&report, &pricing, &commission)?;
        let submission = ClosingSubmission {
            order_id: order.id,
            application_id,
            helper_id: application.helper_id,
            report,
            calculation,
        };
        let (report, _, updated) = self.db.submit_closing(submission).await?;
        self.notify_status_change(&updated, order.status).await;
        Ok((report, calculation))
    }

    /// Fetches an order. Open orders are visible to every helper; otherwise only the parties to the order may see it.
    pub async fn order(&self, actor: &Actor, order_id: i64) -> Result<Order, LifecycleError> {
        let order = self.fetch_existing_order(order_id).await?;
        if !(actor.is_helper() && order.is_visible_to_helpers()) {
            ensure_party(actor, &order, "view it")?;
        }
        Ok(order)
    }

    pub async fn open_orders(&self) -> Result<Vec<Order>, LifecycleError> {
        self.db.fetch_open_orders().await
    }

    /// Orders posted by the actor (requesters), or all orders for a given requester (admins).
    pub async fn orders_for_requester(&self, actor: &Actor, requester_id: i64) -> Result<Vec<Order>, LifecycleError> {
        if !(actor.is_admin() || (actor.is_requester() && actor.id == requester_id)) {
            return Err(LifecycleError::unauthorized("Requesters may only list their own orders"));
        }
        self.db.fetch_orders_for_requester(requester_id).await
    }

    pub async fn applications_for_order(
        &self,
        actor: &Actor,
        order_id: i64,
    ) -> Result<Vec<Application>, LifecycleError> {
        let order = self.fetch_existing_order(order_id).await?;
        ensure_requester_or_admin(actor, &order, "list its applications")?;
        self.db.fetch_applications_for_order(order_id).await
    }

    pub async fn applications_for_helper(&self, actor: &Actor) -> Result<Vec<Application>, LifecycleError> {
        ensure_helper(actor, "list their applications")?;
        self.db.fetch_applications_for_helper(actor.id).await
    }

    /// Soft-hides settled orders that have been untouched for longer than `grace`.
    pub async fn hide_settled_orders(&self, grace: Duration) -> Result<Vec<Order>, LifecycleError> {
        let cutoff = Utc::now() - grace;
        self.db.hide_settled_orders(cutoff).await
    }

    async fn fetch_existing_order(&self, order_id: i64) -> Result<Order, LifecycleError> {
        self.db.fetch_order(order_id).await?.ok_or(LifecycleError::OrderNotFound(order_id))
    }

    async fn fetch_own_application(
        &self,
        actor: &Actor,
        application_id: i64,
        action: &str,
    ) -> Result<Application, LifecycleError> {
        ensure_helper(actor, action)?;
        let application =
            self.db.fetch_application(application_id).await?.ok_or(LifecycleError::ApplicationNotFound(application_id))?;
        if application.helper_id != actor.id {
            return Err(LifecycleError::unauthorized(format!(
                "Only the helper on application #{application_id} may {action}"
            )));
        }
        Ok(application)
    }

    async fn notify_status_change(&self, order: &Order, old_status: OrderStatusType) {
        if order.status == old_status {
            return;
        }
        trace!("📦️ Notifying order status change subscribers for order #{}", order.id);
        self.producers.publish_order_status_changed(OrderStatusChangedEvent::new(order.clone(), old_status)).await;
    }
}

pub(crate) fn validate_new_order(order: &NewOrder) -> Result<(), LifecycleError> {
    if order.title.trim().is_empty() {
        return Err(LifecycleError::validation("An order needs a title"));
    }
    if order.max_helpers < 1 {
        return Err(LifecycleError::validation("An order needs room for at least one helper"));
    }
    if order.price_per_unit.is_negative() || order.deposit_amount.is_negative() {
        return Err(LifecycleError::validation("Prices cannot be negative"));
    }
    if order.min_total.map(|m| m.is_negative()).unwrap_or(false) {
        return Err(LifecycleError::validation("The minimum total cannot be negative"));
    }
    if let (Some(start), Some(end)) = (order.scheduled_start, order.scheduled_end) {
        if end <= start {
            return Err(LifecycleError::validation("The scheduling window must end after it starts"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};
    use haul_common::Won;

    use super::*;

    #[test]
    fn new_order_validation() {
        let ok = NewOrder::new("Gangnam parcels", Won::from(1500), 2);
        assert!(validate_new_order(&ok).is_ok());
        assert!(validate_new_order(&NewOrder::new("  ", Won::from(1500), 2)).is_err());
        assert!(validate_new_order(&NewOrder::new("x", Won::from(1500), 0)).is_err());
        assert!(validate_new_order(&NewOrder::new("x", Won::from(-1), 1)).is_err());
        assert!(validate_new_order(&ok.clone().with_min_total(Won::from(-5))).is_err());
        let now = Utc::now();
        assert!(validate_new_order(&ok.clone().with_window(now, now - Duration::hours(1))).is_err());
        assert!(validate_new_order(&ok.with_window(now, now + Duration::hours(4))).is_ok());
    }
}
