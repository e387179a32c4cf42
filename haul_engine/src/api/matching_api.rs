use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    api::{
        access::{ensure_helper, ensure_requester_or_admin},
        commission_api::CommissionApi,
        errors::LifecycleError,
    },
    db_types::{Actor, Application, ApplicationStatus},
    events::{EventProducers, OrderMatchedEvent, OrderStatusChangedEvent},
    traits::{CommissionManagement, LifecycleDatabase, MatchCommand, MatchOutcome},
};

/// The matching engine. Helpers apply to open orders, and the requester (or an admin) accepts one application.
///
/// Accepting is the single commit point of the order lifecycle: the commission split in force at that instant is
/// resolved once and frozen onto both the order and the application, capacity is claimed, and the order is scheduled.
pub struct MatchingApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for MatchingApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatchingApi")
    }
}

impl<B> MatchingApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> MatchingApi<B>
where B: LifecycleDatabase + CommissionManagement
{
    /// Applies to an order on behalf of the calling helper.
    ///
    /// ## Failure modes
    /// * `CapacityExceeded` if the order has no capacity left.
    /// * `DuplicateApplication` if the helper has already applied. The existing row is untouched.
    /// * `OrderNotOpen` if the order is not approved, or is not in `registered` or `matching`.
    pub async fn apply(&self, actor: &Actor, order_id: i64, note: Option<String>) -> Result<Application, LifecycleError> {
        ensure_helper(actor, "apply to orders")?;
        let before = self.db.fetch_order(order_id).await?.ok_or(LifecycleError::OrderNotFound(order_id))?;
        let (application, order) = self.db.insert_application(order_id, actor.id, note).await?;
        info!("🤝️ Helper #{} applied to order #{order_id}", actor.id);
        if order.status != before.status {
            let event = OrderStatusChangedEvent::new(order, before.status);
            self.producers.publish_order_status_changed(event).await;
        }
        Ok(application)
    }

    /// Accepts an application. See [`LifecycleDatabase::commit_match`] for what is written.
    ///
    /// ## Failure modes
    /// * `CapacityExceeded` if the order is full.
    /// * `OrderAlreadyMatched` if another application has already been accepted.
    /// * `InvalidApplicationTransition` if the application is no longer `applied`.
    /// * `PolicyNotFound` if no commission policy applies to the helper.
    pub async fn accept(&self, actor: &Actor, application_id: i64) -> Result<MatchOutcome, LifecycleError> {
        let application = self.fetch_existing_application(application_id).await?;
        let order = self
            .db
            .fetch_order(application.order_id)
            .await?
            .ok_or(LifecycleError::OrderNotFound(application.order_id))?;
        ensure_requester_or_admin(actor, &order, "accept applications")?;
        if application.status != ApplicationStatus::Applied {
            return Err(LifecycleError::InvalidApplicationTransition {
                id: application_id,
                from: application.status,
                to: ApplicationStatus::Selected,
            });
        }
        let accepted_at = Utc::now();
        let snapshot =
            CommissionApi::new(self.db.clone()).resolve_for_helper(application.helper_id, accepted_at).await?;
        let command = MatchCommand {
            order_id: order.id,
            application_id,
            helper_id: application.helper_id,
            snapshot,
            accepted_at,
        };
        let outcome = self.db.commit_match(command).await?;
        debug!("🤝️ Notifying match subscribers for order #{}", order.id);
        let matched = OrderMatchedEvent::new(outcome.order.clone(), outcome.application.clone());
        self.producers.publish_order_matched(matched).await;
        let changed = OrderStatusChangedEvent::new(outcome.order.clone(), order.status);
        self.producers.publish_order_status_changed(changed).await;
        Ok(outcome)
    }

    /// Declines an application that is still `applied`.
    pub async fn decline(&self, actor: &Actor, application_id: i64) -> Result<Application, LifecycleError> {
        let application = self.fetch_existing_application(application_id).await?;
        let order = self
            .db
            .fetch_order(application.order_id)
            .await?
            .ok_or(LifecycleError::OrderNotFound(application.order_id))?;
        ensure_requester_or_admin(actor, &order, "decline applications")?;
        let application = self.db.decline_application(application_id).await?;
        info!("🤝️ Application #{application_id} on order #{} declined", order.id);
        Ok(application)
    }

    async fn fetch_existing_application(&self, application_id: i64) -> Result<Application, LifecycleError> {
        self.db.fetch_application(application_id).await?.ok_or(LifecycleError::ApplicationNotFound(application_id))
    }
}
