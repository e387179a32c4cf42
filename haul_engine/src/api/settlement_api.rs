use std::fmt::Debug;

use log::*;

use crate::{
    api::{
        access::{ensure_party, ensure_requester_or_admin},
        errors::LifecycleError,
    },
    db_types::{Actor, NewClosingReport, OrderStatusType},
    events::{EventProducers, OrderStatusChangedEvent},
    helpers::{calculate_settlement, SettlementStatement},
    traits::{LifecycleDatabase, SettlementOutcome},
};

/// Settlement statements and the final settlement of an order.
///
/// A statement is derived on demand from the stored closing report, the snapshots frozen at match time and the
/// deduction ledger.
pub struct SettlementApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B> SettlementApi<B>
where B: LifecycleDatabase
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    /// The settlement statement for an order: the provisional calculation from the closing report, less every
    /// deduction leg recorded against the order.
    pub async fn statement(&self, actor: &Actor, order_id: i64) -> Result<SettlementStatement, LifecycleError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(LifecycleError::OrderNotFound(order_id))?;
        ensure_party(actor, &order, "view its settlement")?;
        let report = self.db.fetch_closing_report(order_id).await?.ok_or(LifecycleError::ClosingReportNotFound(order_id))?;
        let pricing = order
            .pricing_snapshot()
            .ok_or_else(|| LifecycleError::validation(format!("Order #{order_id} has no pricing snapshot")))?;
        let application = self
            .db
            .fetch_accepted_application(order_id)
            .await?
            .ok_or_else(|| LifecycleError::validation(format!("Order #{order_id} has no accepted application")))?;
        let commission = application.snapshot().ok_or_else(|| {
            LifecycleError::validation(format!("Application #{} has no commission snapshot", application.id))
        })?;
        let calculation = calculate_settlement(&NewClosingReport::from(&report), &pricing, &commission)?;
        if calculation.total_amount != report.total_amount {
            warn!(
                "🧾️ Recomputed total {} for order #{order_id} differs from the submitted total {}",
                calculation.total_amount, report.total_amount
            );
        }
        let legs = self.db.fetch_deduction_legs_for_order(order_id).await?;
        Ok(SettlementStatement::new(order_id, calculation, legs))
    }

    /// Settles an order once its closing report is in and every incident against it is closed. Resolved deductions
    /// move to `applied` in the same step.
    pub async fn finalize_settlement(&self, actor: &Actor, order_id: i64) -> Result<SettlementOutcome, LifecycleError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(LifecycleError::OrderNotFound(order_id))?;
        ensure_requester_or_admin(actor, &order, "finalize settlement")?;
        let old_status = order.status;
        if old_status == OrderStatusType::Settled {
            return Err(LifecycleError::InvalidOrderTransition { id: order_id, from: old_status, to: old_status });
        }
        let outcome = self.db.finalize_settlement(order_id, actor.id).await?;
        debug!("🧾️ Notifying order status change subscribers for settled order #{order_id}");
        let event = OrderStatusChangedEvent::new(outcome.order.clone(), old_status);
        self.producers.publish_order_status_changed(event).await;
        Ok(outcome)
    }
}
