use haul_engine::{
    db_types::OrderStatusType,
    events::{
        DispatchFailedEvent,
        EventHandlers,
        EventHooks,
        IncidentOpenedEvent,
        IncidentResolvedEvent,
        OrderMatchedEvent,
        OrderStatusChangedEvent,
    },
};
use log::*;

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 50;

/// Assigns the notification handlers.
///
/// The marketplace's messaging service consumes the notification log, so every handler writes a single structured
/// line under the `haul::notifications` target:
///
/// 1. OrderStatusChanged - the requester (and matched helper, if any) is told about the new status.
/// 2. OrderMatched - the accepted helper is told the job is theirs.
/// 3. IncidentOpened / IncidentResolved - the parties to the order are told about the dispute and its outcome.
/// 4. DispatchFailed - operations are alerted that a deduction leg needs attention. The worker retries it.
pub fn create_notification_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_status_changed(|ev| {
        let OrderStatusChangedEvent { order, old_status } = ev;
        Box::pin(async move {
            info!(
                target: "haul::notifications",
                "📬️ Order #{} moved from {old_status} to {}. Notify requester #{}{}",
                order.id,
                order.status,
                order.requester_id,
                order.matched_helper_id.map(|h| format!(" and helper #{h}")).unwrap_or_default()
            );
            if order.status == OrderStatusType::Settled {
                debug!(target: "haul::notifications", "📬️ Order #{} is settled. Payouts are final.", order.id);
            }
        })
    });
    hooks.on_order_matched(|ev| {
        let OrderMatchedEvent { order, application } = ev;
        Box::pin(async move {
            info!(
                target: "haul::notifications",
                "📬️ Helper #{} was matched to order #{} (application #{})",
                application.helper_id,
                order.id,
                application.id
            );
        })
    });
    hooks.on_incident_opened(|ev| {
        let IncidentOpenedEvent { incident } = ev;
        Box::pin(async move {
            let deadline = incident.helper_response_deadline.map(|d| format!(" Respond by {d}.")).unwrap_or_default();
            info!(
                target: "haul::notifications",
                "📬️ A {} incident (#{}) was reported on order #{}.{deadline}",
                incident.incident_type,
                incident.id,
                incident.order_id
            );
        })
    });
    hooks.on_incident_resolved(|ev| {
        let IncidentResolvedEvent { incident, legs } = ev;
        Box::pin(async move {
            info!(
                target: "haul::notifications",
                "📬️ Incident #{} on order #{} was resolved with {} deduction leg(s)",
                incident.id,
                incident.order_id,
                legs.len()
            );
        })
    });
    hooks.on_dispatch_failed(|ev| {
        let DispatchFailedEvent { leg, reason } = ev;
        Box::pin(async move {
            warn!(
                target: "haul::notifications",
                "📬️ The {} of {} for incident #{} could not be dispatched. {reason}",
                leg.leg,
                leg.amount,
                leg.incident_id
            );
        })
    });
    EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks)
}
