use chrono::Duration;
use haul_engine::{
    db_types::{DeductionLeg, DispatchStatus},
    events::EventProducers,
    IncidentApi,
    OrderFlowApi,
    SqliteDatabase,
};
use log::*;
use tokio::task::JoinHandle;

use crate::integrations::payment_provider::SandboxPaymentProvider;

/// Starts the housekeeping worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Each run re-dispatches deduction legs the payment provider failed to execute, along with legs stuck in `pending`,
/// then soft-hides orders that have been settled for longer than `hide_settled_after`.
pub fn start_housekeeping_worker(
    db: SqliteDatabase,
    gateway: SandboxPaymentProvider,
    producers: EventProducers,
    interval: std::time::Duration,
    hide_settled_after: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let orders = OrderFlowApi::new(db.clone(), gateway.clone(), producers.clone());
        let incidents = IncidentApi::new(db, gateway, producers);
        info!("🕰️ Housekeeping worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running housekeeping jobs");
            match incidents.retry_failed_dispatches().await {
                Ok(legs) if legs.is_empty() => trace!("🕰️ No deduction legs to retry"),
                Ok(legs) => {
                    let recovered = legs.iter().filter(|l| l.dispatch_status == DispatchStatus::Dispatched).count();
                    info!("🕰️ Retried {} deduction leg(s). {recovered} dispatched", legs.len());
                    debug!("🕰️ Retried legs: {}", leg_list(&legs));
                },
                Err(e) => error!("🕰️ Error retrying failed deduction legs: {e}"),
            }
            match orders.hide_settled_orders(hide_settled_after).await {
                Ok(hidden) if hidden.is_empty() => trace!("🕰️ No settled orders to hide"),
                Ok(hidden) => {
                    let ids = hidden.iter().map(|o| format!("#{}", o.id)).collect::<Vec<String>>().join(", ");
                    info!("🕰️ {} settled order(s) hidden: {ids}", hidden.len());
                },
                Err(e) => error!("🕰️ Error hiding settled orders: {e}"),
            }
        }
    })
}

fn leg_list(legs: &[DeductionLeg]) -> String {
    legs.iter()
        .map(|l| format!("[{}] incident: {} {} {} ({})", l.id, l.incident_id, l.leg, l.amount, l.dispatch_status))
        .collect::<Vec<String>>()
        .join(", ")
}
