use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::FutureExt;
use haul_common::Won;
use haul_engine::{
    db_types::{Actor, DeductionMethod, IncidentType, NewClosingReport, NewIncident, OrderStatusType},
    events::{EventHandlers, EventHooks},
    test_utils::market::{TestMarket, ADMIN},
};
use log::*;

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI64>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> i64 {
        self.called.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn hooks_fire_after_each_committed_transition() {
    let matched = HookCalled::default();
    let status_changes = HookCalled::default();
    let resolved = HookCalled::default();
    let dispatch_failures = HookCalled::default();
    let settled = HookCalled::default();

    let mut hooks = EventHooks::default();
    let (m, s, r, d, st) =
        (matched.clone(), status_changes.clone(), resolved.clone(), dispatch_failures.clone(), settled.clone());
    hooks
        .on_order_matched(move |ev| {
            info!("🪝️ Order #{} matched to helper #{}", ev.order.id, ev.application.helper_id);
            m.called();
            async {}.boxed()
        })
        .on_order_status_changed(move |ev| {
            trace!("🪝️ Order #{} {} -> {}", ev.order.id, ev.old_status, ev.order.status);
            s.called();
            if ev.order.status == OrderStatusType::Settled {
                st.called();
            }
            async {}.boxed()
        })
        .on_incident_resolved(move |ev| {
            assert_eq!(ev.legs.len(), 2);
            r.called();
            async {}.boxed()
        })
        .on_dispatch_failed(move |ev| {
            warn!("🪝️ Leg #{} failed: {}", ev.leg.id, ev.reason);
            d.called();
            async {}.boxed()
        });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let market = TestMarket::with_producers(producers).await;
    let order = market.open_order(10, TestMarket::standard_order()).await;
    let (order, _) = market.closed_order(&order, 20, NewClosingReport::new(10, 2)).await;
    let incident = NewIncident::new(IncidentType::Misdelivery, "Left at the wrong dock");
    let incident = market.incidents.submit(&Actor::requester(10), order.id, incident).await.unwrap();
    market.gateway.set_failing(true);
    market
        .incidents
        .confirm_deduction(&ADMIN, incident.id, Won::from(7_000), "wrong dock", DeductionMethod::Both)
        .await
        .unwrap();
    market.settlement.finalize_settlement(&ADMIN, order.id).await.unwrap();
    market.tear_down().await;
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(matched.count(), 1);
    // registered, matching, scheduled, in_progress, closing_submitted, dispute_requested, dispute_resolved, settled
    assert_eq!(status_changes.count(), 8);
    assert_eq!(settled.count(), 1);
    assert_eq!(resolved.count(), 1);
    assert_eq!(dispatch_failures.count(), 2);
}
