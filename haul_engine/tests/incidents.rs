use chrono::{Duration, Utc};
use haul_common::Won;
use haul_engine::{
    db_types::{
        Actor,
        DeductionMethod,
        DispatchStatus,
        HelperStatus,
        IncidentActionType,
        IncidentStatus,
        IncidentType,
        LegKind,
        NewClosingReport,
        NewIncident,
        Order,
        OrderStatusType,
    },
    events::EventProducers,
    test_utils::market::{TestMarket, ADMIN},
    traits::DeductionCommand,
    ErrorKind,
    IncidentApi,
    IncidentManagement,
    LifecycleError,
    OrderManagement,
};

const REQUESTER: Actor = Actor::requester(10);
const HELPER: Actor = Actor::helper(20);

async fn closed_market() -> (TestMarket, Order) {
    let market = TestMarket::new().await;
    let order = market.open_order(10, TestMarket::standard_order()).await;
    let (order, _) = market.closed_order(&order, 20, NewClosingReport::new(10, 2)).await;
    (market, order)
}

fn damage() -> NewIncident {
    NewIncident::new(IncidentType::Damage, "Two boxes crushed").with_requested_amount(Won::from(50_000))
}

#[tokio::test]
async fn incidents_need_a_closed_order() {
    let market = TestMarket::new().await;
    let order = market.open_order(10, TestMarket::standard_order()).await;
    let err = market.incidents.submit(&REQUESTER, order.id, damage()).await.unwrap_err();
    assert_eq!(err.reason(), "invalid_transition");
    market.tear_down().await;
}

#[tokio::test]
async fn concurrent_confirmations_dispatch_once() {
    let (market, order) = closed_market().await;
    let incident = market.incidents.submit(&REQUESTER, order.id, damage()).await.unwrap();
    let reason = "crushed boxes";
    let (a, b) = tokio::join!(
        market.incidents.confirm_deduction(&ADMIN, incident.id, Won::from(50_000), reason, DeductionMethod::Both),
        market.incidents.confirm_deduction(&REQUESTER, incident.id, Won::from(50_000), reason, DeductionMethod::Both),
    );
    let (winner, loser) = match (a, b) {
        (Ok(outcome), Err(e)) | (Err(e), Ok(outcome)) => (outcome, e),
        (a, b) => panic!("Expected exactly one winner, got {a:?} and {b:?}"),
    };
    assert_eq!(loser, LifecycleError::AlreadyResolved(incident.id));
    assert_eq!(winner.legs.len(), 2);
    assert!(winner.legs.iter().all(|l| l.amount == Won::from(50_000)));
    assert!(winner.legs.iter().all(|l| l.dispatch_status == DispatchStatus::Dispatched));
    assert_eq!(market.gateway.debits().len(), 1);
    assert_eq!(market.gateway.refunds().len(), 1);
    let legs = market.db.fetch_deduction_legs_for_incident(incident.id).await.unwrap();
    assert_eq!(legs.len(), 2);
    market.tear_down().await;
}

#[tokio::test]
async fn confirmation_and_forced_processing_resolve_once() {
    let (market, order) = closed_market().await;
    let incident = market.incidents.submit(&REQUESTER, order.id, damage()).await.unwrap();
    let amount = Won::from(50_000);
    let (confirmed, forced) = tokio::join!(
        market.incidents.confirm_deduction(&REQUESTER, incident.id, amount, "crushed boxes", DeductionMethod::Both),
        market.incidents.force_process(&ADMIN, incident.id, "no answer", Some(amount), Some(DeductionMethod::Both)),
    );
    let (winner, loser, expected_action) = match (confirmed, forced) {
        (Ok(outcome), Err(e)) => (outcome, e, IncidentActionType::DeductionConfirmed),
        (Err(e), Ok(outcome)) => (outcome, e, IncidentActionType::ForceProcessed),
        (a, b) => panic!("Expected exactly one winner, got {a:?} and {b:?}"),
    };
    assert_eq!(loser, LifecycleError::AlreadyResolved(incident.id));
    assert_eq!(winner.incident.status, IncidentStatus::Resolved);
    assert_eq!(winner.legs.len(), 2);
    assert_eq!(market.gateway.debits().len(), 1);
    assert_eq!(market.gateway.refunds().len(), 1);
    let legs = market.db.fetch_deduction_legs_for_incident(incident.id).await.unwrap();
    assert_eq!(legs.len(), 2);
    let actions = market.incidents.actions(&ADMIN, incident.id).await.unwrap();
    let decisions = actions
        .iter()
        .filter(|a| matches!(a.action_type, IncidentActionType::DeductionConfirmed | IncidentActionType::ForceProcessed))
        .map(|a| a.action_type)
        .collect::<Vec<_>>();
    assert_eq!(decisions, vec![expected_action]);
    market.tear_down().await;
}

#[tokio::test]
async fn stalled_pending_legs_are_dispatched_again() {
    let (market, order) = closed_market().await;
    let incident = market.incidents.submit(&REQUESTER, order.id, damage()).await.unwrap();
    // The decision commits, but nothing reaches the payment provider
    let command = DeductionCommand {
        incident_id: incident.id,
        actor_id: ADMIN.id,
        deduction: Some((Won::from(5_000), DeductionMethod::Both)),
        reason: "crushed boxes".to_string(),
        forced: false,
        decided_at: Utc::now(),
    };
    let outcome = market.db.finalize_deduction(command).await.unwrap();
    assert!(outcome.legs.iter().all(|l| l.dispatch_status == DispatchStatus::Pending));

    // Too recent to be considered lost
    assert!(market.incidents.retry_failed_dispatches().await.unwrap().is_empty());
    assert!(market.gateway.debits().is_empty());

    let incidents = IncidentApi::new(market.db.clone(), market.gateway.clone(), EventProducers::default())
        .with_stalled_dispatch_after(Duration::zero());
    let retried = incidents.retry_failed_dispatches().await.unwrap();
    assert_eq!(retried.len(), 2);
    assert!(retried.iter().all(|l| l.dispatch_status == DispatchStatus::Dispatched && l.attempts == 1));
    assert_eq!(market.gateway.debits().len(), 1);
    assert_eq!(market.gateway.refunds().len(), 1);
    assert!(incidents.retry_failed_dispatches().await.unwrap().is_empty());
    let legs = market.db.fetch_deduction_legs_for_incident(incident.id).await.unwrap();
    assert!(legs.iter().all(|l| l.dispatch_status == DispatchStatus::Dispatched));
    market.tear_down().await;
}

#[tokio::test]
async fn failed_dispatches_keep_the_decision_and_are_retried() {
    let (market, order) = closed_market().await;
    let incident = market.incidents.submit(&REQUESTER, order.id, damage()).await.unwrap();
    market.gateway.set_failing(true);
    let outcome = market
        .incidents
        .confirm_deduction(&ADMIN, incident.id, Won::from(40_000), "crushed boxes", DeductionMethod::Both)
        .await
        .unwrap();
    assert_eq!(outcome.incident.status, IncidentStatus::Resolved);
    assert!(outcome.legs.iter().all(|l| l.dispatch_status == DispatchStatus::Failed));
    assert!(outcome.legs.iter().all(|l| l.failure_reason.is_some()));
    assert_eq!(market.db.fetch_undispatched_legs().await.unwrap().len(), 2);

    // Still failing: the legs stay failed and count another attempt
    let retried = market.incidents.retry_failed_dispatches().await.unwrap();
    assert_eq!(retried.len(), 2);
    assert!(retried.iter().all(|l| l.dispatch_status == DispatchStatus::Failed && l.attempts == 2));

    market.gateway.set_failing(false);
    let retried = market.incidents.retry_failed_dispatches().await.unwrap();
    assert_eq!(retried.len(), 2);
    assert!(retried.iter().all(|l| l.dispatch_status == DispatchStatus::Dispatched && l.payment_id.is_some()));
    assert!(market.incidents.retry_failed_dispatches().await.unwrap().is_empty());

    let incident = market.incidents.incident(&ADMIN, incident.id).await.unwrap();
    assert_eq!(incident.status, IncidentStatus::Resolved);
    assert_eq!(incident.deduction_amount, Some(Won::from(40_000)));
    assert_eq!(incident.deduction_method, Some(DeductionMethod::Both));
    market.tear_down().await;
}

#[tokio::test]
async fn helper_response_blocks_forced_processing() {
    let (market, order) = closed_market().await;
    let incident = market.incidents.submit(&REQUESTER, order.id, damage().requiring_helper_response()).await.unwrap();
    assert!(incident.helper_response_required);
    assert!(incident.helper_response_deadline.is_some());
    assert!(!market.incidents.is_deadline_passed(&HELPER, incident.id).await.unwrap());

    let err = market.incidents.respond_as_helper(&Actor::helper(21), incident.id, HelperStatus::Confirmed, None).await;
    assert_eq!(err.unwrap_err().kind(), ErrorKind::Authorization);
    let note = Some("Found it in the van".to_string());
    let responded = market.incidents.respond_as_helper(&HELPER, incident.id, HelperStatus::ItemFound, note).await.unwrap();
    assert_eq!(responded.helper_status, Some(HelperStatus::ItemFound));
    assert!(responded.helper_responded_at.is_some());
    let err = market.incidents.respond_as_helper(&HELPER, incident.id, HelperStatus::Confirmed, None).await.unwrap_err();
    assert_eq!(err, LifecycleError::HelperAlreadyResponded(incident.id));

    let err = market.incidents.force_process(&ADMIN, incident.id, "no answer", None, None).await.unwrap_err();
    assert_eq!(err, LifecycleError::HelperAlreadyResponded(incident.id));
    // an ordinary decision is still possible
    market.incidents.change_status(&ADMIN, incident.id, IncidentStatus::Rejected, None).await.unwrap();
    let order = market.db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::DisputeRejected);
    market.tear_down().await;
}

#[tokio::test]
async fn force_process_without_deduction_resolves_with_no_legs() {
    let (market, order) = closed_market().await;
    let incident = market.incidents.submit(&REQUESTER, order.id, damage()).await.unwrap();
    let err = market
        .incidents
        .force_process(&ADMIN, incident.id, "no answer", None, Some(DeductionMethod::Both))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = market.incidents.force_process(&REQUESTER, incident.id, "no answer", None, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    let outcome = market.incidents.force_process(&ADMIN, incident.id, "no answer", None, None).await.unwrap();
    assert!(outcome.legs.is_empty());
    assert!(outcome.incident.admin_force_processed);
    assert_eq!(outcome.incident.admin_force_reason.as_deref(), Some("no answer"));
    assert_eq!(outcome.incident.status, IncidentStatus::Resolved);
    assert!(market.gateway.debits().is_empty());
    let actions = market.incidents.actions(&ADMIN, incident.id).await.unwrap();
    assert_eq!(actions.last().map(|a| a.action_type), Some(IncidentActionType::ForceProcessed));
    market.tear_down().await;
}

#[tokio::test]
async fn the_audit_trail_records_every_step() {
    let (market, order) = closed_market().await;
    let incident = market.incidents.submit(&REQUESTER, order.id, damage()).await.unwrap();
    market.incidents.reply(&ADMIN, incident.id, "We are looking into it").await.unwrap();
    market.incidents.request_evidence(&ADMIN, incident.id, "Please upload photos").await.unwrap();
    market.incidents.comment(&REQUESTER, incident.id, "Uploaded").await.unwrap();
    market.incidents.comment(&HELPER, incident.id, "They were fine at drop-off").await.unwrap();
    let err = market.incidents.comment(&Actor::helper(99), incident.id, "hi").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    market.incidents.change_status(&ADMIN, incident.id, IncidentStatus::Reviewing, None).await.unwrap();
    let order_now = market.db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order_now.status, OrderStatusType::DisputeReviewing);
    let err = market
        .incidents
        .change_status(&ADMIN, incident.id, IncidentStatus::Submitted, None)
        .await
        .unwrap_err();
    assert_eq!(err.reason(), "invalid_transition");
    market
        .incidents
        .confirm_deduction(&ADMIN, incident.id, Won::from(10_000), "one box", DeductionMethod::RequesterRefund)
        .await
        .unwrap();

    let actions = market.incidents.actions(&REQUESTER, incident.id).await.unwrap();
    let kinds = actions.iter().map(|a| a.action_type).collect::<Vec<_>>();
    assert_eq!(kinds, vec![
        IncidentActionType::Reply,
        IncidentActionType::EvidenceRequest,
        IncidentActionType::Comment,
        IncidentActionType::Comment,
        IncidentActionType::StatusChange,
        IncidentActionType::DeductionConfirmed,
    ]);
    let incident = market.incidents.incident(&ADMIN, incident.id).await.unwrap();
    assert_eq!(incident.admin_reply.as_deref(), Some("We are looking into it"));
    let legs = market.db.fetch_deduction_legs_for_incident(incident.id).await.unwrap();
    assert_eq!(legs.len(), 1);
    assert_eq!(legs[0].leg, LegKind::RequesterRefund);
    market.tear_down().await;
}

#[tokio::test]
async fn dispute_status_follows_every_incident() {
    let (market, order) = closed_market().await;
    let first = market.incidents.submit(&REQUESTER, order.id, damage()).await.unwrap();
    let second = NewIncident::new(IncidentType::Delay, "Arrived two hours late");
    let second = market.incidents.submit(&REQUESTER, order.id, second).await.unwrap();
    market.incidents.change_status(&ADMIN, first.id, IncidentStatus::Rejected, None).await.unwrap();
    let status = market.db.fetch_order(order.id).await.unwrap().unwrap().status;
    assert_eq!(status, OrderStatusType::DisputeRequested);
    market
        .incidents
        .confirm_deduction(&ADMIN, second.id, Won::from(3_000), "late", DeductionMethod::HelperDeduct)
        .await
        .unwrap();
    let status = market.db.fetch_order(order.id).await.unwrap().unwrap().status;
    assert_eq!(status, OrderStatusType::DisputeResolved);
    let listed = market.incidents.incidents_for_order(&HELPER, order.id).await.unwrap();
    assert_eq!(listed.len(), 2);

    let outcome = market.settlement.finalize_settlement(&REQUESTER, order.id).await.unwrap();
    assert_eq!(outcome.order.status, OrderStatusType::Settled);
    assert_eq!(outcome.applied_incidents.len(), 1);
    assert_eq!(outcome.applied_incidents[0].id, second.id);
    let first = market.incidents.incident(&ADMIN, first.id).await.unwrap();
    assert_eq!(first.status, IncidentStatus::Rejected);
    let statement = market.settlement.statement(&HELPER, order.id).await.unwrap();
    assert_eq!(statement.helper_deductions, Won::from(3_000));
    assert_eq!(statement.final_helper_payout, Won::from(14_820));
    market.tear_down().await;
}
