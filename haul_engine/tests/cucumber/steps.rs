use std::time::Duration;

use cucumber::{given, then, when};
use haul_common::Won;
use haul_engine::{
    db_types::{
        Actor,
        ApplicationStatus,
        DeductionMethod,
        IncidentStatus,
        IncidentType,
        NewClosingReport,
        NewIncident,
        NewOrder,
        OrderStatusType,
    },
    test_utils::{market::ADMIN, payment_gateway::PaymentCall},
    IncidentApi,
    OrderManagement,
};

use crate::cucumber::MarketWorld;

#[given(expr = "requester {int} has an open order for {int} helper(s) at {int} per box")]
async fn open_order(world: &mut MarketWorld, requester_id: i64, max_helpers: i64, price: i64) {
    let order = NewOrder::new("Seongsu warehouse run", Won::from(price), max_helpers).with_deposit(Won::from(20_000));
    let order = world.market().open_order(requester_id, order).await;
    world.order = Some(order);
}

#[given(expr = "helper {int} has completed the order with {int} delivered and {int} returned boxes")]
async fn completed_order(world: &mut MarketWorld, helper_id: i64, delivered: i64, returned: i64) {
    let order = world.order.clone().expect("No order in this scenario");
    let report = NewClosingReport::new(delivered, returned);
    let (order, application) = world.market().closed_order(&order, helper_id, report).await;
    world.order = Some(order);
    world.applications.insert(helper_id, application);
}

#[given(expr = "requester {int} has reported a {string} incident")]
async fn report_incident(world: &mut MarketWorld, requester_id: i64, incident_type: IncidentType) {
    let incident = NewIncident::new(incident_type, "Reported at drop-off").requiring_helper_response();
    let order_id = world.order_id();
    let incident = world.market().incidents.submit(&Actor::requester(requester_id), order_id, incident).await;
    world.incident = Some(incident.expect("Error reporting incident"));
}

#[given(expr = "helpers have {int}ms to respond to incidents")]
async fn response_window(world: &mut MarketWorld, ms: i64) {
    let market = world.market_mut();
    let api = IncidentApi::new(market.db.clone(), market.gateway.clone(), Default::default());
    market.incidents = api.with_response_window(chrono::Duration::milliseconds(ms));
}

#[when(expr = "helper {int} applies to the order")]
async fn apply(world: &mut MarketWorld, helper_id: i64) {
    apply_with_note(world, helper_id, None).await;
}

#[when(expr = "helper {int} applies to the order with the note {string}")]
async fn apply_noted(world: &mut MarketWorld, helper_id: i64, note: String) {
    apply_with_note(world, helper_id, Some(note)).await;
}

async fn apply_with_note(world: &mut MarketWorld, helper_id: i64, note: Option<String>) {
    let order_id = world.order_id();
    let result = world.market().matching.apply(&Actor::helper(helper_id), order_id, note).await;
    if let Some(application) = world.record(result) {
        world.applications.insert(helper_id, application);
    }
}

#[when(expr = "requester {int} accepts the application from helper {int}")]
async fn accept(world: &mut MarketWorld, requester_id: i64, helper_id: i64) {
    let application_id = world.application_for(helper_id).id;
    let result = world.market().matching.accept(&Actor::requester(requester_id), application_id).await;
    if let Some(outcome) = world.record(result) {
        world.order = Some(outcome.order);
        world.applications.insert(helper_id, outcome.application);
    }
}

#[when(expr = "the admin confirms a deduction of {int} {string} for {string}")]
async fn confirm_deduction(world: &mut MarketWorld, amount: i64, method: DeductionMethod, reason: String) {
    let incident_id = world.incident_id();
    let result =
        world.market().incidents.confirm_deduction(&ADMIN, incident_id, Won::from(amount), &reason, method).await;
    if let Some(outcome) = world.record(result) {
        world.incident = Some(outcome.incident);
        world.order = Some(outcome.order);
    }
}

#[when(expr = "the admin force-processes the incident for {string} with a deduction of {int}")]
async fn force_with_deduction(world: &mut MarketWorld, reason: String, amount: i64) {
    force(world, reason, Some(Won::from(amount))).await;
}

#[when(expr = "the admin force-processes the incident for {string}")]
async fn force_without_deduction(world: &mut MarketWorld, reason: String) {
    force(world, reason, None).await;
}

async fn force(world: &mut MarketWorld, reason: String, amount: Option<Won>) {
    let incident_id = world.incident_id();
    let result = world.market().incidents.force_process(&ADMIN, incident_id, &reason, amount, None).await;
    if let Some(outcome) = world.record(result) {
        world.incident = Some(outcome.incident);
        world.order = Some(outcome.order);
    }
}

#[when(expr = "the admin finalizes the settlement")]
async fn finalize(world: &mut MarketWorld) {
    let order_id = world.order_id();
    let result = world.market().settlement.finalize_settlement(&ADMIN, order_id).await;
    if let Some(outcome) = world.record(result) {
        world.order = Some(outcome.order);
    }
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut MarketWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[then(expr = "the last call failed with {string}")]
async fn last_call_failed(world: &mut MarketWorld, reason: String) {
    let error = world.last_error.as_ref().expect("The last call succeeded");
    assert_eq!(error.reason(), reason, "Unexpected error: {error}");
}

#[then(expr = "the application from helper {int} is {string}")]
async fn application_status(world: &mut MarketWorld, helper_id: i64, status: ApplicationStatus) {
    let id = world.application_for(helper_id).id;
    let application = world.market().db.fetch_application(id).await.unwrap().expect("Application is missing");
    assert_eq!(application.status, status);
}

#[then(expr = "the order has {int} helper(s)")]
async fn order_helpers(world: &mut MarketWorld, count: i64) {
    let order = world.market().db.fetch_order(world.order_id()).await.unwrap().expect("Order is missing");
    assert_eq!(order.current_helpers, count);
    assert!(order.current_helpers <= order.max_helpers);
}

#[then(expr = "the order is {string}")]
async fn order_status(world: &mut MarketWorld, status: OrderStatusType) {
    let order = world.market().db.fetch_order(world.order_id()).await.unwrap().expect("Order is missing");
    assert_eq!(order.status, status);
}

#[then(expr = "helper {int} has {int} application(s) with the note {string}")]
async fn helper_applications(world: &mut MarketWorld, helper_id: i64, count: usize, note: String) {
    let applications = world.market().db.fetch_applications_for_helper(helper_id).await.unwrap();
    assert_eq!(applications.len(), count);
    assert!(applications.iter().all(|a| a.note.as_deref() == Some(note.as_str())));
}

#[then(expr = "the closing report shows supply {int}, VAT {int} and total {int}")]
async fn closing_figures(world: &mut MarketWorld, supply: i64, vat: i64, total: i64) {
    let report = world.market().db.fetch_closing_report(world.order_id()).await.unwrap().expect("No closing report");
    assert_eq!(report.supply_amount, Won::from(supply));
    assert_eq!(report.vat_amount, Won::from(vat));
    assert_eq!(report.total_amount, Won::from(total));
}

#[then(expr = "the settlement statement pays helper {int} a net of {int}")]
async fn statement_net(world: &mut MarketWorld, helper_id: i64, net: i64) {
    let order_id = world.order_id();
    let statement = world.market().settlement.statement(&Actor::helper(helper_id), order_id).await.unwrap();
    assert_eq!(statement.final_helper_payout, Won::from(net));
}

#[then(expr = "the incident is {string}")]
async fn incident_status(world: &mut MarketWorld, status: IncidentStatus) {
    let incident = world.market().incidents.incident(&ADMIN, world.incident_id()).await.unwrap();
    assert_eq!(incident.status, status);
}

#[then("the incident was force-processed")]
async fn incident_forced(world: &mut MarketWorld) {
    let incident = world.market().incidents.incident(&ADMIN, world.incident_id()).await.unwrap();
    assert!(incident.admin_force_processed);
    assert!(incident.admin_force_processed_at.is_some());
    assert!(incident.admin_force_reason.is_some());
}

#[then("the helper response deadline has passed")]
async fn deadline_passed(world: &mut MarketWorld) {
    let passed = world.market().incidents.is_deadline_passed(&ADMIN, world.incident_id()).await.unwrap();
    assert!(passed);
}

#[then(expr = "the payment provider debited helper {int} by {int}")]
async fn helper_debited(world: &mut MarketWorld, helper_id: i64, amount: i64) {
    let order_id = world.order_id();
    let expected = PaymentCall::DebitHelper { helper_id, order_id, amount: Won::from(amount) };
    assert!(world.market().gateway.debits().contains(&expected), "No debit of {amount} for helper {helper_id}");
}

#[then(expr = "the payment provider refunded {int} to the requester")]
async fn requester_refunded(world: &mut MarketWorld, amount: i64) {
    let refunds = world.market().gateway.refunds();
    let refunded = refunds.iter().any(|c| matches!(c, PaymentCall::Cancel { amount: a, .. } if *a == Won::from(amount)));
    assert!(refunded, "No refund of {amount}");
}

#[then(expr = "the payment provider received {int} debit(s) and {int} refund(s)")]
async fn provider_calls(world: &mut MarketWorld, debits: usize, refunds: usize) {
    let gateway = &world.market().gateway;
    assert_eq!(gateway.debits().len(), debits);
    assert_eq!(gateway.refunds().len(), refunds);
}

#[then(expr = "the settlement statement shows a final helper payout of {int} and refunds of {int}")]
async fn statement_after_deductions(world: &mut MarketWorld, payout: i64, refunds: i64) {
    let order_id = world.order_id();
    let statement = world.market().settlement.statement(&ADMIN, order_id).await.unwrap();
    assert_eq!(statement.final_helper_payout, Won::from(payout));
    assert_eq!(statement.requester_refunds, Won::from(refunds));
}

