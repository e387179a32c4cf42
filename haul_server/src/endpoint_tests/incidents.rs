use actix_web::http::StatusCode;
use haul_common::Won;
use haul_engine::{
    db_types::{
        Actor,
        DeductionMethod,
        HelperStatus,
        Incident,
        IncidentStatus,
        IncidentType,
        NewClosingReport,
        NewIncident,
        Order,
    },
    test_utils::market::TestMarket,
    traits::DeductionOutcome,
};

use super::helpers::{get_request, issue_token, post_request, reason_of};
use crate::data_objects::{DeadlineResponse, DeductionRequest, HelperResponseRequest};

const REQUESTER: Actor = Actor::requester(10);
const HELPER: Actor = Actor::helper(20);

async fn closed_market() -> (TestMarket, Order) {
    let market = TestMarket::new().await;
    let order = market.open_order(10, TestMarket::standard_order()).await;
    let (order, _) = market.closed_order(&order, 20, NewClosingReport::new(10, 2)).await;
    (market, order)
}

async fn report_damage(market: &TestMarket, order: &Order) -> Incident {
    let incident = NewIncident::new(IncidentType::Damage, "Two boxes crushed")
        .with_requested_amount(Won::from(5_000))
        .requiring_helper_response();
    let path = format!("/api/orders/{}/incidents", order.id);
    let (status, body) = post_request(market, &issue_token(REQUESTER), &path, Some(&incident)).await;
    assert_eq!(status, StatusCode::CREATED);
    serde_json::from_str(&body).unwrap()
}

#[actix_web::test]
async fn open_incidents_block_settlement() {
    let (market, order) = closed_market().await;
    let incident = report_damage(&market, &order).await;
    assert_eq!(incident.status, IncidentStatus::Submitted);
    assert!(incident.helper_response_deadline.is_some());

    let path = format!("/api/orders/{}/settle", order.id);
    let (status, body) = post_request(&market, &issue_token(REQUESTER), &path, None::<&()>).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(reason_of(&body), "open_incidents");
    market.tear_down().await;
}

#[actix_web::test]
async fn deductions_are_confirmed_once() {
    let (market, order) = closed_market().await;
    let incident = report_damage(&market, &order).await;
    let path = format!("/api/incidents/{}/deduction", incident.id);
    let request = DeductionRequest {
        amount: Won::from(5_000),
        reason: "Crushed boxes".into(),
        method: DeductionMethod::HelperDeduct,
    };
    let (status, body) = post_request(&market, &issue_token(REQUESTER), &path, Some(&request)).await;
    assert_eq!(status, StatusCode::OK);
    let outcome: DeductionOutcome = serde_json::from_str(&body).unwrap();
    assert_eq!(outcome.incident.status, IncidentStatus::Resolved);
    assert_eq!(outcome.legs.len(), 1);

    let (status, body) = post_request(&market, &issue_token(REQUESTER), &path, Some(&request)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(reason_of(&body), "already_resolved");
    assert_eq!(market.gateway.debits().len(), 1);
    market.tear_down().await;
}

#[actix_web::test]
async fn deduction_methods_must_be_spelled_exactly() {
    let (market, order) = closed_market().await;
    let incident = report_damage(&market, &order).await;
    let path = format!("/api/incidents/{}/deduction", incident.id);
    let body = serde_json::json!({ "amount": 5000, "reason": "Crushed boxes", "method": "helperDeduct" });
    let (status, _) = post_request(&market, &issue_token(REQUESTER), &path, Some(&body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(market.gateway.debits().is_empty());
    market.tear_down().await;
}

#[actix_web::test]
async fn the_matched_helper_responds() {
    let (market, order) = closed_market().await;
    let incident = report_damage(&market, &order).await;
    let path = format!("/api/incidents/{}/helper_response", incident.id);
    let note = Some("They were crushed on arrival".to_string());
    let response = HelperResponseRequest { status: HelperStatus::RequestHandling, note };

    let (status, _) = post_request(&market, &issue_token(Actor::helper(21)), &path, Some(&response)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post_request(&market, &issue_token(HELPER), &path, Some(&response)).await;
    assert_eq!(status, StatusCode::OK);
    let incident: Incident = serde_json::from_str(&body).unwrap();
    assert_eq!(incident.helper_status, Some(HelperStatus::RequestHandling));

    let path = format!("/api/incidents/{}/force", incident.id);
    let body = serde_json::json!({ "reason": "No answer" });
    let (status, body) = post_request(&market, &issue_token(Actor::admin(1)), &path, Some(&body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(reason_of(&body), "helper_already_responded");
    market.tear_down().await;
}

#[actix_web::test]
async fn deadlines_are_reported_to_the_parties() {
    let (market, order) = closed_market().await;
    let incident = report_damage(&market, &order).await;
    let path = format!("/api/incidents/{}/deadline", incident.id);
    let (status, body) = get_request(&market, &issue_token(HELPER), &path).await;
    assert_eq!(status, StatusCode::OK);
    let deadline: DeadlineResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(deadline.incident_id, incident.id);
    assert!(!deadline.deadline_passed);

    let (status, _) = get_request(&market, &issue_token(Actor::requester(11)), &path).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    market.tear_down().await;
}

#[actix_web::test]
async fn comments_are_added_to_the_audit_trail() {
    let (market, order) = closed_market().await;
    let incident = report_damage(&market, &order).await;
    let path = format!("/api/incidents/{}/comment", incident.id);
    let body = serde_json::json!({ "body": "Photos attached" });
    let (status, _) = post_request(&market, &issue_token(HELPER), &path, Some(&body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let path = format!("/api/incidents/{}/actions", incident.id);
    let (status, body) = get_request(&market, &issue_token(REQUESTER), &path).await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
    assert!(actions.iter().any(|a| a["action_type"] == "comment" && a["body"] == "Photos attached"));
    market.tear_down().await;
}
