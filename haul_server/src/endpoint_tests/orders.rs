use actix_web::http::StatusCode;
use haul_common::Won;
use haul_engine::{
    db_types::{Actor, Application, ApplicationStatus, NewClosingReport, Order, OrderStatusType},
    helpers::SettlementStatement,
    test_utils::market::TestMarket,
    traits::{MatchOutcome, SettlementOutcome},
};

use super::helpers::{get_request, issue_token, post_request, reason_of};
use crate::data_objects::{CreateOrderRequest, DepositResponse};

const REQUESTER: Actor = Actor::requester(10);
const HELPER: Actor = Actor::helper(20);

const NO_BODY: Option<&()> = None;

#[actix_web::test]
async fn requesters_post_and_fund_orders() {
    let market = TestMarket::new().await;
    let token = issue_token(REQUESTER);
    let body = CreateOrderRequest { order: TestMarket::standard_order(), requester_id: None };
    let (status, body) = post_request(&market, &token, "/api/orders", Some(&body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.requester_id, 10);
    assert_eq!(order.status, OrderStatusType::AwaitingDeposit);

    let path = format!("/api/orders/{}/deposit", order.id);
    let (status, body) = post_request(&market, &token, &path, NO_BODY).await;
    assert_eq!(status, StatusCode::OK);
    let deposit: DepositResponse = serde_json::from_str(&body).unwrap();
    assert!(deposit.payment.success);
    assert_eq!(deposit.order.deposit_payment_id, deposit.payment.payment_id);

    let path = format!("/api/orders/{}/deposit/confirm", order.id);
    let (status, body) = post_request(&market, &token, &path, NO_BODY).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatusType::Registered);

    let (status, body) = get_request(&market, &token, "/api/orders/mine").await;
    assert_eq!(status, StatusCode::OK);
    let mine: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(mine.len(), 1);
    market.tear_down().await;
}

#[actix_web::test]
async fn other_requesters_cannot_see_an_order() {
    let market = TestMarket::new().await;
    let order = market.open_order(10, TestMarket::standard_order()).await;
    let token = issue_token(Actor::requester(11));
    let (status, body) = get_request(&market, &token, &format!("/api/orders/{}", order.id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(reason_of(&body), "unauthorized");
    market.tear_down().await;
}

#[actix_web::test]
async fn missing_orders_are_not_found() {
    let market = TestMarket::new().await;
    let (status, body) = get_request(&market, &issue_token(REQUESTER), "/api/orders/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(reason_of(&body), "order_not_found");
    market.tear_down().await;
}

#[actix_web::test]
async fn helpers_apply_and_requesters_accept() {
    let market = TestMarket::new().await;
    let order = market.open_order(10, TestMarket::standard_order()).await;
    let helper_token = issue_token(HELPER);

    let (status, body) = get_request(&market, &helper_token, "/api/orders/open").await;
    assert_eq!(status, StatusCode::OK);
    let open: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert!(open.iter().any(|o| o.id == order.id));

    let path = format!("/api/orders/{}/applications", order.id);
    let (status, body) = post_request(&market, &helper_token, &path, NO_BODY).await;
    assert_eq!(status, StatusCode::CREATED);
    let application: Application = serde_json::from_str(&body).unwrap();
    assert_eq!(application.status, ApplicationStatus::Applied);

    let (status, body) = post_request(&market, &helper_token, &path, NO_BODY).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(reason_of(&body), "duplicate_application");

    let path = format!("/api/applications/{}/accept", application.id);
    let (status, body) = post_request(&market, &issue_token(REQUESTER), &path, NO_BODY).await;
    assert_eq!(status, StatusCode::OK);
    let outcome: MatchOutcome = serde_json::from_str(&body).unwrap();
    assert_eq!(outcome.order.status, OrderStatusType::Scheduled);
    assert_eq!(outcome.order.matched_helper_id, Some(20));
    assert!(outcome.application.snapshot().is_some());

    let (status, body) = post_request(&market, &issue_token(REQUESTER), &path, NO_BODY).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(reason_of(&body), "invalid_transition");
    market.tear_down().await;
}

#[actix_web::test]
async fn requesters_cannot_list_open_orders() {
    let market = TestMarket::new().await;
    let (status, _) = get_request(&market, &issue_token(REQUESTER), "/api/orders/open").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    market.tear_down().await;
}

#[actix_web::test]
async fn settlement_statement_and_finalization() {
    let market = TestMarket::new().await;
    let order = market.open_order(10, TestMarket::standard_order()).await;
    let (order, _) = market.closed_order(&order, 20, NewClosingReport::new(10, 2)).await;

    let path = format!("/api/orders/{}/settlement", order.id);
    let (status, body) = get_request(&market, &issue_token(HELPER), &path).await;
    assert_eq!(status, StatusCode::OK);
    let statement: SettlementStatement = serde_json::from_str(&body).unwrap();
    assert_eq!(statement.calculation.total_amount, Won::from(19_800));
    assert_eq!(statement.final_helper_payout, Won::from(17_820));

    let (status, _) = get_request(&market, &issue_token(Actor::helper(21)), &path).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let path = format!("/api/orders/{}/settle", order.id);
    let (status, body) = post_request(&market, &issue_token(REQUESTER), &path, NO_BODY).await;
    assert_eq!(status, StatusCode::OK);
    let outcome: SettlementOutcome = serde_json::from_str(&body).unwrap();
    assert_eq!(outcome.order.status, OrderStatusType::Settled);
    market.tear_down().await;
}
