use actix_web::http::StatusCode;
use chrono::Duration;
use haul_engine::{db_types::Actor, test_utils::market::TestMarket};

use super::helpers::{get_request, issue_token, issue_token_valid_for, post_request, reason_of};
use crate::{auth::JwtClaims, data_objects::CreateOrderRequest};

#[actix_web::test]
async fn health_needs_no_token() {
    let market = TestMarket::new().await;
    let (status, body) = get_request(&market, "", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
    market.tear_down().await;
}

#[actix_web::test]
async fn api_calls_without_a_token_are_rejected() {
    let market = TestMarket::new().await;
    let (status, body) = get_request(&market, "", "/api/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(reason_of(&body), "unauthenticated");
    market.tear_down().await;
}

#[actix_web::test]
async fn garbage_tokens_are_bad_requests() {
    let market = TestMarket::new().await;
    let (status, body) = get_request(&market, "not.a.jwt", "/api/me").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reason_of(&body), "unauthenticated");
    market.tear_down().await;
}

#[actix_web::test]
async fn expired_tokens_are_rejected() {
    let market = TestMarket::new().await;
    let token = issue_token_valid_for(Actor::requester(10), Duration::hours(-2));
    let (status, _) = get_request(&market, &token, "/api/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    market.tear_down().await;
}

#[actix_web::test]
async fn tampered_tokens_are_rejected() {
    let market = TestMarket::new().await;
    let mut token = issue_token(Actor::requester(10));
    let n = token.len();
    let replacement = if &token[n - 6..n - 1] == "AAAAA" { "BBBBB" } else { "AAAAA" };
    token.replace_range(n - 6..n - 1, replacement);
    let (status, _) = get_request(&market, &token, "/api/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    market.tear_down().await;
}

#[actix_web::test]
async fn whoami_echoes_the_claims() {
    let market = TestMarket::new().await;
    let token = issue_token(Actor::helper(20));
    let (status, body) = get_request(&market, &token, "/api/me").await;
    assert_eq!(status, StatusCode::OK);
    let claims: JwtClaims = serde_json::from_str(&body).unwrap();
    assert_eq!(claims.actor(), Actor::helper(20));
    market.tear_down().await;
}

#[actix_web::test]
async fn helpers_cannot_post_orders() {
    let market = TestMarket::new().await;
    let token = issue_token(Actor::helper(20));
    let body = CreateOrderRequest { order: TestMarket::standard_order(), requester_id: None };
    let (status, body) = post_request(&market, &token, "/api/orders", Some(&body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(reason_of(&body), "unauthorized");
    market.tear_down().await;
}

#[actix_web::test]
async fn only_admins_may_force_process() {
    let market = TestMarket::new().await;
    let token = issue_token(Actor::requester(10));
    let body = serde_json::json!({ "reason": "No answer from the helper" });
    let (status, _) = post_request(&market, &token, "/api/incidents/1/force", Some(&body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    market.tear_down().await;
}
