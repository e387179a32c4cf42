use actix_web::{
    http::{header::AUTHORIZATION, StatusCode},
    test,
    test::TestRequest,
    web,
    App,
};
use chrono::Duration;
use haul_engine::{
    db_types::Actor,
    events::EventProducers,
    test_utils::{market::TestMarket, payment_gateway::RecordingPaymentGateway},
    SqliteDatabase,
};
use log::debug;
use serde::Serialize;

use crate::{
    auth::{TokenIssuer, TokenValidator},
    config::AuthConfig,
    middleware::JwtAuthMiddlewareFactory,
    routes::health,
    server::{configure_apis, register_routes},
};

// A fixed secret for endpoint tests. DO NOT re-use it anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new("endpoint-tests-only-0d9f3c27a1b84e65")
}

pub fn issue_token(actor: Actor) -> String {
    TokenIssuer::new(&get_auth_config()).issue_token(actor, Duration::hours(1)).expect("Failed to sign token")
}

pub fn issue_token_valid_for(actor: Actor, valid_for: Duration) -> String {
    TokenIssuer::new(&get_auth_config()).issue_token(actor, valid_for).expect("Failed to sign token")
}

pub async fn get_request(market: &TestMarket, token: &str, path: &str) -> (StatusCode, String) {
    send(market, with_token(TestRequest::get().uri(path), token)).await
}

pub async fn post_request<T: Serialize>(
    market: &TestMarket,
    token: &str,
    path: &str,
    body: Option<&T>,
) -> (StatusCode, String) {
    let mut req = with_token(TestRequest::post().uri(path), token);
    if let Some(body) = body {
        req = req.set_json(body);
    }
    send(market, req).await
}

fn with_token(req: TestRequest, token: &str) -> TestRequest {
    if token.is_empty() {
        req
    } else {
        req.insert_header((AUTHORIZATION, format!("Bearer {token}")))
    }
}

/// Runs the request through the full app against the market's database. Middleware rejections surface as errors from
/// the test service, so they are rendered the same way the server would render them.
async fn send(market: &TestMarket, req: TestRequest) -> (StatusCode, String) {
    let db = market.db.clone();
    let gateway = market.gateway.clone();
    let validator = TokenValidator::new(&get_auth_config());
    let app = App::new()
        .configure(move |cfg| configure_apis(cfg, db, gateway, EventProducers::default(), Duration::hours(48)))
        .service(health)
        .service(
            web::scope("/api")
                .wrap(JwtAuthMiddlewareFactory::new(validator))
                .configure(register_routes::<SqliteDatabase, RecordingPaymentGateway>),
        );
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = actix_web::body::to_bytes(res.into_body()).await.map(|b| b.to_vec()).unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn reason_of(body: &str) -> String {
    let value: serde_json::Value = serde_json::from_str(body).expect("Error body is not JSON");
    value["reason"].as_str().unwrap_or_default().to_string()
}
