use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use haul_engine::{
    events::EventProducers,
    CommissionApi,
    CommissionManagement,
    IncidentApi,
    IncidentManagement,
    LifecycleDatabase,
    MatchingApi,
    OrderFlowApi,
    PaymentGateway,
    SettlementApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    auth::TokenValidator,
    config::ServerConfig,
    errors::ServerError,
    integrations::{notifications::create_notification_handlers, payment_provider::SandboxPaymentProvider},
    middleware::JwtAuthMiddlewareFactory,
    routes::{
        health,
        AcceptApplicationRoute,
        AddPolicyRoute,
        ApplicationsForOrderRoute,
        ApplyRoute,
        AssignTeamRoute,
        ChangeIncidentStatusRoute,
        CheckInRoute,
        CommentOnIncidentRoute,
        ConfirmDeductionRoute,
        ConfirmDepositRoute,
        ConfirmScheduleRoute,
        CreateOrderRoute,
        DeclineApplicationRoute,
        FinalizeSettlementRoute,
        ForceProcessRoute,
        HelperResponseRoute,
        IncidentActionsRoute,
        IncidentByIdRoute,
        IncidentDeadlineRoute,
        IncidentsForOrderRoute,
        MyApplicationsRoute,
        MyOrdersRoute,
        OpenOrdersRoute,
        OrderByIdRoute,
        PoliciesRoute,
        PreviewCommissionRoute,
        RecordApprovalRoute,
        ReplyToIncidentRoute,
        RequestDepositRoute,
        RequestEvidenceRoute,
        SettlementStatementRoute,
        SubmitClosingRoute,
        SubmitIncidentRoute,
        WhoamiRoute,
    },
    worker::start_housekeeping_worker,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not run migrations. {e}")))?;
    let gateway = SandboxPaymentProvider::new();
    let handlers = create_notification_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _worker = start_housekeeping_worker(
        db.clone(),
        gateway.clone(),
        producers.clone(),
        config.worker_interval,
        config.hide_settled_after,
    );
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: SandboxPaymentProvider,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let log_format = if config.use_x_forwarded_for {
        "%t (%D ms) %s %{r}a %{Host}i %U"
    } else {
        "%t (%D ms) %s %a %{Host}i %U"
    };
    let validator = TokenValidator::new(&config.auth);
    let response_window = config.helper_response_window;
    let srv = HttpServer::new(move || {
        let db = db.clone();
        let gateway = gateway.clone();
        let producers = producers.clone();
        let api_scope = web::scope("/api")
            .wrap(JwtAuthMiddlewareFactory::new(validator.clone()))
            .configure(register_routes::<SqliteDatabase, SandboxPaymentProvider>);
        App::new()
            .wrap(Logger::new(log_format).log_target("haul::access_log"))
            .configure(move |cfg| configure_apis(cfg, db, gateway, producers, response_window))
            .service(health)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("🚀️ Listening on {}:{}", config.host, config.port);
    Ok(srv)
}

/// Registers one instance of each engine API as app data, all sharing the same backend, payment provider and event
/// producers.
pub fn configure_apis<B, P>(
    cfg: &mut web::ServiceConfig,
    db: B,
    gateway: P,
    producers: EventProducers,
    response_window: chrono::Duration,
) where
    B: LifecycleDatabase + IncidentManagement + CommissionManagement + 'static,
    P: PaymentGateway + 'static,
{
    let orders_api = OrderFlowApi::new(db.clone(), gateway.clone(), producers.clone());
    let matching_api = MatchingApi::new(db.clone(), producers.clone());
    let settlement_api = SettlementApi::new(db.clone(), producers.clone());
    let incident_api = IncidentApi::new(db.clone(), gateway, producers).with_response_window(response_window);
    let commission_api = CommissionApi::new(db);
    cfg.app_data(web::Data::new(orders_api))
        .app_data(web::Data::new(matching_api))
        .app_data(web::Data::new(settlement_api))
        .app_data(web::Data::new(incident_api))
        .app_data(web::Data::new(commission_api));
}

/// Registers every authenticated route. `/orders/open` and `/orders/mine` must come before `/orders/{id}`.
pub fn register_routes<B, P>(cfg: &mut web::ServiceConfig)
where
    B: LifecycleDatabase + IncidentManagement + CommissionManagement + 'static,
    P: PaymentGateway + 'static,
{
    cfg.service(WhoamiRoute::new())
        // Orders
        .service(CreateOrderRoute::<B, P>::new())
        .service(OpenOrdersRoute::<B, P>::new())
        .service(MyOrdersRoute::<B, P>::new())
        .service(OrderByIdRoute::<B, P>::new())
        .service(RequestDepositRoute::<B, P>::new())
        .service(ConfirmDepositRoute::<B, P>::new())
        .service(RecordApprovalRoute::<B, P>::new())
        // Applications
        .service(ApplyRoute::<B>::new())
        .service(ApplicationsForOrderRoute::<B, P>::new())
        .service(MyApplicationsRoute::<B, P>::new())
        .service(AcceptApplicationRoute::<B>::new())
        .service(DeclineApplicationRoute::<B>::new())
        .service(ConfirmScheduleRoute::<B, P>::new())
        .service(CheckInRoute::<B, P>::new())
        .service(SubmitClosingRoute::<B, P>::new())
        // Settlement
        .service(SettlementStatementRoute::<B>::new())
        .service(FinalizeSettlementRoute::<B>::new())
        // Incidents
        .service(SubmitIncidentRoute::<B, P>::new())
        .service(IncidentsForOrderRoute::<B, P>::new())
        .service(IncidentByIdRoute::<B, P>::new())
        .service(IncidentActionsRoute::<B, P>::new())
        .service(IncidentDeadlineRoute::<B, P>::new())
        .service(ReplyToIncidentRoute::<B, P>::new())
        .service(CommentOnIncidentRoute::<B, P>::new())
        .service(RequestEvidenceRoute::<B, P>::new())
        .service(ChangeIncidentStatusRoute::<B, P>::new())
        .service(HelperResponseRoute::<B, P>::new())
        .service(ConfirmDeductionRoute::<B, P>::new())
        .service(ForceProcessRoute::<B, P>::new())
        // Commission
        .service(AddPolicyRoute::<B>::new())
        .service(PoliciesRoute::<B>::new())
        .service(AssignTeamRoute::<B>::new())
        .service(PreviewCommissionRoute::<B>::new());
}
