//! Request handler definitions
//!
//! Define each route and its handler here. Handlers stay thin: they turn the request into an engine call on behalf of
//! the authenticated actor and serialize the result. Every authorization decision beyond the coarse role check in the
//! route definition is made by the engine.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here is async and all database and payment provider
//! calls are awaited, so workers keep serving other requests while a call is in flight.
use actix_web::{get, web, HttpResponse, Responder};
use haul_engine::{
    db_types::{NewClosingReport, NewCommissionPolicy, NewIncident, Role},
    CommissionApi,
    CommissionManagement,
    IncidentApi,
    IncidentManagement,
    LifecycleDatabase,
    MatchingApi,
    OrderFlowApi,
    PaymentGateway,
    SettlementApi,
};
use log::*;

use crate::{
    auth::JwtClaims,
    data_objects::{
        ApplyRequest,
        ApprovalRequest,
        CheckInResponse,
        ClosingResponse,
        CommentRequest,
        CreateOrderRequest,
        DeadlineResponse,
        DeductionRequest,
        DepositResponse,
        EvidenceRequest,
        ForceProcessRequest,
        HelperResponseRequest,
        ReplyRequest,
        StatusChangeRequest,
        TeamAssignment,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
            impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl <$($param:ident: $bound:ident $(+ $extra:ident)*),+> where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]<$($param),+>(core::marker::PhantomData<fn() -> ($($param,)+)>);}
        paste::paste! { impl<$($param),+> [<$name:camel Route>]<$($param),+> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData)
            }
        }}
        paste::paste! { impl<$($param),+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$($param),+>
        where
            $($param: $bound $(+ $extra)* + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<$($param),+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

route!(whoami => Get "/me" requires [Role::Requester, Role::Helper, Role::Admin]);
/// Echoes the claims of the caller's access token. Handy for checking a token before using it.
pub async fn whoami(claims: JwtClaims) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET whoami for {}", claims.actor());
    Ok(HttpResponse::Ok().json(claims))
}

//----------------------------------------------   Orders  ----------------------------------------------------

route!(create_order => Post "/orders" impl <B: LifecycleDatabase, P: PaymentGateway> where requires [Role::Requester, Role::Admin]);
/// Posts a new order. Requesters post for themselves; admins must name the requester in `requester_id`.
pub async fn create_order<B: LifecycleDatabase, P: PaymentGateway>(
    claims: JwtClaims,
    body: web::Json<CreateOrderRequest>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let actor = claims.actor();
    let CreateOrderRequest { order, requester_id } = body.into_inner();
    let requester_id = requester_id.unwrap_or(actor.id);
    debug!("💻️ POST new order for requester #{requester_id} by {actor}");
    let order = api.create_order(&actor, requester_id, order).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(open_orders => Get "/orders/open" impl <B: LifecycleDatabase, P: PaymentGateway> where requires [Role::Helper, Role::Admin]);
/// Orders that helpers can apply to right now.
pub async fn open_orders<B: LifecycleDatabase, P: PaymentGateway>(
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET open orders");
    let orders = api.open_orders().await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(my_orders => Get "/orders/mine" impl <B: LifecycleDatabase, P: PaymentGateway> where requires [Role::Requester]);
pub async fn my_orders<B: LifecycleDatabase, P: PaymentGateway>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let actor = claims.actor();
    trace!("💻️ GET my orders for {actor}");
    let orders = api.orders_for_requester(&actor, actor.id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{id}" impl <B: LifecycleDatabase, P: PaymentGateway> where requires [Role::Requester, Role::Helper, Role::Admin]);
pub async fn order_by_id<B: LifecycleDatabase, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ GET order #{order_id}");
    let order = api.order(&claims.actor(), order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(request_deposit => Post "/orders/{id}/deposit" impl <B: LifecycleDatabase, P: PaymentGateway> where requires [Role::Requester, Role::Admin]);
pub async fn request_deposit<B: LifecycleDatabase, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST deposit request for order #{order_id}");
    let (order, payment) = api.request_deposit(&claims.actor(), order_id).await?;
    Ok(HttpResponse::Ok().json(DepositResponse { order, payment }))
}

route!(confirm_deposit => Post "/orders/{id}/deposit/confirm" impl <B: LifecycleDatabase, P: PaymentGateway> where requires [Role::Requester, Role::Admin]);
pub async fn confirm_deposit<B: LifecycleDatabase, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST deposit confirmation for order #{order_id}");
    let order = api.confirm_deposit(&claims.actor(), order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(record_approval => Post "/orders/{id}/approval" impl <B: LifecycleDatabase, P: PaymentGateway> where requires [Role::Admin]);
/// The moderation outcome for an order. Only approved orders are shown to helpers.
pub async fn record_approval<B: LifecycleDatabase, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<ApprovalRequest>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let status = body.into_inner().status;
    debug!("💻️ POST approval {status} for order #{order_id}");
    let order = api.record_approval(&claims.actor(), order_id, status).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Applications  ----------------------------------------------------

route!(apply => Post "/orders/{id}/applications" impl <B: LifecycleDatabase + CommissionManagement> where requires [Role::Helper]);
/// Applies to an order as the calling helper.
///
/// Conflicts come back as 409 with a `reason` of `capacity_exceeded`, `duplicate_application` or `order_not_open`.
pub async fn apply<B: LifecycleDatabase + CommissionManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: Option<web::Json<ApplyRequest>>,
    api: web::Data<MatchingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let note = body.map(|b| b.into_inner()).unwrap_or_default().note;
    debug!("💻️ POST application to order #{order_id} by {}", claims.actor());
    let application = api.apply(&claims.actor(), order_id, note).await?;
    Ok(HttpResponse::Created().json(application))
}

route!(applications_for_order => Get "/orders/{id}/applications" impl <B: LifecycleDatabase, P: PaymentGateway> where requires [Role::Requester, Role::Admin]);
pub async fn applications_for_order<B: LifecycleDatabase, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ GET applications for order #{order_id}");
    let applications = api.applications_for_order(&claims.actor(), order_id).await?;
    Ok(HttpResponse::Ok().json(applications))
}

route!(my_applications => Get "/applications/mine" impl <B: LifecycleDatabase, P: PaymentGateway> where requires [Role::Helper]);
pub async fn my_applications<B: LifecycleDatabase, P: PaymentGateway>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET my applications for {}", claims.actor());
    let applications = api.applications_for_helper(&claims.actor()).await?;
    Ok(HttpResponse::Ok().json(applications))
}

route!(accept_application => Post "/applications/{id}/accept" impl <B: LifecycleDatabase + CommissionManagement> where requires [Role::Requester, Role::Admin]);
/// Accepts an application. This is the match: the commission split is frozen and the order is scheduled.
pub async fn accept_application<B: LifecycleDatabase + CommissionManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<MatchingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let application_id = path.into_inner();
    debug!("💻️ POST accept application #{application_id} by {}", claims.actor());
    let outcome = api.accept(&claims.actor(), application_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(decline_application => Post "/applications/{id}/decline" impl <B: LifecycleDatabase + CommissionManagement> where requires [Role::Requester, Role::Admin]);
pub async fn decline_application<B: LifecycleDatabase + CommissionManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<MatchingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let application_id = path.into_inner();
    debug!("💻️ POST decline application #{application_id} by {}", claims.actor());
    let application = api.decline(&claims.actor(), application_id).await?;
    Ok(HttpResponse::Ok().json(application))
}

route!(confirm_schedule => Post "/applications/{id}/schedule" impl <B: LifecycleDatabase, P: PaymentGateway> where requires [Role::Helper]);
pub async fn confirm_schedule<B: LifecycleDatabase, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let application_id = path.into_inner();
    debug!("💻️ POST schedule confirmation for application #{application_id}");
    let application = api.confirm_schedule(&claims.actor(), application_id).await?;
    Ok(HttpResponse::Ok().json(application))
}

route!(check_in => Post "/applications/{id}/check_in" impl <B: LifecycleDatabase, P: PaymentGateway> where requires [Role::Helper]);
pub async fn check_in<B: LifecycleDatabase, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let application_id = path.into_inner();
    debug!("💻️ POST check-in for application #{application_id}");
    let (application, order) = api.check_in(&claims.actor(), application_id).await?;
    Ok(HttpResponse::Ok().json(CheckInResponse { application, order }))
}

route!(submit_closing => Post "/applications/{id}/closing" impl <B: LifecycleDatabase, P: PaymentGateway> where requires [Role::Helper]);
/// Submits the closing report. The response carries the provisional settlement computed from it.
pub async fn submit_closing<B: LifecycleDatabase, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<NewClosingReport>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let application_id = path.into_inner();
    debug!("💻️ POST closing report for application #{application_id}");
    let (report, calculation) = api.submit_closing(&claims.actor(), application_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ClosingResponse { report, calculation }))
}

//----------------------------------------------   Settlement  ----------------------------------------------------

route!(settlement_statement => Get "/orders/{id}/settlement" impl <B: LifecycleDatabase> where requires [Role::Requester, Role::Helper, Role::Admin]);
pub async fn settlement_statement<B: LifecycleDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ GET settlement statement for order #{order_id}");
    let statement = api.statement(&claims.actor(), order_id).await?;
    Ok(HttpResponse::Ok().json(statement))
}

route!(finalize_settlement => Post "/orders/{id}/settle" impl <B: LifecycleDatabase> where requires [Role::Requester, Role::Admin]);
/// Settles the order. Fails with 409 `open_incidents` while any incident against it is still open.
pub async fn finalize_settlement<B: LifecycleDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ POST settle order #{order_id} by {}", claims.actor());
    let outcome = api.finalize_settlement(&claims.actor(), order_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

//----------------------------------------------   Incidents  ----------------------------------------------------

route!(submit_incident => Post "/orders/{id}/incidents" impl <B: IncidentManagement, P: PaymentGateway> where requires [Role::Requester, Role::Admin]);
pub async fn submit_incident<B: IncidentManagement, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<NewIncident>,
    api: web::Data<IncidentApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST incident against order #{order_id} by {}", claims.actor());
    let incident = api.submit(&claims.actor(), order_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(incident))
}

route!(incidents_for_order => Get "/orders/{id}/incidents" impl <B: IncidentManagement, P: PaymentGateway> where requires [Role::Requester, Role::Helper, Role::Admin]);
pub async fn incidents_for_order<B: IncidentManagement, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<IncidentApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ GET incidents for order #{order_id}");
    let incidents = api.incidents_for_order(&claims.actor(), order_id).await?;
    Ok(HttpResponse::Ok().json(incidents))
}

route!(incident_by_id => Get "/incidents/{id}" impl <B: IncidentManagement, P: PaymentGateway> where requires [Role::Requester, Role::Helper, Role::Admin]);
pub async fn incident_by_id<B: IncidentManagement, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<IncidentApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let incident_id = path.into_inner();
    trace!("💻️ GET incident #{incident_id}");
    let incident = api.incident(&claims.actor(), incident_id).await?;
    Ok(HttpResponse::Ok().json(incident))
}

route!(incident_actions => Get "/incidents/{id}/actions" impl <B: IncidentManagement, P: PaymentGateway> where requires [Role::Requester, Role::Helper, Role::Admin]);
/// The incident's audit trail, oldest first.
pub async fn incident_actions<B: IncidentManagement, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<IncidentApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let incident_id = path.into_inner();
    trace!("💻️ GET actions for incident #{incident_id}");
    let actions = api.actions(&claims.actor(), incident_id).await?;
    Ok(HttpResponse::Ok().json(actions))
}

route!(incident_deadline => Get "/incidents/{id}/deadline" impl <B: IncidentManagement, P: PaymentGateway> where requires [Role::Requester, Role::Helper, Role::Admin]);
pub async fn incident_deadline<B: IncidentManagement, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<IncidentApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let incident_id = path.into_inner();
    let deadline_passed = api.is_deadline_passed(&claims.actor(), incident_id).await?;
    Ok(HttpResponse::Ok().json(DeadlineResponse { incident_id, deadline_passed }))
}

route!(reply_to_incident => Post "/incidents/{id}/reply" impl <B: IncidentManagement, P: PaymentGateway> where requires [Role::Admin]);
pub async fn reply_to_incident<B: IncidentManagement, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<ReplyRequest>,
    api: web::Data<IncidentApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let incident_id = path.into_inner();
    debug!("💻️ POST reply to incident #{incident_id}");
    let incident = api.reply(&claims.actor(), incident_id, &body.reply).await?;
    Ok(HttpResponse::Ok().json(incident))
}

route!(comment_on_incident => Post "/incidents/{id}/comment" impl <B: IncidentManagement, P: PaymentGateway> where requires [Role::Requester, Role::Helper, Role::Admin]);
pub async fn comment_on_incident<B: IncidentManagement, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<CommentRequest>,
    api: web::Data<IncidentApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let incident_id = path.into_inner();
    debug!("💻️ POST comment on incident #{incident_id} by {}", claims.actor());
    let action = api.comment(&claims.actor(), incident_id, &body.body).await?;
    Ok(HttpResponse::Created().json(action))
}

route!(request_evidence => Post "/incidents/{id}/evidence_request" impl <B: IncidentManagement, P: PaymentGateway> where requires [Role::Admin]);
pub async fn request_evidence<B: IncidentManagement, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<EvidenceRequest>,
    api: web::Data<IncidentApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let incident_id = path.into_inner();
    debug!("💻️ POST evidence request on incident #{incident_id}");
    let action = api.request_evidence(&claims.actor(), incident_id, &body.note).await?;
    Ok(HttpResponse::Created().json(action))
}

route!(change_incident_status => Post "/incidents/{id}/status" impl <B: IncidentManagement, P: PaymentGateway> where requires [Role::Admin]);
pub async fn change_incident_status<B: IncidentManagement, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<StatusChangeRequest>,
    api: web::Data<IncidentApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let incident_id = path.into_inner();
    let StatusChangeRequest { status, note } = body.into_inner();
    debug!("💻️ POST status {status} for incident #{incident_id}");
    let incident = api.change_status(&claims.actor(), incident_id, status, note).await?;
    Ok(HttpResponse::Ok().json(incident))
}

route!(helper_response => Post "/incidents/{id}/helper_response" impl <B: IncidentManagement, P: PaymentGateway> where requires [Role::Helper]);
pub async fn helper_response<B: IncidentManagement, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<HelperResponseRequest>,
    api: web::Data<IncidentApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let incident_id = path.into_inner();
    let HelperResponseRequest { status, note } = body.into_inner();
    debug!("💻️ POST helper response {status} on incident #{incident_id}");
    let incident = api.respond_as_helper(&claims.actor(), incident_id, status, note).await?;
    Ok(HttpResponse::Ok().json(incident))
}

route!(confirm_deduction => Post "/incidents/{id}/deduction" impl <B: IncidentManagement, P: PaymentGateway> where requires [Role::Requester, Role::Admin]);
/// Resolves the incident with a deduction. A second confirmation fails with 409 `already_resolved`.
pub async fn confirm_deduction<B: IncidentManagement, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<DeductionRequest>,
    api: web::Data<IncidentApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let incident_id = path.into_inner();
    let DeductionRequest { amount, reason, method } = body.into_inner();
    info!("💻️ POST deduction of {amount} ({method}) on incident #{incident_id} by {}", claims.actor());
    let outcome = api.confirm_deduction(&claims.actor(), incident_id, amount, &reason, method).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(force_process => Post "/incidents/{id}/force" impl <B: IncidentManagement, P: PaymentGateway> where requires [Role::Admin]);
pub async fn force_process<B: IncidentManagement, P: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<ForceProcessRequest>,
    api: web::Data<IncidentApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let incident_id = path.into_inner();
    let ForceProcessRequest { reason, amount, method } = body.into_inner();
    info!("💻️ POST force-process incident #{incident_id} by {}", claims.actor());
    let outcome = api.force_process(&claims.actor(), incident_id, &reason, amount, method).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

//----------------------------------------------   Commission  ----------------------------------------------------

route!(add_policy => Post "/commission/policies" impl <B: CommissionManagement> where requires [Role::Admin]);
/// Adds a commission policy. Existing snapshots are never touched; the policy applies to matches made after its
/// `effective_from`.
pub async fn add_policy<B: CommissionManagement>(
    claims: JwtClaims,
    body: web::Json<NewCommissionPolicy>,
    api: web::Data<CommissionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST commission policy by {}", claims.actor());
    let policy = api.add_policy(&claims.actor(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(policy))
}

route!(policies => Get "/commission/policies" impl <B: CommissionManagement> where requires [Role::Admin]);
pub async fn policies<B: CommissionManagement>(
    claims: JwtClaims,
    api: web::Data<CommissionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let policies = api.policies(&claims.actor()).await?;
    Ok(HttpResponse::Ok().json(policies))
}

route!(assign_team => Post "/commission/teams" impl <B: CommissionManagement> where requires [Role::Admin]);
pub async fn assign_team<B: CommissionManagement>(
    claims: JwtClaims,
    body: web::Json<TeamAssignment>,
    api: web::Data<CommissionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let TeamAssignment { helper_id, team_id } = body.into_inner();
    debug!("💻️ POST helper #{helper_id} joins team #{team_id}");
    api.assign_team(&claims.actor(), helper_id, team_id).await?;
    Ok(HttpResponse::Ok().json(TeamAssignment { helper_id, team_id }))
}

route!(preview_commission => Get "/commission/helpers/{id}" impl <B: CommissionManagement> where requires [Role::Admin]);
/// The split that would be frozen if the helper were matched now.
pub async fn preview_commission<B: CommissionManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<CommissionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let helper_id = path.into_inner();
    let snapshot = api.resolve_for(&claims.actor(), helper_id).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}
