use haul_common::Won;

use crate::{
    db_types::{Actor, Application, ApprovalStatus, NewClosingReport, NewOrder, Order},
    events::EventProducers,
    test_utils::{payment_gateway::RecordingPaymentGateway, prepare_env::new_test_database},
    CommissionApi,
    IncidentApi,
    MatchingApi,
    OrderFlowApi,
    OrderManagement,
    SettlementApi,
    SqliteDatabase,
};

pub const ADMIN: Actor = Actor::admin(1);

/// Every API wired to one throw-away database and a recording payment provider.
#[derive(Debug)]
pub struct TestMarket {
    pub db: SqliteDatabase,
    pub gateway: RecordingPaymentGateway,
    pub orders: OrderFlowApi<SqliteDatabase, RecordingPaymentGateway>,
    pub matching: MatchingApi<SqliteDatabase>,
    pub settlement: SettlementApi<SqliteDatabase>,
    pub incidents: IncidentApi<SqliteDatabase, RecordingPaymentGateway>,
    pub commission: CommissionApi<SqliteDatabase>,
}

impl TestMarket {
    pub async fn new() -> Self {
        Self::with_producers(EventProducers::default()).await
    }

    pub async fn with_producers(producers: EventProducers) -> Self {
        let db = new_test_database().await;
        let gateway = RecordingPaymentGateway::new();
        Self {
            orders: OrderFlowApi::new(db.clone(), gateway.clone(), producers.clone()),
            matching: MatchingApi::new(db.clone(), producers.clone()),
            settlement: SettlementApi::new(db.clone(), producers.clone()),
            incidents: IncidentApi::new(db.clone(), gateway.clone(), producers),
            commission: CommissionApi::new(db.clone()),
            db,
            gateway,
        }
    }

    /// Posts an order, pays its deposit and approves it, so that helpers can apply.
    pub async fn open_order(&self, requester_id: i64, order: NewOrder) -> Order {
        let requester = Actor::requester(requester_id);
        let order = self.orders.create_order(&requester, requester_id, order).await.expect("Error creating order");
        self.orders.request_deposit(&requester, order.id).await.expect("Error requesting deposit");
        self.orders.confirm_deposit(&requester, order.id).await.expect("Error confirming deposit");
        self.orders.record_approval(&ADMIN, order.id, ApprovalStatus::Approved).await.expect("Error approving order")
    }

    /// Takes an open order through matching, check-in and closing with the given box counts.
    pub async fn closed_order(&self, order: &Order, helper_id: i64, report: NewClosingReport) -> (Order, Application) {
        let helper = Actor::helper(helper_id);
        let requester = Actor::requester(order.requester_id);
        let application = self.matching.apply(&helper, order.id, None).await.expect("Error applying");
        self.matching.accept(&requester, application.id).await.expect("Error accepting");
        self.orders.confirm_schedule(&helper, application.id).await.expect("Error confirming schedule");
        self.orders.check_in(&helper, application.id).await.expect("Error checking in");
        self.orders.submit_closing(&helper, application.id, report).await.expect("Error submitting closing");
        let order = self.orders.order(&ADMIN, order.id).await.expect("Error fetching order");
        let application = self.orders.db().fetch_application(application.id).await.unwrap().unwrap();
        (order, application)
    }

    /// Scenario C's order: one helper, 1500 per box, a 20000 deposit.
    pub fn standard_order() -> NewOrder {
        NewOrder::new("Seongsu warehouse run", Won::from(1500), 1).with_deposit(Won::from(20_000))
    }

    pub async fn tear_down(self) {
        drop(self.orders);
        drop(self.matching);
        drop(self.settlement);
        drop(self.incidents);
        drop(self.commission);
        crate::test_utils::prepare_env::tear_down(self.db).await;
    }
}
