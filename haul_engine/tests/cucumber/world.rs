use std::collections::HashMap;

use cucumber::World;
use haul_engine::{
    db_types::{Application, Incident, Order},
    test_utils::market::TestMarket,
    LifecycleError,
};

#[derive(Default, Debug, World)]
pub struct MarketWorld {
    pub market: Option<TestMarket>,
    /// The order the scenario is about.
    pub order: Option<Order>,
    /// The latest application of each helper, by helper id.
    pub applications: HashMap<i64, Application>,
    pub incident: Option<Incident>,
    pub last_error: Option<LifecycleError>,
}

impl MarketWorld {
    pub fn market(&self) -> &TestMarket {
        self.market.as_ref().expect("Marketplace not initialised")
    }

    pub fn market_mut(&mut self) -> &mut TestMarket {
        self.market.as_mut().expect("Marketplace not initialised")
    }

    pub fn order_id(&self) -> i64 {
        self.order.as_ref().expect("No order in this scenario").id
    }

    pub fn incident_id(&self) -> i64 {
        self.incident.as_ref().expect("No incident in this scenario").id
    }

    pub fn application_for(&self, helper_id: i64) -> &Application {
        self.applications.get(&helper_id).unwrap_or_else(|| panic!("Helper {helper_id} has not applied"))
    }

    /// Keeps the value of a successful call, or the error of a failed one.
    pub fn record<T>(&mut self, result: Result<T, LifecycleError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Some(value)
            },
            Err(e) => {
                self.last_error = Some(e);
                None
            },
        }
    }
}
