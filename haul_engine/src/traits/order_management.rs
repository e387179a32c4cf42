use crate::{
    api::errors::LifecycleError,
    db_types::{Application, ClosingReport, DeductionLeg, Order},
};

/// Read-only queries over orders and their dependents.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, LifecycleError>;

    /// Orders a helper may apply to: approved by moderation, in `registered` or `matching`, and not hidden.
    async fn fetch_open_orders(&self) -> Result<Vec<Order>, LifecycleError>;

    async fn fetch_orders_for_requester(&self, requester_id: i64) -> Result<Vec<Order>, LifecycleError>;

    async fn fetch_application(&self, application_id: i64) -> Result<Option<Application>, LifecycleError>;

    async fn fetch_applications_for_order(&self, order_id: i64) -> Result<Vec<Application>, LifecycleError>;

    async fn fetch_applications_for_helper(&self, helper_id: i64) -> Result<Vec<Application>, LifecycleError>;

    /// The single accepted application for the order, if it has been matched.
    async fn fetch_accepted_application(&self, order_id: i64) -> Result<Option<Application>, LifecycleError>;

    async fn fetch_closing_report(&self, order_id: i64) -> Result<Option<ClosingReport>, LifecycleError>;

    async fn fetch_deduction_legs_for_order(&self, order_id: i64) -> Result<Vec<DeductionLeg>, LifecycleError>;
}
