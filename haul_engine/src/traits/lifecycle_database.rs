use chrono::{DateTime, Utc};

use crate::{
    api::errors::LifecycleError,
    db_types::{Application, ApprovalStatus, ClosingReport, NewOrder, Order},
    traits::{
        data_objects::{ClosingSubmission, MatchCommand, MatchOutcome, SettlementOutcome},
        OrderManagement,
    },
};

/// This trait defines the highest level of behaviour for lifecycle backends.
///
/// Every method is one atomic unit of work. Status changes are compare-and-set: a method that finds the record in an
/// unexpected state changes nothing and reports the conflict.
#[allow(async_fn_in_trait)]
pub trait LifecycleDatabase: Clone + OrderManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order in `awaiting_deposit` status with moderation pending.
    async fn insert_order(&self, requester_id: i64, order: NewOrder) -> Result<Order, LifecycleError>;

    /// Records the payment id of the deposit request. The order must still be awaiting its deposit.
    async fn set_deposit_payment(&self, order_id: i64, payment_id: &str) -> Result<Order, LifecycleError>;

    /// Moves the order from `awaiting_deposit` to `registered`.
    async fn mark_deposit_confirmed(&self, order_id: i64) -> Result<Order, LifecycleError>;

    async fn set_approval_status(&self, order_id: i64, status: ApprovalStatus) -> Result<Order, LifecycleError>;

    /// Creates an `applied` row for the helper.
    ///
    /// The insert only happens if the order is approved, open for applications and has spare capacity; otherwise
    /// `CapacityExceeded` or `OrderNotOpen` is returned. A second application by the same helper fails with
    /// `DuplicateApplication`. The first application moves the order from `registered` to `matching`.
    async fn insert_application(
        &self,
        order_id: i64,
        helper_id: i64,
        note: Option<String>,
    ) -> Result<(Application, Order), LifecycleError>;

    /// Moves an `applied` application to `rejected`.
    async fn decline_application(&self, application_id: i64) -> Result<Application, LifecycleError>;

    /// The match commit point. In a single transaction:
    /// * claims one unit of order capacity, sets the matched helper, writes the commission and pricing snapshot and
    ///   moves the order to `scheduled`;
    /// * moves the application from `applied` to `selected` and writes the same commission snapshot onto it.
    ///
    /// If either step finds its row in the wrong state, nothing is written.
    async fn commit_match(&self, command: MatchCommand) -> Result<MatchOutcome, LifecycleError>;

    /// Moves the application from `selected` to `scheduled`.
    async fn confirm_schedule(&self, application_id: i64) -> Result<Application, LifecycleError>;

    /// Moves the application from `scheduled` to `in_progress`, and the order with it.
    async fn check_in(&self, application_id: i64) -> Result<(Application, Order), LifecycleError>;

    /// Stores the closing report and moves both the application and the order to `closing_submitted`.
    async fn submit_closing(
        &self,
        submission: ClosingSubmission,
    ) -> Result<(ClosingReport, Application, Order), LifecycleError>;

    /// Settles the order. Fails with `OpenIncidents` while any incident on the order is still open. Completes the
    /// accepted application and marks resolved incidents that carried a deduction as `applied`.
    async fn finalize_settlement(&self, order_id: i64, actor_id: i64) -> Result<SettlementOutcome, LifecycleError>;

    /// Soft-hides settled orders that have not been updated since `settled_before`. Returns the orders hidden.
    async fn hide_settled_orders(&self, settled_before: DateTime<Utc>) -> Result<Vec<Order>, LifecycleError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), LifecycleError> {
        Ok(())
    }
}
