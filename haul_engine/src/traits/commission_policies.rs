use crate::{
    api::errors::LifecycleError,
    db_types::{CommissionPolicy, NewCommissionPolicy},
};

/// Storage for commission policies and team membership. Policies are append-only: a change in rates is a new row
/// with a later `effective_from`.
#[allow(async_fn_in_trait)]
pub trait CommissionManagement {
    async fn insert_policy(&self, policy: NewCommissionPolicy) -> Result<CommissionPolicy, LifecycleError>;

    async fn fetch_policies(&self) -> Result<Vec<CommissionPolicy>, LifecycleError>;

    /// All policies that could apply to the helper: their own overrides, their team's, and the global defaults.
    async fn fetch_policies_for_helper(
        &self,
        helper_id: i64,
        team_id: Option<i64>,
    ) -> Result<Vec<CommissionPolicy>, LifecycleError>;

    /// Assigns the helper to a team, replacing any previous membership.
    async fn assign_team(&self, helper_id: i64, team_id: i64) -> Result<(), LifecycleError>;

    async fn fetch_team_for_helper(&self, helper_id: i64) -> Result<Option<i64>, LifecycleError>;
}
