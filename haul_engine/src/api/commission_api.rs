use std::fmt::Debug;

use chrono::{DateTime, Utc};
use haul_common::Rate;
use log::*;

use crate::{
    api::{access::ensure_admin, errors::LifecycleError},
    db_types::{Actor, CommissionPolicy, CommissionSnapshot, NewCommissionPolicy, PolicyScope},
    helpers::resolve_commission,
    traits::CommissionManagement,
};

/// The largest combined commission a policy may carry.
pub const MAX_TOTAL_RATE: Rate = Rate::from_bps(10_000);

/// Manages commission policies and team membership, and resolves the split that applies to a helper.
pub struct CommissionApi<B> {
    db: B,
}

impl<B> Debug for CommissionApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CommissionApi")
    }
}

impl<B> CommissionApi<B>
where B: CommissionManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Adds a policy. Policies are never edited; a later `effective_from` supersedes an earlier one.
    pub async fn add_policy(
        &self,
        actor: &Actor,
        policy: NewCommissionPolicy,
    ) -> Result<CommissionPolicy, LifecycleError> {
        ensure_admin(actor, "manage commission policies")?;
        validate_policy(&policy)?;
        let policy = self.db.insert_policy(policy).await?;
        info!(
            "💰️ Commission policy #{} added: {} {:?} platform {} team leader {} from {}",
            policy.id, policy.scope, policy.subject_id, policy.platform_rate, policy.team_leader_rate, policy.effective_from
        );
        Ok(policy)
    }

    pub async fn assign_team(&self, actor: &Actor, helper_id: i64, team_id: i64) -> Result<(), LifecycleError> {
        ensure_admin(actor, "manage teams")?;
        self.db.assign_team(helper_id, team_id).await?;
        debug!("💰️ Helper #{helper_id} assigned to team #{team_id}");
        Ok(())
    }

    pub async fn policies(&self, actor: &Actor) -> Result<Vec<CommissionPolicy>, LifecycleError> {
        ensure_admin(actor, "list commission policies")?;
        self.db.fetch_policies().await
    }

    /// The split that would be frozen if `helper_id` were matched at `at`.
    pub async fn resolve_for_helper(
        &self,
        helper_id: i64,
        at: DateTime<Utc>,
    ) -> Result<CommissionSnapshot, LifecycleError> {
        let team_id = self.db.fetch_team_for_helper(helper_id).await?;
        let policies = self.db.fetch_policies_for_helper(helper_id, team_id).await?;
        let snapshot = resolve_commission(helper_id, team_id, at, &policies)?;
        trace!("💰️ Helper #{helper_id} resolves to {} from {}", snapshot.total_rate, snapshot.source);
        Ok(snapshot)
    }

    /// Admin preview of [`Self::resolve_for_helper`] at the current time.
    pub async fn resolve_for(&self, actor: &Actor, helper_id: i64) -> Result<CommissionSnapshot, LifecycleError> {
        ensure_admin(actor, "preview commission splits")?;
        self.resolve_for_helper(helper_id, Utc::now()).await
    }
}

fn validate_policy(policy: &NewCommissionPolicy) -> Result<(), LifecycleError> {
    match (policy.scope, policy.subject_id) {
        (PolicyScope::Global, Some(_)) => {
            return Err(LifecycleError::validation("A global policy cannot name a helper or team"));
        },
        (PolicyScope::Team | PolicyScope::Helper, None) => {
            return Err(LifecycleError::validation(format!("A {} policy needs a subject id", policy.scope)));
        },
        _ => {},
    }
    if policy.platform_rate.bps() < 0 || policy.team_leader_rate.bps() < 0 {
        return Err(LifecycleError::validation("Commission rates cannot be negative"));
    }
    if policy.platform_rate + policy.team_leader_rate > MAX_TOTAL_RATE {
        return Err(LifecycleError::validation("The combined commission cannot exceed 100%"));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn policy_validation() {
        let now = Utc::now();
        let ok = NewCommissionPolicy::helper(7, Rate::from_percent(8), Rate::from_percent(2), now);
        assert!(validate_policy(&ok).is_ok());
        let mut bad_scope = NewCommissionPolicy::global(Rate::from_percent(10), Rate::zero(), now);
        bad_scope.subject_id = Some(3);
        assert!(validate_policy(&bad_scope).is_err());
        let mut missing_subject = NewCommissionPolicy::team(3, Rate::from_percent(10), Rate::zero(), now);
        missing_subject.subject_id = None;
        assert!(validate_policy(&missing_subject).is_err());
        let negative = NewCommissionPolicy::global(Rate::from_bps(-1), Rate::zero(), now);
        assert!(validate_policy(&negative).is_err());
        let too_much = NewCommissionPolicy::global(Rate::from_percent(90), Rate::from_percent(11), now);
        assert!(validate_policy(&too_much).is_err());
        let everything = NewCommissionPolicy::global(Rate::from_percent(90), Rate::from_percent(10), now);
        assert!(validate_policy(&everything).is_ok());
    }
}
