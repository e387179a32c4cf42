use chrono::{DateTime, Utc};
use log::*;

use crate::{
    api::errors::LifecycleError,
    db_types::{CommissionPolicy, CommissionSnapshot, PolicyScope, SnapshotSource},
};

/// Resolves the commission split that applies to `helper_id` at the instant `at`.
///
/// The first tier with a policy in force wins: a helper override, then an override for the helper's team, and then the
/// global default. Within a tier, the policy with the latest `effective_from` that is not in the future is the one in
/// force. Policies for other helpers or teams in the slice are ignored, so callers may pass a superset.
pub fn resolve_commission(
    helper_id: i64,
    team_id: Option<i64>,
    at: DateTime<Utc>,
    policies: &[CommissionPolicy],
) -> Result<CommissionSnapshot, LifecycleError> {
    let in_force = |scope: PolicyScope, subject: Option<i64>| {
        policies
            .iter()
            .filter(|p| p.scope == scope && p.subject_id == subject && p.effective_from <= at)
            .max_by_key(|p| (p.effective_from, p.id))
    };
    let tiers = [
        (in_force(PolicyScope::Helper, Some(helper_id)), SnapshotSource::HelperOverride),
        (team_id.and_then(|t| in_force(PolicyScope::Team, Some(t))), SnapshotSource::TeamOverride),
        (in_force(PolicyScope::Global, None), SnapshotSource::GlobalDefault),
    ];
    let (policy, source) = tiers
        .into_iter()
        .find_map(|(policy, source)| policy.map(|p| (p, source)))
        .ok_or(LifecycleError::PolicyNotFound(helper_id))?;
    trace!("🤝️ Commission for helper #{helper_id} resolved from {source} policy #{}", policy.id);
    Ok(CommissionSnapshot {
        platform_rate: policy.platform_rate,
        team_leader_rate: policy.team_leader_rate,
        total_rate: policy.platform_rate + policy.team_leader_rate,
        source,
    })
}

#[cfg(test)]
mod test {
    use chrono::{Duration, TimeZone};
    use haul_common::Rate;

    use super::*;

    fn policy(id: i64, scope: PolicyScope, subject: Option<i64>, platform: i64, leader: i64, days: i64) -> CommissionPolicy {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        CommissionPolicy {
            id,
            scope,
            subject_id: subject,
            platform_rate: Rate::from_bps(platform),
            team_leader_rate: Rate::from_bps(leader),
            effective_from: base + Duration::days(days),
            created_at: base,
        }
    }

    fn at(days: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::days(days)
    }

    #[test]
    fn helper_override_beats_team_and_global() {
        let policies = vec![
            policy(1, PolicyScope::Global, None, 1000, 0, 0),
            policy(2, PolicyScope::Team, Some(7), 800, 200, 0),
            policy(3, PolicyScope::Helper, Some(42), 500, 100, 0),
        ];
        let snap = resolve_commission(42, Some(7), at(1), &policies).unwrap();
        assert_eq!(snap.source, SnapshotSource::HelperOverride);
        assert_eq!(snap.platform_rate, Rate::from_bps(500));
        assert_eq!(snap.total_rate, Rate::from_bps(600));

        let snap = resolve_commission(43, Some(7), at(1), &policies).unwrap();
        assert_eq!(snap.source, SnapshotSource::TeamOverride);
        assert_eq!(snap.total_rate, Rate::from_bps(1000));

        let snap = resolve_commission(43, None, at(1), &policies).unwrap();
        assert_eq!(snap.source, SnapshotSource::GlobalDefault);
        assert_eq!(snap.team_leader_rate, Rate::zero());
    }

    #[test]
    fn future_policies_are_not_in_force() {
        let policies = vec![
            policy(1, PolicyScope::Global, None, 1000, 0, 0),
            policy(2, PolicyScope::Global, None, 1500, 0, 10),
            policy(3, PolicyScope::Helper, Some(42), 500, 0, 10),
        ];
        let snap = resolve_commission(42, None, at(5), &policies).unwrap();
        assert_eq!(snap.source, SnapshotSource::GlobalDefault);
        assert_eq!(snap.platform_rate, Rate::from_bps(1000));
        let snap = resolve_commission(42, None, at(11), &policies).unwrap();
        assert_eq!(snap.source, SnapshotSource::HelperOverride);
        let snap = resolve_commission(41, None, at(11), &policies).unwrap();
        assert_eq!(snap.platform_rate, Rate::from_bps(1500));
    }

    #[test]
    fn no_policy_is_an_error() {
        let policies = vec![policy(1, PolicyScope::Team, Some(3), 1000, 0, 0)];
        let err = resolve_commission(42, None, at(1), &policies).unwrap_err();
        assert_eq!(err, LifecycleError::PolicyNotFound(42));
    }
}
