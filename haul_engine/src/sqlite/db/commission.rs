use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::db_types::{CommissionPolicy, NewCommissionPolicy};

pub async fn insert_policy(
    policy: NewCommissionPolicy,
    conn: &mut SqliteConnection,
) -> Result<CommissionPolicy, sqlx::Error> {
    let policy: CommissionPolicy = sqlx::query_as(
        r#"
            INSERT INTO commission_policies (scope, subject_id, platform_rate, team_leader_rate, effective_from, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
        "#,
    )
    .bind(policy.scope)
    .bind(policy.subject_id)
    .bind(policy.platform_rate)
    .bind(policy.team_leader_rate)
    .bind(policy.effective_from)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    info!(
        "🤝️ New {} commission policy #{} ({} + {}) effective from {}",
        policy.scope, policy.id, policy.platform_rate, policy.team_leader_rate, policy.effective_from
    );
    Ok(policy)
}

pub async fn fetch_policies(conn: &mut SqliteConnection) -> Result<Vec<CommissionPolicy>, sqlx::Error> {
    let policies = sqlx::query_as("SELECT * FROM commission_policies ORDER BY id ASC").fetch_all(conn).await?;
    Ok(policies)
}

pub async fn fetch_policies_for_helper(
    helper_id: i64,
    team_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionPolicy>, sqlx::Error> {
    let policies = sqlx::query_as(
        r#"
            SELECT * FROM commission_policies
            WHERE (scope = 'helper' AND subject_id = $1)
               OR (scope = 'team' AND subject_id = $2)
               OR scope = 'global'
            ORDER BY id ASC
        "#,
    )
    .bind(helper_id)
    .bind(team_id)
    .fetch_all(conn)
    .await?;
    Ok(policies)
}

pub async fn assign_team(helper_id: i64, team_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO team_memberships (helper_id, team_id, joined_at) VALUES ($1, $2, $3)
            ON CONFLICT (helper_id) DO UPDATE SET team_id = excluded.team_id, joined_at = excluded.joined_at
        "#,
    )
    .bind(helper_id)
    .bind(team_id)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    debug!("🤝️ Helper #{helper_id} is now a member of team #{team_id}");
    Ok(())
}

pub async fn fetch_team_for_helper(helper_id: i64, conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    let team_id = sqlx::query_scalar("SELECT team_id FROM team_memberships WHERE helper_id = $1")
        .bind(helper_id)
        .fetch_optional(conn)
        .await?;
    Ok(team_id)
}
