//! The deduction ledger. One row per debited party per incident.
use chrono::Utc;
use haul_common::Won;
use log::*;
use sqlx::SqliteConnection;

use crate::db_types::{DeductionLeg, DispatchStatus, LegKind};

pub async fn insert_leg(
    incident_id: i64,
    order_id: i64,
    leg: LegKind,
    amount: Won,
    conn: &mut SqliteConnection,
) -> Result<DeductionLeg, sqlx::Error> {
    let now = Utc::now();
    let leg: DeductionLeg = sqlx::query_as(
        r#"
            INSERT INTO deduction_legs (incident_id, order_id, leg, amount, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *
        "#,
    )
    .bind(incident_id)
    .bind(order_id)
    .bind(leg)
    .bind(amount)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🧾️ {} leg #{} of {} recorded for incident #{incident_id}", leg.leg, leg.id, leg.amount);
    Ok(leg)
}

pub async fn fetch_legs_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<DeductionLeg>, sqlx::Error> {
    let legs = sqlx::query_as("SELECT * FROM deduction_legs WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(legs)
}

pub async fn fetch_legs_for_incident(
    incident_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<DeductionLeg>, sqlx::Error> {
    let legs = sqlx::query_as("SELECT * FROM deduction_legs WHERE incident_id = $1 ORDER BY id ASC")
        .bind(incident_id)
        .fetch_all(conn)
        .await?;
    Ok(legs)
}

/// Every leg that has not reached the payment provider yet, `failed` and `pending` alike.
pub async fn fetch_undispatched_legs(conn: &mut SqliteConnection) -> Result<Vec<DeductionLeg>, sqlx::Error> {
    let legs = sqlx::query_as(
        "SELECT * FROM deduction_legs WHERE dispatch_status IN ('failed', 'pending') ORDER BY id ASC",
    )
    .fetch_all(conn)
    .await?;
    Ok(legs)
}

/// Moves the leg to `pending` and stamps it, but only if it is still exactly as the caller last saw it. A concurrent
/// claim changes `updated_at`, so at most one claimer gets the row back.
pub async fn claim_leg_for_retry(
    leg: &DeductionLeg,
    conn: &mut SqliteConnection,
) -> Result<Option<DeductionLeg>, sqlx::Error> {
    let claimed = sqlx::query_as(
        r#"
            UPDATE deduction_legs SET dispatch_status = 'pending', updated_at = $1
            WHERE id = $2 AND dispatch_status = $3 AND updated_at = $4
            RETURNING *
        "#,
    )
    .bind(Utc::now())
    .bind(leg.id)
    .bind(leg.dispatch_status)
    .bind(leg.updated_at)
    .fetch_optional(conn)
    .await?;
    Ok(claimed)
}

/// Records a dispatch attempt. A leg that has already been dispatched is never overwritten.
pub async fn record_dispatch_outcome(
    id: i64,
    status: DispatchStatus,
    payment_id: Option<String>,
    failure_reason: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<DeductionLeg>, sqlx::Error> {
    let leg: Option<DeductionLeg> = sqlx::query_as(
        r#"
            UPDATE deduction_legs SET
                dispatch_status = $1,
                payment_id = COALESCE($2, payment_id),
                failure_reason = $3,
                attempts = attempts + 1,
                updated_at = $4
            WHERE id = $5 AND dispatch_status <> 'dispatched'
            RETURNING *
        "#,
    )
    .bind(status)
    .bind(payment_id)
    .bind(failure_reason)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    if let Some(leg) = &leg {
        trace!("🧾️ Leg #{id} is {} after {} attempt(s)", leg.dispatch_status, leg.attempts);
    }
    Ok(leg)
}
