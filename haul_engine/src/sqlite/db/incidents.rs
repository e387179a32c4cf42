use chrono::{DateTime, Utc};
use haul_common::Won;
use log::*;
use sqlx::{types::Json, SqliteConnection};

use super::orders;
use crate::db_types::{
    DeductionMethod,
    HelperStatus,
    Incident,
    IncidentAction,
    IncidentStatus,
    NewIncident,
    NewIncidentAction,
    Order,
    OrderStatusType,
};

pub async fn insert_incident(
    order_id: i64,
    reporter_id: i64,
    incident: NewIncident,
    helper_response_deadline: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<Incident, sqlx::Error> {
    let now = Utc::now();
    let incident: Incident = sqlx::query_as(
        r#"
            INSERT INTO incidents (
                order_id,
                reporter_id,
                incident_type,
                description,
                requested_amount,
                evidence,
                helper_response_deadline,
                helper_response_required,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(reporter_id)
    .bind(incident.incident_type)
    .bind(incident.description)
    .bind(incident.requested_amount)
    .bind(Json(incident.evidence))
    .bind(helper_response_deadline)
    .bind(incident.helper_response_required)
    .bind(now)
    .fetch_one(conn)
    .await?;
    info!("🚨️ Incident #{} ({}) opened on order #{order_id}", incident.id, incident.incident_type);
    Ok(incident)
}

pub async fn fetch_incident(id: i64, conn: &mut SqliteConnection) -> Result<Option<Incident>, sqlx::Error> {
    let incident = sqlx::query_as("SELECT * FROM incidents WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(incident)
}

pub async fn fetch_incidents_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Incident>, sqlx::Error> {
    let incidents = sqlx::query_as("SELECT * FROM incidents WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(incidents)
}

pub async fn count_open_incidents(order_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM incidents WHERE order_id = $1 AND status IN ('submitted', 'reviewing')",
    )
    .bind(order_id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

pub async fn set_admin_reply(id: i64, reply: &str, conn: &mut SqliteConnection) -> Result<Option<Incident>, sqlx::Error> {
    let incident = sqlx::query_as("UPDATE incidents SET admin_reply = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(reply)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(incident)
}

/// Compare-and-set status change. `resolved_at` is stamped when the incident leaves the open states.
pub async fn transition_incident(
    id: i64,
    from: IncidentStatus,
    to: IncidentStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Incident>, sqlx::Error> {
    let now = Utc::now();
    let closes = from.is_open() && to.is_terminal();
    let incident: Option<Incident> = sqlx::query_as(
        r#"
            UPDATE incidents SET
                status = $1,
                resolved_at = CASE WHEN $2 THEN $3 ELSE resolved_at END,
                updated_at = $3
            WHERE id = $4 AND status = $5
            RETURNING *
        "#,
    )
    .bind(to)
    .bind(closes)
    .bind(now)
    .bind(id)
    .bind(from)
    .fetch_optional(conn)
    .await?;
    if incident.is_some() {
        debug!("🚨️ Incident #{id} moved from {from} to {to}");
    }
    Ok(incident)
}

/// Records the helper's answer, once, while the incident is open.
pub async fn set_helper_response(
    id: i64,
    status: HelperStatus,
    note: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<Incident>, sqlx::Error> {
    let now = Utc::now();
    let incident = sqlx::query_as(
        r#"
            UPDATE incidents SET helper_status = $1, helper_note = $2, helper_responded_at = $3, updated_at = $3
            WHERE id = $4 AND helper_status IS NULL AND status IN ('submitted', 'reviewing')
            RETURNING *
        "#,
    )
    .bind(status)
    .bind(note)
    .bind(now)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(incident)
}

/// Resolves an open incident with a confirmed deduction. This is the compare-and-set that makes deductions happen at
/// most once.
pub async fn resolve_with_deduction(
    id: i64,
    deduction: Option<(Won, DeductionMethod)>,
    reason: &str,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Incident>, sqlx::Error> {
    let (amount, method) = deduction.unzip();
    let incident = sqlx::query_as(
        r#"
            UPDATE incidents SET
                status = 'resolved',
                deduction_amount = $1,
                deduction_method = $2,
                deduction_reason = $3,
                resolved_at = $4,
                updated_at = $4
            WHERE id = $5 AND status IN ('submitted', 'reviewing')
            RETURNING *
        "#,
    )
    .bind(amount)
    .bind(method)
    .bind(reason)
    .bind(at)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(incident)
}

/// Forced processing. As [`resolve_with_deduction`], but only while the helper has not responded, and the admin
/// override is recorded.
pub async fn force_resolve(
    id: i64,
    deduction: Option<(Won, DeductionMethod)>,
    reason: &str,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Incident>, sqlx::Error> {
    let (amount, method) = deduction.unzip();
    let incident = sqlx::query_as(
        r#"
            UPDATE incidents SET
                status = 'resolved',
                deduction_amount = $1,
                deduction_method = $2,
                deduction_reason = $3,
                admin_force_processed = TRUE,
                admin_force_reason = $3,
                admin_force_processed_at = $4,
                resolved_at = $4,
                updated_at = $4
            WHERE id = $5 AND status IN ('submitted', 'reviewing') AND helper_status IS NULL
            RETURNING *
        "#,
    )
    .bind(amount)
    .bind(method)
    .bind(reason)
    .bind(at)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(incident)
}

/// Moves every resolved incident on the order that carries a deduction to `applied`.
pub async fn apply_resolved_deductions(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Incident>, sqlx::Error> {
    let incidents = sqlx::query_as(
        r#"
            UPDATE incidents SET status = 'applied', updated_at = $1
            WHERE order_id = $2 AND status = 'resolved' AND deduction_amount IS NOT NULL
            RETURNING *
        "#,
    )
    .bind(Utc::now())
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(incidents)
}

pub async fn insert_action(action: NewIncidentAction, conn: &mut SqliteConnection) -> Result<IncidentAction, sqlx::Error> {
    let action: IncidentAction = sqlx::query_as(
        r#"
            INSERT INTO incident_actions (incident_id, actor_id, action_type, body, from_status, to_status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
        "#,
    )
    .bind(action.incident_id)
    .bind(action.actor_id)
    .bind(action.action_type)
    .bind(action.body)
    .bind(action.from_status)
    .bind(action.to_status)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    trace!("🚨️ {} action #{} logged on incident #{}", action.action_type, action.id, action.incident_id);
    Ok(action)
}

pub async fn fetch_actions(incident_id: i64, conn: &mut SqliteConnection) -> Result<Vec<IncidentAction>, sqlx::Error> {
    let actions = sqlx::query_as("SELECT * FROM incident_actions WHERE incident_id = $1 ORDER BY id ASC")
        .bind(incident_id)
        .fetch_all(conn)
        .await?;
    Ok(actions)
}

/// Brings the order's dispute status in line with the statuses of all of its incidents.
///
/// Only orders that have been closed and not yet settled are touched. Returns the order as it stands afterwards.
pub async fn sync_order_dispute_status(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let statuses: Vec<IncidentStatus> = sqlx::query_scalar("SELECT status FROM incidents WHERE order_id = $1")
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;
    if let Some(target) = OrderStatusType::dispute_status_for(&statuses) {
        use OrderStatusType::*;
        let from = [ClosingSubmitted, DisputeRequested, DisputeReviewing, DisputeResolved, DisputeRejected];
        let from = from.into_iter().filter(|s| *s != target).collect::<Vec<_>>();
        if orders::transition_order(order_id, &from, target, &mut *conn).await?.is_some() {
            debug!("🚨️ Order #{order_id} dispute status is now {target}");
        }
    }
    orders::fetch_order(order_id, conn).await
}
