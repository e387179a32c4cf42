use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::db_types::{Application, ApplicationStatus, CommissionSnapshot};

/// Inserts an `applied` row, but only if the order is approved, open for applications and has spare capacity.
///
/// Returns `None` if the order guard failed. A second application by the same helper surfaces as a unique violation.
pub async fn insert_application(
    order_id: i64,
    helper_id: i64,
    note: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<Application>, sqlx::Error> {
    let now = Utc::now();
    let application: Option<Application> = sqlx::query_as(
        r#"
            INSERT INTO applications (order_id, helper_id, note, applied_at, updated_at)
            SELECT id, $1, $2, $3, $3 FROM orders
            WHERE id = $4
              AND approval_status = 'approved'
              AND status IN ('registered', 'matching')
              AND current_helpers < max_helpers
            RETURNING *
        "#,
    )
    .bind(helper_id)
    .bind(note)
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    if let Some(a) = &application {
        debug!("🤝️ Helper #{helper_id} applied to order #{order_id} (application #{})", a.id);
    }
    Ok(application)
}

pub async fn fetch_application(id: i64, conn: &mut SqliteConnection) -> Result<Option<Application>, sqlx::Error> {
    let application =
        sqlx::query_as("SELECT * FROM applications WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(application)
}

pub async fn fetch_applications_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Application>, sqlx::Error> {
    let applications = sqlx::query_as("SELECT * FROM applications WHERE order_id = $1 ORDER BY applied_at ASC, id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(applications)
}

pub async fn fetch_applications_for_helper(
    helper_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Application>, sqlx::Error> {
    let applications =
        sqlx::query_as("SELECT * FROM applications WHERE helper_id = $1 ORDER BY applied_at DESC, id DESC")
            .bind(helper_id)
            .fetch_all(conn)
            .await?;
    Ok(applications)
}

pub async fn fetch_accepted_application(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Application>, sqlx::Error> {
    let application = sqlx::query_as(
        r#"
            SELECT * FROM applications
            WHERE order_id = $1
              AND status IN ('selected', 'scheduled', 'in_progress', 'closing_submitted', 'completed')
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(application)
}

/// The application half of the match commit point. Moves an `applied` row to `selected` and freezes the commission
/// snapshot onto it. Returns `None` if the application is not `applied` or does not belong to the order.
pub async fn accept_application(
    id: i64,
    order_id: i64,
    snapshot: &CommissionSnapshot,
    conn: &mut SqliteConnection,
) -> Result<Option<Application>, sqlx::Error> {
    let now = Utc::now();
    let application = sqlx::query_as(
        r#"
            UPDATE applications SET
                status = 'selected',
                selected_at = $1,
                snapshot_platform_rate = $2,
                snapshot_team_leader_rate = $3,
                snapshot_commission_rate = $4,
                snapshot_source = $5,
                updated_at = $1
            WHERE id = $6 AND order_id = $7 AND status = 'applied'
            RETURNING *
        "#,
    )
    .bind(now)
    .bind(snapshot.platform_rate)
    .bind(snapshot.team_leader_rate)
    .bind(snapshot.total_rate)
    .bind(snapshot.source)
    .bind(id)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(application)
}

/// Compare-and-set status change that also stamps the timestamp column belonging to the new status.
pub async fn transition_application(
    id: i64,
    from: ApplicationStatus,
    to: ApplicationStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Application>, sqlx::Error> {
    let stamp = match to {
        ApplicationStatus::Applied => "applied_at",
        ApplicationStatus::Selected => "selected_at",
        ApplicationStatus::Scheduled => "scheduled_at",
        ApplicationStatus::InProgress => "checked_in_at",
        ApplicationStatus::ClosingSubmitted => "closing_submitted_at",
        ApplicationStatus::Completed => "completed_at",
        ApplicationStatus::Rejected => "rejected_at",
    };
    let sql = format!(
        "UPDATE applications SET status = $1, {stamp} = $2, updated_at = $2 WHERE id = $3 AND status = $4 RETURNING *"
    );
    let application: Option<Application> =
        sqlx::query_as(&sql).bind(to).bind(Utc::now()).bind(id).bind(from).fetch_optional(conn).await?;
    if application.is_some() {
        debug!("🤝️ Application #{id} moved from {from} to {to}");
    }
    Ok(application)
}
