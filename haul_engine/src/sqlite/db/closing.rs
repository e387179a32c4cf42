use chrono::Utc;
use log::*;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{ClosingReport, NewClosingReport},
    helpers::SettlementCalculation,
};

pub async fn insert_closing_report(
    order_id: i64,
    application_id: i64,
    helper_id: i64,
    report: NewClosingReport,
    calculation: &SettlementCalculation,
    conn: &mut SqliteConnection,
) -> Result<ClosingReport, sqlx::Error> {
    let report: ClosingReport = sqlx::query_as(
        r#"
            INSERT INTO closing_reports (
                order_id,
                application_id,
                helper_id,
                delivered_count,
                returned_count,
                etc_count,
                etc_unit_price,
                extra_costs,
                memo,
                supply_amount,
                vat_amount,
                total_amount,
                min_total_applied,
                submitted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(application_id)
    .bind(helper_id)
    .bind(report.delivered_count)
    .bind(report.returned_count)
    .bind(report.etc_count)
    .bind(report.etc_unit_price)
    .bind(Json(report.extra_costs))
    .bind(report.memo)
    .bind(calculation.supply_amount)
    .bind(calculation.vat_amount)
    .bind(calculation.total_amount)
    .bind(calculation.min_total_applied)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!("🧾️ Closing report #{} stored for order #{order_id}. Total {}", report.id, report.total_amount);
    Ok(report)
}

pub async fn fetch_closing_report(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ClosingReport>, sqlx::Error> {
    let report =
        sqlx::query_as("SELECT * FROM closing_reports WHERE order_id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(report)
}
