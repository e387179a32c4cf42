use chrono::{DateTime, Utc};
use log::*;
use sqlx::{QueryBuilder, SqliteConnection};

use super::push_in_clause;
use crate::db_types::{ApprovalStatus, CommissionSnapshot, NewOrder, Order, OrderStatusType};

/// Inserts a new order in `awaiting_deposit` status. The base price per box is the posted price per unit.
pub async fn insert_order(
    requester_id: i64,
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    let now = Utc::now();
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                requester_id,
                title,
                memo,
                price_per_unit,
                max_helpers,
                base_price_per_box,
                min_total,
                scheduled_start,
                scheduled_end,
                deposit_amount,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $4, $6, $7, $8, $9, $10, $10)
            RETURNING *;
        "#,
    )
    .bind(requester_id)
    .bind(order.title)
    .bind(order.memo)
    .bind(order.price_per_unit)
    .bind(order.max_helpers)
    .bind(order.min_total)
    .bind(order.scheduled_start)
    .bind(order.scheduled_end)
    .bind(order.deposit_amount)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("📦️ Order #{} inserted for requester #{requester_id}", order.id);
    Ok(order)
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_open_orders(conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE approval_status = 'approved'
              AND status IN ('registered', 'matching')
              AND hidden_at IS NULL
              AND current_helpers < max_helpers
            ORDER BY created_at ASC
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

pub async fn fetch_orders_for_requester(
    requester_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE requester_id = $1 ORDER BY created_at ASC")
        .bind(requester_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Compare-and-set status change. Returns `None` (and changes nothing) if the order is not in one of the `from`
/// statuses.
pub async fn transition_order(
    id: i64,
    from: &[OrderStatusType],
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE orders SET status = ");
    builder.push_bind(to).push(", updated_at = ").push_bind(Utc::now());
    builder.push(" WHERE id = ").push_bind(id).push(" AND ");
    push_in_clause(&mut builder, "status", from);
    builder.push(" RETURNING *");
    trace!("📦️ Executing query: {}", builder.sql());
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    if let Some(o) = &order {
        debug!("📦️ Order #{id} is now {}", o.status);
    }
    Ok(order)
}

pub async fn set_deposit_payment(
    id: i64,
    payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET deposit_payment_id = $1, updated_at = $2
            WHERE id = $3 AND status = 'awaiting_deposit'
            RETURNING *
        "#,
    )
    .bind(payment_id)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn set_approval_status(
    id: i64,
    status: ApprovalStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("UPDATE orders SET approval_status = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// The order half of the match commit point.
///
/// Claims one unit of capacity, records the matched helper, freezes the commission and pricing snapshots and moves the
/// order to `scheduled`, all guarded by a single `WHERE` clause. Returns `None` if the order was full, already matched,
/// or not open for matching.
pub async fn claim_match(
    id: i64,
    helper_id: i64,
    snapshot: &CommissionSnapshot,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                current_helpers = current_helpers + 1,
                matched_helper_id = $1,
                status = 'scheduled',
                snapshot_platform_rate = $2,
                snapshot_team_leader_rate = $3,
                snapshot_commission_rate = $4,
                final_price_per_box = price_per_unit,
                updated_at = $5
            WHERE id = $6
              AND current_helpers < max_helpers
              AND matched_helper_id IS NULL
              AND approval_status = 'approved'
              AND status IN ('registered', 'matching')
            RETURNING *
        "#,
    )
    .bind(helper_id)
    .bind(snapshot.platform_rate)
    .bind(snapshot.team_leader_rate)
    .bind(snapshot.total_rate)
    .bind(at)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Moves an in-progress order to `closing_submitted` and records whether the minimum total raised its supply amount.
pub async fn record_closing(
    id: i64,
    min_total_applied: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET status = 'closing_submitted', min_total_applied = $1, updated_at = $2
            WHERE id = $3 AND status = 'in_progress'
            RETURNING *
        "#,
    )
    .bind(min_total_applied)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Settles the order, provided it is in a settleable state and has no open incidents.
pub async fn settle_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET status = 'settled', updated_at = $1
            WHERE id = $2
              AND status IN ('closing_submitted', 'dispute_resolved', 'dispute_rejected')
              AND NOT EXISTS (
                  SELECT 1 FROM incidents WHERE incidents.order_id = $2 AND incidents.status IN ('submitted', 'reviewing')
              )
            RETURNING *
        "#,
    )
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_visible_settled_orders(conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE status = 'settled' AND hidden_at IS NULL")
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

pub async fn hide_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("UPDATE orders SET hidden_at = $1 WHERE id = $2 AND hidden_at IS NULL RETURNING *")
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}
