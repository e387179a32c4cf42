//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open a transaction and pass `&mut tx` through without
//! any other changes.
//!
//! SQLite upgrades a reader to a writer lazily, and two transactions that both read before writing can deadlock. Every
//! transaction in this backend therefore starts with its guarded write, and only reads (to diagnose a failed guard,
//! say) once it holds the write lock.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, QueryBuilder, Sqlite, SqlitePool};

pub mod applications;
pub mod closing;
pub mod commission;
pub mod incidents;
pub mod ledger;
pub mod orders;

const SQLITE_DB_URL: &str = "sqlite://data/haul_store.db";

pub fn db_url() -> String {
    let result = env::var("HAUL_DATABASE_URL").unwrap_or_else(|_| {
        info!("HAUL_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// Appends `column IN (?, ?, ...)` to the query, binding each status.
pub(crate) fn push_in_clause<'a, T>(builder: &mut QueryBuilder<'a, Sqlite>, column: &str, values: &[T])
where T: sqlx::Encode<'a, Sqlite> + sqlx::Type<Sqlite> + Copy + Send + 'a {
    builder.push(column).push(" IN (");
    let mut separated = builder.separated(", ");
    for value in values {
        separated.push_bind(*value);
    }
    separated.push_unseparated(")");
}

/// True if the error is a violation of a UNIQUE constraint or unique index.
pub(crate) fn is_unique_violation(e: &SqlxError) -> bool {
    matches!(e, SqlxError::Database(db) if db.is_unique_violation())
}
