//! # qprof-storage
//!
//! SQLite persistence for the quality-profile engine: connection pool,
//! schema migrations, and the query modules implementing the activation
//! store, diff/counting engine, change ledger, and indexing feed.

pub mod engine;
pub mod migrations;
pub mod pool;
pub mod queries;

pub use engine::StorageEngine;

use chrono::{DateTime, SecondsFormat, Utc};

use qprof_core::errors::{QProfError, StorageError};

/// Wrap a low-level SQLite failure into the workspace error type.
pub(crate) fn to_storage_err(message: String) -> QProfError {
    QProfError::Storage(StorageError::SqliteError { message })
}

/// Timestamps are persisted as RFC 3339 TEXT with fixed millisecond
/// precision so that lexicographic comparison in SQL matches
/// chronological order.
pub(crate) fn ts_to_text(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn ts_from_text(s: &str) -> Result<DateTime<Utc>, QProfError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| to_storage_err(format!("parse timestamp '{s}': {e}")))
}

/// Millisecond-truncated now, so values round-trip through the TEXT
/// column representation unchanged.
pub(crate) fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    match ts_from_text(&ts_to_text(now)) {
        Ok(truncated) => truncated,
        Err(_) => now,
    }
}
