//! Versioned schema migrations, applied in order at engine startup.
//! Every migration is idempotent (CREATE ... IF NOT EXISTS) and the
//! applied version is recorded in `schema_version`.

mod v001_initial_schema;
mod v002_change_tables;

use rusqlite::Connection;

use qprof_core::errors::{QProfError, QProfResult, StorageError};

use crate::to_storage_err;

type Migration = (u32, fn(&Connection) -> QProfResult<()>);

const MIGRATIONS: &[Migration] = &[
    (1, v001_initial_schema::migrate),
    (2, v002_change_tables::migrate),
];

/// Run all pending migrations on the given connection.
pub fn run_migrations(conn: &Connection) -> QProfResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version     INTEGER PRIMARY KEY,
            applied_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    let current = current_version(conn)?;
    for (version, migrate) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        migrate(conn).map_err(|e| {
            QProfError::Storage(StorageError::MigrationFailed {
                version: *version,
                reason: e.to_string(),
            })
        })?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        tracing::debug!(version, "applied schema migration");
    }
    Ok(())
}

/// Highest applied migration version, 0 on a fresh database.
pub fn current_version(conn: &Connection) -> QProfResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get::<_, u32>(0),
    )
    .map_err(|e| to_storage_err(e.to_string()))
}
