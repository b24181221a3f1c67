//! v002: Change-ledger tables — profile_changes, rule_changes,
//! rule_impact_changes.

use rusqlite::Connection;

use qprof_core::errors::QProfResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> QProfResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS rule_changes (
            uuid           TEXT PRIMARY KEY,
            rule_uuid      TEXT NOT NULL,
            old_attribute  TEXT,
            new_attribute  TEXT
        );

        CREATE TABLE IF NOT EXISTS rule_impact_changes (
            rule_change_uuid TEXT NOT NULL REFERENCES rule_changes(uuid) ON DELETE CASCADE,
            old_quality      TEXT,
            new_quality      TEXT,
            old_severity     TEXT,
            new_severity     TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_impact_changes_owner
            ON rule_impact_changes(rule_change_uuid);

        CREATE TABLE IF NOT EXISTS profile_changes (
            uuid                TEXT PRIMARY KEY,
            rules_profile_uuid  TEXT NOT NULL,
            user_uuid           TEXT,
            change_type         TEXT NOT NULL,
            data                TEXT,
            rule_change_uuid    TEXT REFERENCES rule_changes(uuid),
            created_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_profile_changes_profile
            ON profile_changes(rules_profile_uuid, created_at);
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
