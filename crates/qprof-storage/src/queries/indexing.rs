//! Read-only scroll feeds for the external search index: flattened
//! activation projections pushed row-by-row into a consumer callback.
//! Each call is a fresh pass; rows arrive in no particular order.

use rusqlite::{params, Connection};

use qprof_core::errors::QProfResult;
use qprof_core::profile::{Impacts, IndexedActiveRule, Inheritance, Severity};

use crate::queries::placeholders;
use crate::to_storage_err;

const INDEXED_COLUMNS: &str = "ar.uuid, ar.rule_uuid, r.repository, r.rule_key,
    ar.rules_profile_uuid, ar.severity, ar.inheritance, ar.impacts, ar.prioritized";

/// Scroll every activation row.
pub fn scroll_all(
    conn: &Connection,
    consumer: &mut dyn FnMut(IndexedActiveRule),
) -> QProfResult<()> {
    scroll(
        conn,
        &format!(
            "SELECT {INDEXED_COLUMNS} FROM active_rules ar
             JOIN rules r ON r.uuid = ar.rule_uuid"
        ),
        params![],
        consumer,
    )
}

/// Scroll the activation rows with the given identities. Empty input
/// pushes nothing.
pub fn scroll_by_uuids(
    conn: &Connection,
    uuids: &[String],
    consumer: &mut dyn FnMut(IndexedActiveRule),
) -> QProfResult<()> {
    if uuids.is_empty() {
        return Ok(());
    }
    let marks = placeholders(uuids.len());
    scroll(
        conn,
        &format!(
            "SELECT {INDEXED_COLUMNS} FROM active_rules ar
             JOIN rules r ON r.uuid = ar.rule_uuid
             WHERE ar.uuid IN ({marks})"
        ),
        rusqlite::params_from_iter(uuids),
        consumer,
    )
}

/// Scroll the activation rows of one rule profile.
pub fn scroll_by_rule_profile(
    conn: &Connection,
    rule_profile_uuid: &str,
    consumer: &mut dyn FnMut(IndexedActiveRule),
) -> QProfResult<()> {
    scroll(
        conn,
        &format!(
            "SELECT {INDEXED_COLUMNS} FROM active_rules ar
             JOIN rules r ON r.uuid = ar.rule_uuid
             WHERE ar.rules_profile_uuid = ?1"
        ),
        params![rule_profile_uuid],
        consumer,
    )
}

fn scroll<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    consumer: &mut dyn FnMut(IndexedActiveRule),
) -> QProfResult<()> {
    let mut stmt = conn.prepare(sql).map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params, |row| Ok(row_to_indexed(row)))
        .map_err(|e| to_storage_err(e.to_string()))?;
    for row in rows {
        let indexed = row.map_err(|e| to_storage_err(e.to_string()))??;
        consumer(indexed);
    }
    Ok(())
}

fn row_to_indexed(row: &rusqlite::Row<'_>) -> QProfResult<IndexedActiveRule> {
    let severity: Option<String> = row.get(5).map_err(|e| to_storage_err(e.to_string()))?;
    let inheritance: String = row.get(6).map_err(|e| to_storage_err(e.to_string()))?;
    let impacts_json: String = row.get(7).map_err(|e| to_storage_err(e.to_string()))?;
    let impacts: Impacts = serde_json::from_str(&impacts_json)
        .map_err(|e| to_storage_err(format!("parse impacts: {e}")))?;

    Ok(IndexedActiveRule {
        uuid: row.get(0).map_err(|e| to_storage_err(e.to_string()))?,
        rule_uuid: row.get(1).map_err(|e| to_storage_err(e.to_string()))?,
        repository: row.get(2).map_err(|e| to_storage_err(e.to_string()))?,
        rule_key: row.get(3).map_err(|e| to_storage_err(e.to_string()))?,
        rule_profile_uuid: row.get(4).map_err(|e| to_storage_err(e.to_string()))?,
        severity: severity
            .as_deref()
            .map(|s| {
                Severity::parse(s).ok_or_else(|| to_storage_err(format!("parse severity '{s}'")))
            })
            .transpose()?,
        inheritance: Inheritance::parse(&inheritance)
            .ok_or_else(|| to_storage_err(format!("parse inheritance '{inheritance}'")))?,
        impacts,
        prioritized: row.get::<_, i32>(8).map_err(|e| to_storage_err(e.to_string()))? != 0,
    })
}
