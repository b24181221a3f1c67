//! Minimal rule registry rows: identity, lifecycle status, parameter
//! definitions. Rule definitions proper live outside this engine.

use rusqlite::{params, Connection, OptionalExtension};

use qprof_core::errors::{QProfError, QProfResult};
use qprof_core::rule::{RuleParamDef, RuleRef, RuleStatus};

use crate::{to_storage_err, ts_from_text, ts_to_text};

/// Register a rule.
pub fn insert_rule(conn: &Connection, rule: &RuleRef) -> QProfResult<()> {
    conn.execute(
        "INSERT INTO rules (uuid, repository, rule_key, language, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            rule.uuid,
            rule.repository,
            rule.rule_key,
            rule.language,
            rule.status.as_str(),
            ts_to_text(rule.created_at),
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Move a rule through its lifecycle, e.g. to REMOVED on soft delete.
pub fn update_rule_status(conn: &Connection, rule_uuid: &str, status: RuleStatus) -> QProfResult<()> {
    let rows = conn
        .execute(
            "UPDATE rules SET status = ?2 WHERE uuid = ?1",
            params![rule_uuid, status.as_str()],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    if rows == 0 {
        return Err(QProfError::NotPersisted { entity: "rule" });
    }
    Ok(())
}

/// Get a rule by uuid.
pub fn select_rule(conn: &Connection, uuid: &str) -> QProfResult<Option<RuleRef>> {
    let mut stmt = conn
        .prepare(
            "SELECT uuid, repository, rule_key, language, status, created_at
             FROM rules WHERE uuid = ?1",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let result = stmt
        .query_row(params![uuid], |row| Ok(row_to_rule(row)))
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    result.transpose()
}

/// Get a rule by (repository, key).
pub fn select_rule_by_key(
    conn: &Connection,
    repository: &str,
    rule_key: &str,
) -> QProfResult<Option<RuleRef>> {
    let mut stmt = conn
        .prepare(
            "SELECT uuid, repository, rule_key, language, status, created_at
             FROM rules WHERE repository = ?1 AND rule_key = ?2",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let result = stmt
        .query_row(params![repository, rule_key], |row| Ok(row_to_rule(row)))
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    result.transpose()
}

/// Register a parameter definition. The owning rule must be persisted.
pub fn insert_rule_param(conn: &Connection, param: &RuleParamDef) -> QProfResult<()> {
    let rule_exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM rules WHERE uuid = ?1)",
            params![param.rule_uuid],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    if !rule_exists {
        return Err(QProfError::NotPersisted { entity: "rule" });
    }
    conn.execute(
        "INSERT INTO rule_params (uuid, rule_uuid, name, default_value)
         VALUES (?1, ?2, ?3, ?4)",
        params![param.uuid, param.rule_uuid, param.name, param.default_value],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Parameter definitions of one rule.
pub fn select_rule_params(conn: &Connection, rule_uuid: &str) -> QProfResult<Vec<RuleParamDef>> {
    let mut stmt = conn
        .prepare(
            "SELECT uuid, rule_uuid, name, default_value FROM rule_params WHERE rule_uuid = ?1",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![rule_uuid], |row| {
            Ok(RuleParamDef {
                uuid: row.get(0)?,
                rule_uuid: row.get(1)?,
                name: row.get(2)?,
                default_value: row.get(3)?,
            })
        })
        .map_err(|e| to_storage_err(e.to_string()))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))
}

fn row_to_rule(row: &rusqlite::Row<'_>) -> QProfResult<RuleRef> {
    let status: String = row.get(4).map_err(|e| to_storage_err(e.to_string()))?;
    let created_at: String = row.get(5).map_err(|e| to_storage_err(e.to_string()))?;
    Ok(RuleRef {
        uuid: row.get(0).map_err(|e| to_storage_err(e.to_string()))?,
        repository: row.get(1).map_err(|e| to_storage_err(e.to_string()))?,
        rule_key: row.get(2).map_err(|e| to_storage_err(e.to_string()))?,
        language: row.get(3).map_err(|e| to_storage_err(e.to_string()))?,
        status: RuleStatus::parse(&status)
            .ok_or_else(|| to_storage_err(format!("parse rule status '{status}'")))?,
        created_at: ts_from_text(&created_at)?,
    })
}
