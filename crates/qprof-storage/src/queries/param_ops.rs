//! Parameter-value overrides attached to activation rows.

use rusqlite::{params, Connection, OptionalExtension};

use qprof_core::errors::{QProfError, QProfResult};
use qprof_core::profile::ActiveRuleParam;

use crate::queries::placeholders;
use crate::to_storage_err;

/// Insert a parameter override. The owning activation row and the
/// referenced rule-parameter definition must both be persisted.
pub fn insert_param(
    conn: &Connection,
    active_rule_uuid: &str,
    rule_param_uuid: &str,
    value: Option<String>,
) -> QProfResult<ActiveRuleParam> {
    let active_rule_exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM active_rules WHERE uuid = ?1)",
            params![active_rule_uuid],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    if !active_rule_exists {
        return Err(QProfError::NotPersisted {
            entity: "active rule",
        });
    }

    // Denormalize the parameter name from its definition; a missing
    // definition is the caller's contract violation.
    let name: Option<String> = conn
        .query_row(
            "SELECT name FROM rule_params WHERE uuid = ?1",
            params![rule_param_uuid],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    let Some(key) = name else {
        return Err(QProfError::NotPersisted {
            entity: "rule parameter",
        });
    };

    let param = ActiveRuleParam {
        uuid: uuid::Uuid::new_v4().to_string(),
        active_rule_uuid: active_rule_uuid.to_string(),
        rule_param_uuid: rule_param_uuid.to_string(),
        key,
        value,
    };
    conn.execute(
        "INSERT INTO active_rule_params (uuid, active_rule_uuid, rule_param_uuid, key, value)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            param.uuid,
            param.active_rule_uuid,
            param.rule_param_uuid,
            param.key,
            param.value,
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(param)
}

/// Rewrite the value of an existing override.
pub fn update_param(conn: &Connection, param: &ActiveRuleParam) -> QProfResult<()> {
    let rows = conn
        .execute(
            "UPDATE active_rule_params SET value = ?2 WHERE uuid = ?1",
            params![param.uuid, param.value],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    if rows == 0 {
        return Err(QProfError::NotPersisted {
            entity: "active rule parameter",
        });
    }
    Ok(())
}

/// Delete one override by uuid. Idempotent.
pub fn delete_param(conn: &Connection, uuid: &str) -> QProfResult<()> {
    conn.execute("DELETE FROM active_rule_params WHERE uuid = ?1", params![uuid])
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Overrides of one activation row.
pub fn select_by_active_rule(
    conn: &Connection,
    active_rule_uuid: &str,
) -> QProfResult<Vec<ActiveRuleParam>> {
    query_params(
        conn,
        "SELECT uuid, active_rule_uuid, rule_param_uuid, key, value
         FROM active_rule_params WHERE active_rule_uuid = ?1",
        params![active_rule_uuid],
    )
}

/// Overrides of a set of activation rows. Empty input yields empty.
pub fn select_by_active_rules(
    conn: &Connection,
    active_rule_uuids: &[String],
) -> QProfResult<Vec<ActiveRuleParam>> {
    if active_rule_uuids.is_empty() {
        return Ok(Vec::new());
    }
    let marks = placeholders(active_rule_uuids.len());
    query_params(
        conn,
        &format!(
            "SELECT uuid, active_rule_uuid, rule_param_uuid, key, value
             FROM active_rule_params WHERE active_rule_uuid IN ({marks})"
        ),
        rusqlite::params_from_iter(active_rule_uuids),
    )
}

/// All overrides under the given profile views.
pub fn select_by_profiles(
    conn: &Connection,
    profile_keys: &[String],
) -> QProfResult<Vec<ActiveRuleParam>> {
    if profile_keys.is_empty() {
        return Ok(Vec::new());
    }
    let marks = placeholders(profile_keys.len());
    query_params(
        conn,
        &format!(
            "SELECT arp.uuid, arp.active_rule_uuid, arp.rule_param_uuid, arp.key, arp.value
             FROM active_rule_params arp
             JOIN active_rules ar ON ar.uuid = arp.active_rule_uuid
             JOIN profiles p ON p.rules_profile_uuid = ar.rules_profile_uuid
             WHERE p.key IN ({marks})"
        ),
        rusqlite::params_from_iter(profile_keys),
    )
}

/// Bulk delete by owning activation rows. Empty input is a no-op.
pub fn delete_by_active_rules(conn: &Connection, active_rule_uuids: &[String]) -> QProfResult<()> {
    if active_rule_uuids.is_empty() {
        return Ok(());
    }
    let marks = placeholders(active_rule_uuids.len());
    conn.execute(
        &format!("DELETE FROM active_rule_params WHERE active_rule_uuid IN ({marks})"),
        rusqlite::params_from_iter(active_rule_uuids),
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Delete every override referencing one rule-parameter definition,
/// across all profiles (used when a parameter is dropped from a rule).
pub fn delete_by_rule_param(conn: &Connection, rule_param_uuid: &str) -> QProfResult<()> {
    conn.execute(
        "DELETE FROM active_rule_params WHERE rule_param_uuid = ?1",
        params![rule_param_uuid],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Bulk delete by owning rule profiles. Empty input is a no-op.
pub fn delete_by_rule_profiles(conn: &Connection, rule_profile_uuids: &[String]) -> QProfResult<()> {
    if rule_profile_uuids.is_empty() {
        return Ok(());
    }
    let marks = placeholders(rule_profile_uuids.len());
    conn.execute(
        &format!(
            "DELETE FROM active_rule_params WHERE active_rule_uuid IN
             (SELECT uuid FROM active_rules WHERE rules_profile_uuid IN ({marks}))"
        ),
        rusqlite::params_from_iter(rule_profile_uuids),
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

fn query_params<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> QProfResult<Vec<ActiveRuleParam>> {
    let mut stmt = conn.prepare(sql).map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params, |row| {
            Ok(ActiveRuleParam {
                uuid: row.get(0)?,
                active_rule_uuid: row.get(1)?,
                rule_param_uuid: row.get(2)?,
                key: row.get(3)?,
                value: row.get(4)?,
            })
        })
        .map_err(|e| to_storage_err(e.to_string()))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))
}
