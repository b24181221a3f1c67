//! Insert, update, deactivate, bulk ops, and lookups for activation
//! rows. Every regular lookup excludes activations whose rule has
//! REMOVED status; `select_removed` is the dedicated inclusion path.

use rusqlite::{params, Connection, OptionalExtension};

use qprof_core::errors::{QProfError, QProfResult};
use qprof_core::profile::{ActiveRule, ActiveRuleKey, Impacts, Inheritance, NewActiveRule, Severity};
use qprof_core::rule::RuleStatus;

use crate::queries::placeholders;
use crate::{now_millis, to_storage_err, ts_from_text, ts_to_text};

/// Insert a new activation. The caller must reference a persisted
/// profile and rule; the (profile, rule) pair must not be active yet.
pub fn insert_active_rule(
    conn: &Connection,
    key: &ActiveRuleKey,
    new: NewActiveRule,
) -> QProfResult<ActiveRule> {
    if !rule_profile_exists(conn, &key.rules_profile_uuid)? {
        return Err(QProfError::NotPersisted {
            entity: "rule profile",
        });
    }
    if !rule_exists(conn, &key.rule_uuid)? {
        return Err(QProfError::NotPersisted { entity: "rule" });
    }
    if select_by_key(conn, key)?.is_some() {
        return Err(QProfError::AlreadyPersisted {
            entity: "active rule",
        });
    }

    let now = now_millis();
    let active_rule = ActiveRule {
        uuid: uuid::Uuid::new_v4().to_string(),
        rules_profile_uuid: key.rules_profile_uuid.clone(),
        rule_uuid: key.rule_uuid.clone(),
        severity: new.severity,
        impacts: new.impacts,
        inheritance: new.inheritance.unwrap_or(Inheritance::None),
        prioritized: new.prioritized,
        created_at: now,
        updated_at: now,
    };

    let impacts_json = serde_json::to_string(&active_rule.impacts)
        .map_err(|e| to_storage_err(e.to_string()))?;
    conn.execute(
        "INSERT INTO active_rules (
            uuid, rules_profile_uuid, rule_uuid, severity, impacts,
            inheritance, prioritized, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            active_rule.uuid,
            active_rule.rules_profile_uuid,
            active_rule.rule_uuid,
            active_rule.severity.map(|s| s.as_str()),
            impacts_json,
            active_rule.inheritance.as_str(),
            active_rule.prioritized as i32,
            ts_to_text(active_rule.created_at),
            ts_to_text(active_rule.updated_at),
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(active_rule)
}

/// Rewrite an existing activation. `created_at` stays untouched,
/// `updated_at` is refreshed server-side.
pub fn update_active_rule(conn: &Connection, active_rule: &ActiveRule) -> QProfResult<ActiveRule> {
    if !rule_profile_exists(conn, &active_rule.rules_profile_uuid)? {
        return Err(QProfError::NotPersisted {
            entity: "rule profile",
        });
    }
    if !rule_exists(conn, &active_rule.rule_uuid)? {
        return Err(QProfError::NotPersisted { entity: "rule" });
    }

    let updated_at = now_millis();
    let impacts_json =
        serde_json::to_string(&active_rule.impacts).map_err(|e| to_storage_err(e.to_string()))?;
    let rows = conn
        .execute(
            "UPDATE active_rules SET
                severity = ?2, impacts = ?3, inheritance = ?4,
                prioritized = ?5, updated_at = ?6
             WHERE uuid = ?1",
            params![
                active_rule.uuid,
                active_rule.severity.map(|s| s.as_str()),
                impacts_json,
                active_rule.inheritance.as_str(),
                active_rule.prioritized as i32,
                ts_to_text(updated_at),
            ],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    if rows == 0 {
        return Err(QProfError::NotPersisted {
            entity: "active rule",
        });
    }

    let mut result = active_rule.clone();
    result.updated_at = updated_at;
    Ok(result)
}

/// Deactivate one (profile, rule) pair. Idempotent: a missing
/// activation is a no-op. Parameter overrides go with the row.
pub fn delete_active_rule(conn: &Connection, key: &ActiveRuleKey) -> QProfResult<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(format!("delete_active_rule begin: {e}")))?;
    let result = (|| -> QProfResult<()> {
        tx.execute(
            "DELETE FROM active_rule_params WHERE active_rule_uuid IN
             (SELECT uuid FROM active_rules WHERE rules_profile_uuid = ?1 AND rule_uuid = ?2)",
            params![key.rules_profile_uuid, key.rule_uuid],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        tx.execute(
            "DELETE FROM active_rules WHERE rules_profile_uuid = ?1 AND rule_uuid = ?2",
            params![key.rules_profile_uuid, key.rule_uuid],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(())
    })();
    match result {
        Ok(()) => {
            tx.commit()
                .map_err(|e| to_storage_err(format!("delete_active_rule commit: {e}")))?;
            Ok(())
        }
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

/// Bulk deactivation by owning rule profile. Empty input is a no-op;
/// the whole batch is one transaction.
pub fn delete_by_rule_profiles(conn: &Connection, rule_profile_uuids: &[String]) -> QProfResult<()> {
    if rule_profile_uuids.is_empty() {
        return Ok(());
    }
    let marks = placeholders(rule_profile_uuids.len());
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(format!("delete_by_rule_profiles begin: {e}")))?;
    let result = (|| -> QProfResult<()> {
        tx.execute(
            &format!(
                "DELETE FROM active_rule_params WHERE active_rule_uuid IN
                 (SELECT uuid FROM active_rules WHERE rules_profile_uuid IN ({marks}))"
            ),
            rusqlite::params_from_iter(rule_profile_uuids),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        tx.execute(
            &format!("DELETE FROM active_rules WHERE rules_profile_uuid IN ({marks})"),
            rusqlite::params_from_iter(rule_profile_uuids),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(())
    })();
    match result {
        Ok(()) => {
            tx.commit()
                .map_err(|e| to_storage_err(format!("delete_by_rule_profiles commit: {e}")))?;
            Ok(())
        }
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

/// Bulk deactivation by row uuid. Empty input is a no-op.
pub fn delete_by_uuids(conn: &Connection, uuids: &[String]) -> QProfResult<()> {
    if uuids.is_empty() {
        return Ok(());
    }
    let marks = placeholders(uuids.len());
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(format!("delete_by_uuids begin: {e}")))?;
    let result = (|| -> QProfResult<()> {
        tx.execute(
            &format!(
                "DELETE FROM active_rule_params WHERE active_rule_uuid IN ({marks})"
            ),
            rusqlite::params_from_iter(uuids),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        tx.execute(
            &format!("DELETE FROM active_rules WHERE uuid IN ({marks})"),
            rusqlite::params_from_iter(uuids),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(())
    })();
    match result {
        Ok(()) => {
            tx.commit()
                .map_err(|e| to_storage_err(format!("delete_by_uuids commit: {e}")))?;
            Ok(())
        }
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

const ACTIVE_RULE_COLUMNS: &str = "ar.uuid, ar.rules_profile_uuid, ar.rule_uuid, ar.severity,
    ar.impacts, ar.inheritance, ar.prioritized, ar.created_at, ar.updated_at";

/// Lookup by natural key. Does not filter on rule status: the row
/// itself is addressed directly.
pub fn select_by_key(conn: &Connection, key: &ActiveRuleKey) -> QProfResult<Option<ActiveRule>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {ACTIVE_RULE_COLUMNS} FROM active_rules ar
             WHERE ar.rules_profile_uuid = ?1 AND ar.rule_uuid = ?2"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let result = stmt
        .query_row(params![key.rules_profile_uuid, key.rule_uuid], |row| {
            Ok(row_to_active_rule(row))
        })
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    result.transpose()
}

/// Activations of one rule profile, removed rules excluded.
pub fn select_by_rule_profile(
    conn: &Connection,
    rule_profile_uuid: &str,
) -> QProfResult<Vec<ActiveRule>> {
    query_active_rules(
        conn,
        &format!(
            "SELECT {ACTIVE_RULE_COLUMNS} FROM active_rules ar
             JOIN rules r ON r.uuid = ar.rule_uuid AND r.status != 'REMOVED'
             WHERE ar.rules_profile_uuid = ?1"
        ),
        params![rule_profile_uuid],
    )
}

/// Activations of one rule across all profiles, removed rules excluded.
pub fn select_by_rule(conn: &Connection, rule_uuid: &str) -> QProfResult<Vec<ActiveRule>> {
    query_active_rules(
        conn,
        &format!(
            "SELECT {ACTIVE_RULE_COLUMNS} FROM active_rules ar
             JOIN rules r ON r.uuid = ar.rule_uuid AND r.status != 'REMOVED'
             WHERE ar.rule_uuid = ?1"
        ),
        params![rule_uuid],
    )
}

/// Activations in the given profiles whose rule carries the given
/// lifecycle status.
pub fn select_by_rule_status_and_profiles(
    conn: &Connection,
    status: RuleStatus,
    profile_keys: &[String],
) -> QProfResult<Vec<ActiveRule>> {
    if profile_keys.is_empty() {
        return Ok(Vec::new());
    }
    let marks = placeholders(profile_keys.len());
    let sql = format!(
        "SELECT {ACTIVE_RULE_COLUMNS} FROM active_rules ar
         JOIN rules r ON r.uuid = ar.rule_uuid AND r.status = ?
         JOIN profiles p ON p.rules_profile_uuid = ar.rules_profile_uuid
         WHERE p.key IN ({marks})"
    );
    let mut values: Vec<String> = vec![status.as_str().to_string()];
    values.extend(profile_keys.iter().cloned());
    query_active_rules(conn, &sql, rusqlite::params_from_iter(values))
}

/// Rule uuids of prioritized activations in the given profiles,
/// removed rules excluded.
pub fn select_prioritized_rules(
    conn: &Connection,
    profile_keys: &[String],
) -> QProfResult<Vec<String>> {
    if profile_keys.is_empty() {
        return Ok(Vec::new());
    }
    let marks = placeholders(profile_keys.len());
    let sql = format!(
        "SELECT DISTINCT ar.rule_uuid FROM active_rules ar
         JOIN rules r ON r.uuid = ar.rule_uuid AND r.status != 'REMOVED'
         JOIN profiles p ON p.rules_profile_uuid = ar.rules_profile_uuid
         WHERE p.key IN ({marks}) AND ar.prioritized = 1"
    );
    let mut stmt = conn.prepare(&sql).map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(profile_keys), |row| {
            row.get::<_, String>(0)
        })
        .map_err(|e| to_storage_err(e.to_string()))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))
}

/// The dedicated removed-rules path: activations whose rule has been
/// soft-deleted from the registry.
pub fn select_removed(conn: &Connection, rule_profile_uuid: &str) -> QProfResult<Vec<ActiveRule>> {
    query_active_rules(
        conn,
        &format!(
            "SELECT {ACTIVE_RULE_COLUMNS} FROM active_rules ar
             JOIN rules r ON r.uuid = ar.rule_uuid AND r.status = 'REMOVED'
             WHERE ar.rules_profile_uuid = ?1"
        ),
        params![rule_profile_uuid],
    )
}

fn rule_profile_exists(conn: &Connection, uuid: &str) -> QProfResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM rules_profiles WHERE uuid = ?1)",
        params![uuid],
        |row| row.get::<_, bool>(0),
    )
    .map_err(|e| to_storage_err(e.to_string()))
}

fn rule_exists(conn: &Connection, uuid: &str) -> QProfResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM rules WHERE uuid = ?1)",
        params![uuid],
        |row| row.get::<_, bool>(0),
    )
    .map_err(|e| to_storage_err(e.to_string()))
}

fn query_active_rules<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> QProfResult<Vec<ActiveRule>> {
    let mut stmt = conn.prepare(sql).map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params, |row| Ok(row_to_active_rule(row)))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut active_rules = Vec::new();
    for row in rows {
        active_rules.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(active_rules)
}

/// Parse a row from the active_rules table.
pub(crate) fn row_to_active_rule(row: &rusqlite::Row<'_>) -> QProfResult<ActiveRule> {
    let severity: Option<String> = row.get(3).map_err(|e| to_storage_err(e.to_string()))?;
    let impacts_json: String = row.get(4).map_err(|e| to_storage_err(e.to_string()))?;
    let inheritance: String = row.get(5).map_err(|e| to_storage_err(e.to_string()))?;
    let created_at: String = row.get(7).map_err(|e| to_storage_err(e.to_string()))?;
    let updated_at: String = row.get(8).map_err(|e| to_storage_err(e.to_string()))?;

    let impacts: Impacts = serde_json::from_str(&impacts_json)
        .map_err(|e| to_storage_err(format!("parse impacts: {e}")))?;

    Ok(ActiveRule {
        uuid: row.get(0).map_err(|e| to_storage_err(e.to_string()))?,
        rules_profile_uuid: row.get(1).map_err(|e| to_storage_err(e.to_string()))?,
        rule_uuid: row.get(2).map_err(|e| to_storage_err(e.to_string()))?,
        severity: severity
            .as_deref()
            .map(|s| {
                Severity::parse(s).ok_or_else(|| to_storage_err(format!("parse severity '{s}'")))
            })
            .transpose()?,
        impacts,
        inheritance: Inheritance::parse(&inheritance)
            .ok_or_else(|| to_storage_err(format!("parse inheritance '{inheritance}'")))?,
        prioritized: row.get::<_, i32>(6).map_err(|e| to_storage_err(e.to_string()))? != 0,
        created_at: ts_from_text(&created_at)?,
        updated_at: ts_from_text(&updated_at)?,
    })
}
