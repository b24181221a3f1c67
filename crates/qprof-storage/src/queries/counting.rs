//! Set-difference and aggregate counting over activation rows.

use std::collections::HashMap;

use rusqlite::{params, Connection};

use qprof_core::profile::ActiveRuleCountQuery;
use qprof_core::errors::QProfResult;
use qprof_core::rule::RuleStatus;

use crate::queries::placeholders;
use crate::to_storage_err;

/// Number of rules active and non-removed in `compared_to_uuid` that
/// are not active in `rule_profile_uuid`. One-directional: rules
/// unique to the left-hand profile are not counted.
pub fn count_missing_rules(
    conn: &Connection,
    rule_profile_uuid: &str,
    compared_to_uuid: &str,
) -> QProfResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM active_rules ar
         JOIN rules r ON r.uuid = ar.rule_uuid AND r.status != 'REMOVED'
         WHERE ar.rules_profile_uuid = ?2
           AND ar.rule_uuid NOT IN (
               SELECT ar2.rule_uuid FROM active_rules ar2
               JOIN rules r2 ON r2.uuid = ar2.rule_uuid AND r2.status != 'REMOVED'
               WHERE ar2.rules_profile_uuid = ?1)",
        params![rule_profile_uuid, compared_to_uuid],
        |row| row.get(0),
    )
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Aggregate activation counts per profile key. The profile set is
/// required: empty input yields an empty map, and profiles with zero
/// matching rows are omitted. With no status filter every non-removed
/// activation counts; `RuleStatus::Removed` is the only filter that
/// sees removed rules.
pub fn count_by_query(
    conn: &Connection,
    query: &ActiveRuleCountQuery,
) -> QProfResult<HashMap<String, i64>> {
    if query.profile_keys.is_empty() {
        return Ok(HashMap::new());
    }

    let marks = placeholders(query.profile_keys.len());
    let mut sql = format!(
        "SELECT p.key, COUNT(ar.uuid) FROM active_rules ar
         JOIN profiles p ON p.rules_profile_uuid = ar.rules_profile_uuid
         JOIN rules r ON r.uuid = ar.rule_uuid
         WHERE p.key IN ({marks})"
    );
    let mut values: Vec<String> = query.profile_keys.clone();

    match query.rule_status {
        Some(status) => {
            sql.push_str(" AND r.status = ?");
            values.push(status.as_str().to_string());
        }
        None => {
            sql.push_str(" AND r.status != ?");
            values.push(RuleStatus::Removed.as_str().to_string());
        }
    }
    if let Some(inheritance) = query.inheritance {
        sql.push_str(" AND ar.inheritance = ?");
        values.push(inheritance.as_str().to_string());
    }
    sql.push_str(" GROUP BY p.key");

    let mut stmt = conn.prepare(&sql).map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(values), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut counts = HashMap::new();
    for row in rows {
        let (key, count) = row.map_err(|e| to_storage_err(e.to_string()))?;
        counts.insert(key, count);
    }
    Ok(counts)
}
