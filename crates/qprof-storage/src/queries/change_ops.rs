//! Append-only change ledger: timestamp-owned inserts, batch moments,
//! ranged retrieval, purge.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};

use qprof_core::change::{Change, ChangeQuery, NewChange, RuleChange};
use qprof_core::constants::MAX_CHANGE_PAGE_SIZE;
use qprof_core::errors::{QProfError, QProfResult};
use qprof_core::profile::{CleanCodeAttribute, ImpactSeverity, SoftwareQuality};

use crate::queries::placeholders;
use crate::{now_millis, to_storage_err, ts_from_text, ts_to_text};

/// Append one entry. The ledger owns the timestamp: a pre-populated
/// `created_at` is rejected before anything is written.
pub fn append(conn: &Connection, change: NewChange) -> QProfResult<Change> {
    let mut appended = append_batch(conn, vec![change])?;
    Ok(appended.remove(0))
}

/// Append several entries as one moment: one timestamp read, one
/// transaction, identical `created_at` on every entry, distinct
/// identities. Empty input is a no-op.
pub fn append_batch(conn: &Connection, changes: Vec<NewChange>) -> QProfResult<Vec<Change>> {
    if changes.is_empty() {
        return Ok(Vec::new());
    }
    for change in &changes {
        if change.created_at.is_some() {
            return Err(QProfError::invalid_state(
                "change timestamps are assigned by the ledger",
            ));
        }
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(format!("append_batch begin: {e}")))?;

    let result = (|| -> QProfResult<Vec<Change>> {
        let created_at = next_timestamp(&tx)?;
        let mut appended = Vec::with_capacity(changes.len());
        for change in changes {
            appended.push(insert_change(&tx, change, created_at)?);
        }
        Ok(appended)
    })();

    match result {
        Ok(appended) => {
            tx.commit()
                .map_err(|e| to_storage_err(format!("append_batch commit: {e}")))?;
            Ok(appended)
        }
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

/// The timestamp for the next batch: wall clock, advanced past the
/// current ledger maximum. Entries of one batch share the value;
/// entries of a later batch always sort strictly after, even when both
/// land in the same clock millisecond or the clock steps backwards.
/// Read inside the insert transaction.
fn next_timestamp(conn: &Connection) -> QProfResult<DateTime<Utc>> {
    let now = now_millis();
    let max: Option<String> = conn
        .query_row("SELECT MAX(created_at) FROM profile_changes", [], |row| {
            row.get(0)
        })
        .map_err(|e| to_storage_err(e.to_string()))?;
    match max {
        Some(text) => {
            let ledger_max = ts_from_text(&text)?;
            if ledger_max >= now {
                if ledger_max > now {
                    tracing::warn!(
                        %ledger_max,
                        %now,
                        "clock behind ledger maximum, advancing change timestamp"
                    );
                }
                Ok(ledger_max + chrono::Duration::milliseconds(1))
            } else {
                Ok(now)
            }
        }
        None => Ok(now),
    }
}

fn insert_change(
    conn: &Connection,
    change: NewChange,
    created_at: DateTime<Utc>,
) -> QProfResult<Change> {
    let rule_change = change
        .rule_change
        .map(|rc| -> QProfResult<RuleChange> {
            let stored = RuleChange {
                uuid: uuid::Uuid::new_v4().to_string(),
                rule_uuid: rc.rule_uuid,
                old_attribute: rc.old_attribute,
                new_attribute: rc.new_attribute,
                impact_changes: rc.impact_changes,
            };
            conn.execute(
                "INSERT INTO rule_changes (uuid, rule_uuid, old_attribute, new_attribute)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    stored.uuid,
                    stored.rule_uuid,
                    stored.old_attribute.map(|a| a.as_str()),
                    stored.new_attribute.map(|a| a.as_str()),
                ],
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
            for impact in &stored.impact_changes {
                conn.execute(
                    "INSERT INTO rule_impact_changes
                        (rule_change_uuid, old_quality, new_quality, old_severity, new_severity)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        stored.uuid,
                        impact.old_quality.map(|q| q.as_str()),
                        impact.new_quality.map(|q| q.as_str()),
                        impact.old_severity.map(|s| s.as_str()),
                        impact.new_severity.map(|s| s.as_str()),
                    ],
                )
                .map_err(|e| to_storage_err(e.to_string()))?;
            }
            Ok(stored)
        })
        .transpose()?;

    let stored = Change {
        uuid: uuid::Uuid::new_v4().to_string(),
        rules_profile_uuid: change.rules_profile_uuid,
        user_uuid: change.user_uuid,
        change_type: change.change_type,
        data: change.data,
        created_at,
        rule_change,
    };
    conn.execute(
        "INSERT INTO profile_changes
            (uuid, rules_profile_uuid, user_uuid, change_type, data, rule_change_uuid, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            stored.uuid,
            stored.rules_profile_uuid,
            stored.user_uuid,
            stored.change_type,
            stored.data,
            stored.rule_change.as_ref().map(|rc| rc.uuid.clone()),
            ts_to_text(stored.created_at),
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(stored)
}

/// Entries for one profile, newest first, `[from, to)` time range,
/// offset/limit pagination. Unknown profile keys yield an empty
/// sequence. Rule diffs are hydrated with one read per relation.
pub fn query(conn: &Connection, query: &ChangeQuery) -> QProfResult<Vec<Change>> {
    let Some(rules_profile_uuid) = resolve_rules_profile(conn, &query.profile_key)? else {
        return Ok(Vec::new());
    };

    let mut sql = String::from(
        "SELECT uuid, rules_profile_uuid, user_uuid, change_type, data, rule_change_uuid, created_at
         FROM profile_changes WHERE rules_profile_uuid = ?",
    );
    let mut values: Vec<Value> = vec![Value::Text(rules_profile_uuid)];
    if let Some(from) = query.from_inclusive {
        sql.push_str(" AND created_at >= ?");
        values.push(Value::Text(ts_to_text(from)));
    }
    if let Some(to) = query.to_exclusive {
        sql.push_str(" AND created_at < ?");
        values.push(Value::Text(ts_to_text(to)));
    }
    sql.push_str(" ORDER BY created_at DESC, uuid LIMIT ? OFFSET ?");
    values.push(Value::Integer(query.limit.min(MAX_CHANGE_PAGE_SIZE) as i64));
    values.push(Value::Integer(query.offset as i64));

    let mut stmt = conn.prepare(&sql).map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(values), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut changes = Vec::new();
    let mut rule_change_refs: Vec<(usize, String)> = Vec::new();
    for row in rows {
        let (uuid, rules_profile_uuid, user_uuid, change_type, data, rule_change_uuid, created_at) =
            row.map_err(|e| to_storage_err(e.to_string()))?;
        if let Some(rc_uuid) = rule_change_uuid {
            rule_change_refs.push((changes.len(), rc_uuid));
        }
        changes.push(Change {
            uuid,
            rules_profile_uuid,
            user_uuid,
            change_type,
            data,
            created_at: ts_from_text(&created_at)?,
            rule_change: None,
        });
    }

    hydrate_rule_changes(conn, &mut changes, &rule_change_refs)?;
    Ok(changes)
}

/// Cardinality of `query` ignoring pagination.
pub fn count(conn: &Connection, query: &ChangeQuery) -> QProfResult<usize> {
    let Some(rules_profile_uuid) = resolve_rules_profile(conn, &query.profile_key)? else {
        return Ok(0);
    };

    let mut sql =
        String::from("SELECT COUNT(*) FROM profile_changes WHERE rules_profile_uuid = ?");
    let mut values: Vec<Value> = vec![Value::Text(rules_profile_uuid)];
    if let Some(from) = query.from_inclusive {
        sql.push_str(" AND created_at >= ?");
        values.push(Value::Text(ts_to_text(from)));
    }
    if let Some(to) = query.to_exclusive {
        sql.push_str(" AND created_at < ?");
        values.push(Value::Text(ts_to_text(to)));
    }

    conn.query_row(&sql, rusqlite::params_from_iter(values), |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as usize)
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Delete every ledger row owned by the given rule profiles. Unknown
/// uuids are ignored; empty input is a no-op.
pub fn purge_by_rule_profiles(conn: &Connection, rule_profile_uuids: &[String]) -> QProfResult<()> {
    if rule_profile_uuids.is_empty() {
        return Ok(());
    }
    let marks = placeholders(rule_profile_uuids.len());

    // Capture owned diff uuids before the owning entries disappear.
    let mut stmt = conn
        .prepare(&format!(
            "SELECT rule_change_uuid FROM profile_changes
             WHERE rules_profile_uuid IN ({marks}) AND rule_change_uuid IS NOT NULL"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rule_change_uuids: Vec<String> = stmt
        .query_map(rusqlite::params_from_iter(rule_profile_uuids), |row| {
            row.get(0)
        })
        .map_err(|e| to_storage_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))?;

    conn.execute(
        &format!("DELETE FROM profile_changes WHERE rules_profile_uuid IN ({marks})"),
        rusqlite::params_from_iter(rule_profile_uuids),
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    if !rule_change_uuids.is_empty() {
        let rc_marks = placeholders(rule_change_uuids.len());
        conn.execute(
            &format!("DELETE FROM rule_impact_changes WHERE rule_change_uuid IN ({rc_marks})"),
            rusqlite::params_from_iter(&rule_change_uuids),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        conn.execute(
            &format!("DELETE FROM rule_changes WHERE uuid IN ({rc_marks})"),
            rusqlite::params_from_iter(&rule_change_uuids),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    }
    Ok(())
}

fn resolve_rules_profile(conn: &Connection, profile_key: &str) -> QProfResult<Option<String>> {
    conn.query_row(
        "SELECT rules_profile_uuid FROM profiles WHERE key = ?1",
        params![profile_key],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Attach rule diffs to the page of changes: one read for the diffs,
/// one for their impact transitions.
fn hydrate_rule_changes(
    conn: &Connection,
    changes: &mut [Change],
    refs: &[(usize, String)],
) -> QProfResult<()> {
    if refs.is_empty() {
        return Ok(());
    }
    let uuids: Vec<String> = refs.iter().map(|(_, uuid)| uuid.clone()).collect();
    let marks = placeholders(uuids.len());

    let mut stmt = conn
        .prepare(&format!(
            "SELECT uuid, rule_uuid, old_attribute, new_attribute
             FROM rule_changes WHERE uuid IN ({marks})"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(&uuids), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut by_uuid = std::collections::HashMap::new();
    for row in rows {
        let (uuid, rule_uuid, old_attr, new_attr) =
            row.map_err(|e| to_storage_err(e.to_string()))?;
        by_uuid.insert(
            uuid.clone(),
            RuleChange {
                uuid,
                rule_uuid,
                old_attribute: parse_attribute(old_attr.as_deref())?,
                new_attribute: parse_attribute(new_attr.as_deref())?,
                impact_changes: Vec::new(),
            },
        );
    }

    let mut stmt = conn
        .prepare(&format!(
            "SELECT rule_change_uuid, old_quality, new_quality, old_severity, new_severity
             FROM rule_impact_changes WHERE rule_change_uuid IN ({marks})"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(&uuids), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })
        .map_err(|e| to_storage_err(e.to_string()))?;
    for row in rows {
        let (owner, old_quality, new_quality, old_severity, new_severity) =
            row.map_err(|e| to_storage_err(e.to_string()))?;
        if let Some(rule_change) = by_uuid.get_mut(&owner) {
            rule_change.impact_changes.push(qprof_core::change::ImpactChange {
                old_quality: parse_quality(old_quality.as_deref())?,
                new_quality: parse_quality(new_quality.as_deref())?,
                old_severity: parse_impact_severity(old_severity.as_deref())?,
                new_severity: parse_impact_severity(new_severity.as_deref())?,
            });
        }
    }

    for (index, uuid) in refs {
        changes[*index].rule_change = by_uuid.get(uuid).cloned();
    }
    Ok(())
}

fn parse_attribute(s: Option<&str>) -> QProfResult<Option<CleanCodeAttribute>> {
    s.map(|v| {
        CleanCodeAttribute::parse(v)
            .ok_or_else(|| to_storage_err(format!("parse clean code attribute '{v}'")))
    })
    .transpose()
}

fn parse_quality(s: Option<&str>) -> QProfResult<Option<SoftwareQuality>> {
    s.map(|v| {
        SoftwareQuality::parse(v)
            .ok_or_else(|| to_storage_err(format!("parse software quality '{v}'")))
    })
    .transpose()
}

fn parse_impact_severity(s: Option<&str>) -> QProfResult<Option<ImpactSeverity>> {
    s.map(|v| {
        ImpactSeverity::parse(v)
            .ok_or_else(|| to_storage_err(format!("parse impact severity '{v}'")))
    })
    .transpose()
}
