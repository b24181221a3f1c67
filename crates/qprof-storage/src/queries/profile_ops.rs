//! Insert, update, lookup, delete for rule profiles, profile views,
//! and the per-language default mapping.

use rusqlite::{params, Connection, OptionalExtension};

use qprof_core::errors::{QProfError, QProfResult};
use qprof_core::profile::{Profile, RuleProfile};

use crate::queries::{change_ops, placeholders};
use crate::{to_storage_err, ts_from_text, ts_to_text};

/// Insert a canonical rule profile.
pub fn insert_rule_profile(conn: &Connection, rule_profile: &RuleProfile) -> QProfResult<()> {
    conn.execute(
        "INSERT INTO rules_profiles (uuid, name, language, is_built_in) VALUES (?1, ?2, ?3, ?4)",
        params![
            rule_profile.uuid,
            rule_profile.name,
            rule_profile.language,
            rule_profile.is_built_in as i32,
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Get a rule profile by uuid.
pub fn select_rule_profile(conn: &Connection, uuid: &str) -> QProfResult<Option<RuleProfile>> {
    conn.query_row(
        "SELECT uuid, name, language, is_built_in FROM rules_profiles WHERE uuid = ?1",
        params![uuid],
        |row| {
            Ok(RuleProfile {
                uuid: row.get(0)?,
                name: row.get(1)?,
                language: row.get(2)?,
                is_built_in: row.get::<_, i32>(3)? != 0,
            })
        },
    )
    .optional()
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Delete rule profiles and everything they own: activation params,
/// activations, ledger entries, then the rows themselves. One
/// transaction; unknown uuids are ignored.
pub fn delete_rule_profiles(conn: &Connection, uuids: &[String]) -> QProfResult<()> {
    if uuids.is_empty() {
        return Ok(());
    }
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(format!("delete_rule_profiles begin: {e}")))?;

    match delete_rule_profiles_inner(&tx, uuids) {
        Ok(()) => {
            tx.commit()
                .map_err(|e| to_storage_err(format!("delete_rule_profiles commit: {e}")))?;
            Ok(())
        }
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

fn delete_rule_profiles_inner(conn: &Connection, uuids: &[String]) -> QProfResult<()> {
    let marks = placeholders(uuids.len());
    conn.execute(
        &format!(
            "DELETE FROM active_rule_params WHERE active_rule_uuid IN
             (SELECT uuid FROM active_rules WHERE rules_profile_uuid IN ({marks}))"
        ),
        rusqlite::params_from_iter(uuids),
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    conn.execute(
        &format!("DELETE FROM active_rules WHERE rules_profile_uuid IN ({marks})"),
        rusqlite::params_from_iter(uuids),
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    change_ops::purge_by_rule_profiles(conn, uuids)?;

    conn.execute(
        &format!("DELETE FROM rules_profiles WHERE uuid IN ({marks})"),
        rusqlite::params_from_iter(uuids),
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Insert a profile view. Parent validation (same language, acyclic
/// chain) is the re-parenting operation's responsibility, not the
/// row store's.
pub fn insert_profile(conn: &Connection, profile: &Profile) -> QProfResult<()> {
    conn.execute(
        "INSERT INTO profiles (
            key, rules_profile_uuid, name, language, parent_key,
            last_used, user_updated_at, rules_updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            profile.key,
            profile.rules_profile_uuid,
            profile.name,
            profile.language,
            profile.parent_key,
            profile.last_used.map(ts_to_text),
            profile.user_updated_at.map(ts_to_text),
            ts_to_text(profile.rules_updated_at),
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Rewrite an existing profile view.
pub fn update_profile(conn: &Connection, profile: &Profile) -> QProfResult<()> {
    let rows = conn
        .execute(
            "UPDATE profiles SET
                rules_profile_uuid = ?2, name = ?3, language = ?4, parent_key = ?5,
                last_used = ?6, user_updated_at = ?7, rules_updated_at = ?8
             WHERE key = ?1",
            params![
                profile.key,
                profile.rules_profile_uuid,
                profile.name,
                profile.language,
                profile.parent_key,
                profile.last_used.map(ts_to_text),
                profile.user_updated_at.map(ts_to_text),
                ts_to_text(profile.rules_updated_at),
            ],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    if rows == 0 {
        return Err(QProfError::NotPersisted { entity: "profile" });
    }
    Ok(())
}

/// Delete a profile view and its default-profile mapping.
pub fn delete_profile(conn: &Connection, key: &str) -> QProfResult<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(format!("delete_profile begin: {e}")))?;
    let result = (|| -> QProfResult<()> {
        tx.execute(
            "DELETE FROM default_profiles WHERE profile_key = ?1",
            params![key],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        tx.execute("DELETE FROM profiles WHERE key = ?1", params![key])
            .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(())
    })();
    match result {
        Ok(()) => {
            tx.commit()
                .map_err(|e| to_storage_err(format!("delete_profile commit: {e}")))?;
            Ok(())
        }
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

const PROFILE_COLUMNS: &str = "key, rules_profile_uuid, name, language, parent_key,
    last_used, user_updated_at, rules_updated_at";

/// Get a profile view by key.
pub fn select_profile(conn: &Connection, key: &str) -> QProfResult<Option<Profile>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE key = ?1"))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let result = stmt
        .query_row(params![key], |row| Ok(row_to_profile(row)))
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    result.transpose()
}

/// All profiles, sorted by name.
pub fn select_all(conn: &Connection) -> QProfResult<Vec<Profile>> {
    query_profiles(
        conn,
        &format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY name"),
        [],
    )
}

/// Profiles of one language, sorted by name.
pub fn select_by_language(conn: &Connection, language: &str) -> QProfResult<Vec<Profile>> {
    query_profiles(
        conn,
        &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE language = ?1 ORDER BY name"),
        params![language],
    )
}

/// Unique profile for a (name, language) pair.
pub fn select_by_name_and_language(
    conn: &Connection,
    name: &str,
    language: &str,
) -> QProfResult<Option<Profile>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE name = ?1 AND language = ?2"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let result = stmt
        .query_row(params![name, language], |row| Ok(row_to_profile(row)))
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    result.transpose()
}

/// Direct children of any of the given profiles, sorted by name.
/// Empty input yields an empty result.
pub fn select_children(conn: &Connection, profile_keys: &[String]) -> QProfResult<Vec<Profile>> {
    if profile_keys.is_empty() {
        return Ok(Vec::new());
    }
    let marks = placeholders(profile_keys.len());
    let sql = format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE parent_key IN ({marks}) ORDER BY name"
    );
    query_profiles(conn, &sql, rusqlite::params_from_iter(profile_keys))
}

/// Move `last_used` forward. Returns whether a row changed: a value
/// older than the stored one leaves the row untouched.
pub fn update_last_used(
    conn: &Connection,
    profile_key: &str,
    at: chrono::DateTime<chrono::Utc>,
) -> QProfResult<bool> {
    let at_text = ts_to_text(at);
    let rows = conn
        .execute(
            "UPDATE profiles SET last_used = ?2
             WHERE key = ?1 AND (last_used IS NULL OR last_used < ?2)",
            params![profile_key, at_text],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(rows > 0)
}

/// Default profile of a language, if one is mapped.
pub fn select_default_profile(conn: &Connection, language: &str) -> QProfResult<Option<Profile>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles
             WHERE key = (SELECT profile_key FROM default_profiles WHERE language = ?1)"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let result = stmt
        .query_row(params![language], |row| Ok(row_to_profile(row)))
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    result.transpose()
}

/// Make the profile its language's default. One row per language: a
/// previous mapping is replaced.
pub fn set_default_profile(conn: &Connection, profile: &Profile) -> QProfResult<()> {
    conn.execute(
        "INSERT INTO default_profiles (language, profile_key) VALUES (?1, ?2)
         ON CONFLICT(language) DO UPDATE SET profile_key = excluded.profile_key",
        params![profile.language, profile.key],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

fn query_profiles<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> QProfResult<Vec<Profile>> {
    let mut stmt = conn.prepare(sql).map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params, |row| Ok(row_to_profile(row)))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut profiles = Vec::new();
    for row in rows {
        profiles.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(profiles)
}

/// Parse a row from the profiles table.
pub(crate) fn row_to_profile(row: &rusqlite::Row<'_>) -> QProfResult<Profile> {
    let last_used: Option<String> = row.get(5).map_err(|e| to_storage_err(e.to_string()))?;
    let user_updated_at: Option<String> = row.get(6).map_err(|e| to_storage_err(e.to_string()))?;
    let rules_updated_at: String = row.get(7).map_err(|e| to_storage_err(e.to_string()))?;

    Ok(Profile {
        key: row.get(0).map_err(|e| to_storage_err(e.to_string()))?,
        rules_profile_uuid: row.get(1).map_err(|e| to_storage_err(e.to_string()))?,
        name: row.get(2).map_err(|e| to_storage_err(e.to_string()))?,
        language: row.get(3).map_err(|e| to_storage_err(e.to_string()))?,
        parent_key: row.get(4).map_err(|e| to_storage_err(e.to_string()))?,
        last_used: last_used.as_deref().map(ts_from_text).transpose()?,
        user_updated_at: user_updated_at.as_deref().map(ts_from_text).transpose()?,
        rules_updated_at: ts_from_text(&rules_updated_at)?,
    })
}
