//! v001: Core tables — rules, rule_params, rules_profiles, profiles,
//! default_profiles, active_rules, active_rule_params.

use rusqlite::Connection;

use qprof_core::errors::QProfResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> QProfResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS rules (
            uuid        TEXT PRIMARY KEY,
            repository  TEXT NOT NULL,
            rule_key    TEXT NOT NULL,
            language    TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'READY',
            created_at  TEXT NOT NULL,
            UNIQUE (repository, rule_key)
        );

        CREATE INDEX IF NOT EXISTS idx_rules_status ON rules(status);

        CREATE TABLE IF NOT EXISTS rule_params (
            uuid           TEXT PRIMARY KEY,
            rule_uuid      TEXT NOT NULL REFERENCES rules(uuid) ON DELETE CASCADE,
            name           TEXT NOT NULL,
            default_value  TEXT,
            UNIQUE (rule_uuid, name)
        );

        CREATE TABLE IF NOT EXISTS rules_profiles (
            uuid         TEXT PRIMARY KEY,
            name         TEXT NOT NULL,
            language     TEXT NOT NULL,
            is_built_in  INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS profiles (
            key                 TEXT PRIMARY KEY,
            rules_profile_uuid  TEXT NOT NULL REFERENCES rules_profiles(uuid),
            name                TEXT NOT NULL,
            language            TEXT NOT NULL,
            parent_key          TEXT,
            last_used           TEXT,
            user_updated_at     TEXT,
            rules_updated_at    TEXT NOT NULL,
            UNIQUE (name, language)
        );

        CREATE INDEX IF NOT EXISTS idx_profiles_language ON profiles(language);
        CREATE INDEX IF NOT EXISTS idx_profiles_parent ON profiles(parent_key);
        CREATE INDEX IF NOT EXISTS idx_profiles_rules_profile ON profiles(rules_profile_uuid);

        CREATE TABLE IF NOT EXISTS default_profiles (
            language     TEXT PRIMARY KEY,
            profile_key  TEXT NOT NULL REFERENCES profiles(key) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS active_rules (
            uuid                TEXT PRIMARY KEY,
            rules_profile_uuid  TEXT NOT NULL REFERENCES rules_profiles(uuid),
            rule_uuid           TEXT NOT NULL REFERENCES rules(uuid),
            severity            TEXT,
            impacts             TEXT NOT NULL DEFAULT '{}',
            inheritance         TEXT NOT NULL DEFAULT 'NONE',
            prioritized         INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL,
            UNIQUE (rules_profile_uuid, rule_uuid)
        );

        CREATE INDEX IF NOT EXISTS idx_active_rules_rule ON active_rules(rule_uuid);

        CREATE TABLE IF NOT EXISTS active_rule_params (
            uuid             TEXT PRIMARY KEY,
            active_rule_uuid TEXT NOT NULL REFERENCES active_rules(uuid) ON DELETE CASCADE,
            rule_param_uuid  TEXT NOT NULL REFERENCES rule_params(uuid),
            key              TEXT NOT NULL,
            value            TEXT,
            UNIQUE (active_rule_uuid, rule_param_uuid)
        );

        CREATE INDEX IF NOT EXISTS idx_arp_rule_param ON active_rule_params(rule_param_uuid);
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
