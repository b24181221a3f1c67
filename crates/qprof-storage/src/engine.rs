//! StorageEngine — owns ConnectionPool, implements ProfileStore +
//! RuleRegistry + ActivationStore + ChangeLedger, startup migrations.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};

use qprof_core::change::{Change, ChangeQuery, NewChange};
use qprof_core::errors::QProfResult;
use qprof_core::profile::{
    ActiveRule, ActiveRuleCountQuery, ActiveRuleKey, ActiveRuleParam, IndexedActiveRule,
    NewActiveRule, Profile, RuleProfile,
};
use qprof_core::rule::{RuleParamDef, RuleRef, RuleStatus};
use qprof_core::traits::{ActivationStore, ChangeLedger, ProfileStore, RuleRegistry};

use crate::migrations;
use crate::pool::ConnectionPool;

/// The main storage engine. Owns the connection pool and provides the
/// full ProfileStore + RuleRegistry + ActivationStore + ChangeLedger
/// interface.
pub struct StorageEngine {
    pool: ConnectionPool,
    /// When true, use the read pool for read operations (file-backed mode).
    /// When false, route all reads through the writer (in-memory mode,
    /// because in-memory read pool connections are isolated databases).
    use_read_pool: bool,
}

impl StorageEngine {
    /// Open a storage engine backed by a file on disk.
    pub fn open(path: &Path) -> QProfResult<Self> {
        let pool = ConnectionPool::open(path, crate::pool::ReadPool::default_size())?;
        let engine = Self {
            pool,
            use_read_pool: true,
        };
        engine.initialize()?;
        Ok(engine)
    }

    /// Open an in-memory storage engine (for testing). Routes all reads
    /// through the writer since in-memory read pool connections are
    /// isolated databases that can't see writer's changes.
    pub fn open_in_memory() -> QProfResult<Self> {
        let pool = ConnectionPool::open_in_memory(1)?;
        let engine = Self {
            pool,
            use_read_pool: false,
        };
        engine.initialize()?;
        Ok(engine)
    }

    /// Run migrations on the writer connection.
    fn initialize(&self) -> QProfResult<()> {
        self.pool.writer.with_conn_sync(|conn| {
            migrations::run_migrations(conn)?;
            Ok(())
        })
    }

    /// Get a reference to the connection pool (for advanced operations).
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Execute a read-only query on the best available connection.
    /// File-backed: uses the read pool (no writer contention).
    /// In-memory: uses the writer (read pool is isolated).
    fn with_reader<F, T>(&self, f: F) -> QProfResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> QProfResult<T>,
    {
        if self.use_read_pool {
            self.pool.readers.with_conn(f)
        } else {
            self.pool.writer.with_conn_sync(f)
        }
    }
}

impl ProfileStore for StorageEngine {
    fn insert_rule_profile(&self, rule_profile: &RuleProfile) -> QProfResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::profile_ops::insert_rule_profile(conn, rule_profile))
    }

    fn select_rule_profile(&self, uuid: &str) -> QProfResult<Option<RuleProfile>> {
        self.with_reader(|conn| crate::queries::profile_ops::select_rule_profile(conn, uuid))
    }

    fn delete_rule_profiles(&self, uuids: &[String]) -> QProfResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::profile_ops::delete_rule_profiles(conn, uuids))
    }

    fn insert_profile(&self, profile: &Profile) -> QProfResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::profile_ops::insert_profile(conn, profile))
    }

    fn update_profile(&self, profile: &Profile) -> QProfResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::profile_ops::update_profile(conn, profile))
    }

    fn delete_profile(&self, key: &str) -> QProfResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::profile_ops::delete_profile(conn, key))
    }

    fn select_profile(&self, key: &str) -> QProfResult<Option<Profile>> {
        self.with_reader(|conn| crate::queries::profile_ops::select_profile(conn, key))
    }

    fn select_all_profiles(&self) -> QProfResult<Vec<Profile>> {
        self.with_reader(crate::queries::profile_ops::select_all)
    }

    fn select_profiles_by_language(&self, language: &str) -> QProfResult<Vec<Profile>> {
        self.with_reader(|conn| crate::queries::profile_ops::select_by_language(conn, language))
    }

    fn select_profile_by_name_and_language(
        &self,
        name: &str,
        language: &str,
    ) -> QProfResult<Option<Profile>> {
        self.with_reader(|conn| {
            crate::queries::profile_ops::select_by_name_and_language(conn, name, language)
        })
    }

    fn select_children(&self, profile_keys: &[String]) -> QProfResult<Vec<Profile>> {
        self.with_reader(|conn| crate::queries::profile_ops::select_children(conn, profile_keys))
    }

    fn update_last_used(&self, profile_key: &str, at: DateTime<Utc>) -> QProfResult<bool> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::profile_ops::update_last_used(conn, profile_key, at))
    }

    fn select_default_profile(&self, language: &str) -> QProfResult<Option<Profile>> {
        self.with_reader(|conn| crate::queries::profile_ops::select_default_profile(conn, language))
    }

    fn set_default_profile(&self, profile: &Profile) -> QProfResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::profile_ops::set_default_profile(conn, profile))
    }
}

impl RuleRegistry for StorageEngine {
    fn insert_rule(&self, rule: &RuleRef) -> QProfResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::rule_registry::insert_rule(conn, rule))
    }

    fn update_rule_status(&self, rule_uuid: &str, status: RuleStatus) -> QProfResult<()> {
        self.pool.writer.with_conn_sync(|conn| {
            crate::queries::rule_registry::update_rule_status(conn, rule_uuid, status)
        })
    }

    fn select_rule(&self, uuid: &str) -> QProfResult<Option<RuleRef>> {
        self.with_reader(|conn| crate::queries::rule_registry::select_rule(conn, uuid))
    }

    fn select_rule_by_key(
        &self,
        repository: &str,
        rule_key: &str,
    ) -> QProfResult<Option<RuleRef>> {
        self.with_reader(|conn| {
            crate::queries::rule_registry::select_rule_by_key(conn, repository, rule_key)
        })
    }

    fn insert_rule_param(&self, param: &RuleParamDef) -> QProfResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::rule_registry::insert_rule_param(conn, param))
    }

    fn select_rule_params(&self, rule_uuid: &str) -> QProfResult<Vec<RuleParamDef>> {
        self.with_reader(|conn| crate::queries::rule_registry::select_rule_params(conn, rule_uuid))
    }
}

impl ActivationStore for StorageEngine {
    fn activate(&self, key: &ActiveRuleKey, new: NewActiveRule) -> QProfResult<ActiveRule> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::activation_ops::insert_active_rule(conn, key, new))
    }

    fn update_activation(&self, active_rule: &ActiveRule) -> QProfResult<ActiveRule> {
        self.pool.writer.with_conn_sync(|conn| {
            crate::queries::activation_ops::update_active_rule(conn, active_rule)
        })
    }

    fn deactivate(&self, key: &ActiveRuleKey) -> QProfResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::activation_ops::delete_active_rule(conn, key))
    }

    fn deactivate_by_rule_profiles(&self, rule_profile_uuids: &[String]) -> QProfResult<()> {
        self.pool.writer.with_conn_sync(|conn| {
            crate::queries::activation_ops::delete_by_rule_profiles(conn, rule_profile_uuids)
        })
    }

    fn deactivate_by_uuids(&self, uuids: &[String]) -> QProfResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::activation_ops::delete_by_uuids(conn, uuids))
    }

    fn select_activation(&self, key: &ActiveRuleKey) -> QProfResult<Option<ActiveRule>> {
        self.with_reader(|conn| crate::queries::activation_ops::select_by_key(conn, key))
    }

    fn select_by_rule_profile(&self, rule_profile_uuid: &str) -> QProfResult<Vec<ActiveRule>> {
        self.with_reader(|conn| {
            crate::queries::activation_ops::select_by_rule_profile(conn, rule_profile_uuid)
        })
    }

    fn select_by_rule(&self, rule_uuid: &str) -> QProfResult<Vec<ActiveRule>> {
        self.with_reader(|conn| crate::queries::activation_ops::select_by_rule(conn, rule_uuid))
    }

    fn select_by_rule_status_and_profiles(
        &self,
        status: RuleStatus,
        profile_keys: &[String],
    ) -> QProfResult<Vec<ActiveRule>> {
        self.with_reader(|conn| {
            crate::queries::activation_ops::select_by_rule_status_and_profiles(
                conn,
                status,
                profile_keys,
            )
        })
    }

    fn select_prioritized_rules(&self, profile_keys: &[String]) -> QProfResult<Vec<String>> {
        self.with_reader(|conn| {
            crate::queries::activation_ops::select_prioritized_rules(conn, profile_keys)
        })
    }

    fn select_removed_activations(&self, rule_profile_uuid: &str) -> QProfResult<Vec<ActiveRule>> {
        self.with_reader(|conn| {
            crate::queries::activation_ops::select_removed(conn, rule_profile_uuid)
        })
    }

    fn count_missing_rules(
        &self,
        rule_profile_uuid: &str,
        compared_to_uuid: &str,
    ) -> QProfResult<i64> {
        self.with_reader(|conn| {
            crate::queries::counting::count_missing_rules(conn, rule_profile_uuid, compared_to_uuid)
        })
    }

    fn count_by_query(&self, query: &ActiveRuleCountQuery) -> QProfResult<HashMap<String, i64>> {
        self.with_reader(|conn| crate::queries::counting::count_by_query(conn, query))
    }

    fn insert_param(
        &self,
        active_rule_uuid: &str,
        rule_param_uuid: &str,
        value: Option<String>,
    ) -> QProfResult<ActiveRuleParam> {
        self.pool.writer.with_conn_sync(|conn| {
            crate::queries::param_ops::insert_param(conn, active_rule_uuid, rule_param_uuid, value)
        })
    }

    fn update_param(&self, param: &ActiveRuleParam) -> QProfResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::param_ops::update_param(conn, param))
    }

    fn delete_param(&self, uuid: &str) -> QProfResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::param_ops::delete_param(conn, uuid))
    }

    fn select_params_by_active_rule(
        &self,
        active_rule_uuid: &str,
    ) -> QProfResult<Vec<ActiveRuleParam>> {
        self.with_reader(|conn| {
            crate::queries::param_ops::select_by_active_rule(conn, active_rule_uuid)
        })
    }

    fn select_params_by_active_rules(
        &self,
        active_rule_uuids: &[String],
    ) -> QProfResult<Vec<ActiveRuleParam>> {
        self.with_reader(|conn| {
            crate::queries::param_ops::select_by_active_rules(conn, active_rule_uuids)
        })
    }

    fn select_params_by_profiles(
        &self,
        profile_keys: &[String],
    ) -> QProfResult<Vec<ActiveRuleParam>> {
        self.with_reader(|conn| crate::queries::param_ops::select_by_profiles(conn, profile_keys))
    }

    fn delete_params_by_active_rules(&self, active_rule_uuids: &[String]) -> QProfResult<()> {
        self.pool.writer.with_conn_sync(|conn| {
            crate::queries::param_ops::delete_by_active_rules(conn, active_rule_uuids)
        })
    }

    fn delete_params_by_rule_param(&self, rule_param_uuid: &str) -> QProfResult<()> {
        self.pool.writer.with_conn_sync(|conn| {
            crate::queries::param_ops::delete_by_rule_param(conn, rule_param_uuid)
        })
    }

    fn delete_params_by_rule_profiles(&self, rule_profile_uuids: &[String]) -> QProfResult<()> {
        self.pool.writer.with_conn_sync(|conn| {
            crate::queries::param_ops::delete_by_rule_profiles(conn, rule_profile_uuids)
        })
    }

    fn scroll_all_for_indexing(
        &self,
        consumer: &mut dyn FnMut(IndexedActiveRule),
    ) -> QProfResult<()> {
        self.with_reader(|conn| crate::queries::indexing::scroll_all(conn, consumer))
    }

    fn scroll_by_uuids_for_indexing(
        &self,
        uuids: &[String],
        consumer: &mut dyn FnMut(IndexedActiveRule),
    ) -> QProfResult<()> {
        self.with_reader(|conn| crate::queries::indexing::scroll_by_uuids(conn, uuids, consumer))
    }

    fn scroll_by_rule_profile_for_indexing(
        &self,
        rule_profile_uuid: &str,
        consumer: &mut dyn FnMut(IndexedActiveRule),
    ) -> QProfResult<()> {
        self.with_reader(|conn| {
            crate::queries::indexing::scroll_by_rule_profile(conn, rule_profile_uuid, consumer)
        })
    }
}

impl ChangeLedger for StorageEngine {
    fn append(&self, change: NewChange) -> QProfResult<Change> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::change_ops::append(conn, change))
    }

    fn append_batch(&self, changes: Vec<NewChange>) -> QProfResult<Vec<Change>> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::change_ops::append_batch(conn, changes))
    }

    fn query_changes(&self, query: &ChangeQuery) -> QProfResult<Vec<Change>> {
        self.with_reader(|conn| crate::queries::change_ops::query(conn, query))
    }

    fn count_changes(&self, query: &ChangeQuery) -> QProfResult<usize> {
        self.with_reader(|conn| crate::queries::change_ops::count(conn, query))
    }

    fn purge_by_rule_profiles(&self, rule_profile_uuids: &[String]) -> QProfResult<()> {
        self.pool.writer.with_conn_sync(|conn| {
            crate::queries::change_ops::purge_by_rule_profiles(conn, rule_profile_uuids)
        })
    }
}
