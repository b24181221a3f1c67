use std::collections::HashMap;

use crate::errors::QProfResult;
use crate::profile::{
    ActiveRule, ActiveRuleCountQuery, ActiveRuleKey, ActiveRuleParam, IndexedActiveRule,
    NewActiveRule,
};
use crate::rule::RuleStatus;

/// CRUD + bulk + counting + indexing feed over (rule profile × rule)
/// activation rows. Every regular read path excludes activations whose
/// rule has been removed; `select_removed_activations` is the one
/// inclusion path.
pub trait ActivationStore: Send + Sync {
    // --- CRUD ---
    /// Inserts a new activation. Fails with `AlreadyPersisted` when the
    /// key is already activated, `NotPersisted` when the profile or
    /// rule reference does not resolve. Returns the stored row with
    /// server-assigned identity and timestamps.
    fn activate(&self, key: &ActiveRuleKey, new: NewActiveRule) -> QProfResult<ActiveRule>;
    /// Rewrites severity/impacts/inheritance/prioritized of an existing
    /// row. `created_at` is preserved, `updated_at` refreshed.
    fn update_activation(&self, active_rule: &ActiveRule) -> QProfResult<ActiveRule>;
    /// Idempotent: deactivating a missing activation is a no-op.
    fn deactivate(&self, key: &ActiveRuleKey) -> QProfResult<()>;

    // --- Bulk ---
    fn deactivate_by_rule_profiles(&self, rule_profile_uuids: &[String]) -> QProfResult<()>;
    fn deactivate_by_uuids(&self, uuids: &[String]) -> QProfResult<()>;

    // --- Lookup ---
    fn select_activation(&self, key: &ActiveRuleKey) -> QProfResult<Option<ActiveRule>>;
    fn select_by_rule_profile(&self, rule_profile_uuid: &str) -> QProfResult<Vec<ActiveRule>>;
    fn select_by_rule(&self, rule_uuid: &str) -> QProfResult<Vec<ActiveRule>>;
    fn select_by_rule_status_and_profiles(
        &self,
        status: RuleStatus,
        profile_keys: &[String],
    ) -> QProfResult<Vec<ActiveRule>>;
    /// Rule uuids of prioritized activations in the given profiles.
    fn select_prioritized_rules(&self, profile_keys: &[String]) -> QProfResult<Vec<String>>;
    /// The dedicated removed-rules path: activations whose rule status
    /// is REMOVED.
    fn select_removed_activations(&self, rule_profile_uuid: &str) -> QProfResult<Vec<ActiveRule>>;

    // --- Counting ---
    /// Rules active and non-removed in `compared_to_uuid` that are not
    /// active in `rule_profile_uuid`. Directional, not symmetric.
    fn count_missing_rules(
        &self,
        rule_profile_uuid: &str,
        compared_to_uuid: &str,
    ) -> QProfResult<i64>;
    /// Aggregate counts per profile key. Profiles with zero matching
    /// rows are absent from the map.
    fn count_by_query(&self, query: &ActiveRuleCountQuery) -> QProfResult<HashMap<String, i64>>;

    // --- Parameter overrides ---
    /// Requires the owning activation row and the referenced rule
    /// parameter to exist (`NotPersisted` otherwise).
    fn insert_param(
        &self,
        active_rule_uuid: &str,
        rule_param_uuid: &str,
        value: Option<String>,
    ) -> QProfResult<ActiveRuleParam>;
    fn update_param(&self, param: &ActiveRuleParam) -> QProfResult<()>;
    fn delete_param(&self, uuid: &str) -> QProfResult<()>;
    fn select_params_by_active_rule(&self, active_rule_uuid: &str)
        -> QProfResult<Vec<ActiveRuleParam>>;
    fn select_params_by_active_rules(
        &self,
        active_rule_uuids: &[String],
    ) -> QProfResult<Vec<ActiveRuleParam>>;
    fn select_params_by_profiles(&self, profile_keys: &[String])
        -> QProfResult<Vec<ActiveRuleParam>>;
    fn delete_params_by_active_rules(&self, active_rule_uuids: &[String]) -> QProfResult<()>;
    fn delete_params_by_rule_param(&self, rule_param_uuid: &str) -> QProfResult<()>;
    fn delete_params_by_rule_profiles(&self, rule_profile_uuids: &[String]) -> QProfResult<()>;

    // --- Indexing feed ---
    /// Lazy, forward-only, restartable scans pushing one flattened
    /// projection per activation into the consumer. No ordering
    /// guarantee; each call starts a fresh pass.
    fn scroll_all_for_indexing(
        &self,
        consumer: &mut dyn FnMut(IndexedActiveRule),
    ) -> QProfResult<()>;
    fn scroll_by_uuids_for_indexing(
        &self,
        uuids: &[String],
        consumer: &mut dyn FnMut(IndexedActiveRule),
    ) -> QProfResult<()>;
    fn scroll_by_rule_profile_for_indexing(
        &self,
        rule_profile_uuid: &str,
        consumer: &mut dyn FnMut(IndexedActiveRule),
    ) -> QProfResult<()>;
}
