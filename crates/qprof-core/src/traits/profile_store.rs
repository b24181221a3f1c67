use chrono::{DateTime, Utc};

use crate::errors::QProfResult;
use crate::profile::{Profile, RuleProfile};
use crate::rule::{RuleParamDef, RuleRef, RuleStatus};

/// CRUD + lookup over the profile forest and the canonical rule sets
/// behind it. Lookups that match nothing return `Option::None` or an
/// empty collection, never an error.
pub trait ProfileStore: Send + Sync {
    // --- RuleProfile ---
    fn insert_rule_profile(&self, rule_profile: &RuleProfile) -> QProfResult<()>;
    fn select_rule_profile(&self, uuid: &str) -> QProfResult<Option<RuleProfile>>;
    /// Deletes rule profiles and everything they own: activations,
    /// parameter overrides, ledger entries. Unknown uuids are ignored.
    fn delete_rule_profiles(&self, uuids: &[String]) -> QProfResult<()>;

    // --- Profile views ---
    fn insert_profile(&self, profile: &Profile) -> QProfResult<()>;
    fn update_profile(&self, profile: &Profile) -> QProfResult<()>;
    /// Deletes the view and its default-profile mapping. The owning
    /// RuleProfile survives while other views reference it.
    fn delete_profile(&self, key: &str) -> QProfResult<()>;
    fn select_profile(&self, key: &str) -> QProfResult<Option<Profile>>;
    fn select_all_profiles(&self) -> QProfResult<Vec<Profile>>;
    fn select_profiles_by_language(&self, language: &str) -> QProfResult<Vec<Profile>>;
    fn select_profile_by_name_and_language(
        &self,
        name: &str,
        language: &str,
    ) -> QProfResult<Option<Profile>>;
    /// Direct children of any of the given profiles (one hop).
    fn select_children(&self, profile_keys: &[String]) -> QProfResult<Vec<Profile>>;
    /// Moves `last_used` forward; returns whether a row changed.
    fn update_last_used(&self, profile_key: &str, at: DateTime<Utc>) -> QProfResult<bool>;

    // --- Default profile per language ---
    fn select_default_profile(&self, language: &str) -> QProfResult<Option<Profile>>;
    fn set_default_profile(&self, profile: &Profile) -> QProfResult<()>;
}

/// Minimal rule registry backing activation references: identity,
/// lifecycle status, and parameter definitions.
pub trait RuleRegistry: Send + Sync {
    fn insert_rule(&self, rule: &RuleRef) -> QProfResult<()>;
    fn update_rule_status(&self, rule_uuid: &str, status: RuleStatus) -> QProfResult<()>;
    fn select_rule(&self, uuid: &str) -> QProfResult<Option<RuleRef>>;
    fn select_rule_by_key(&self, repository: &str, rule_key: &str)
        -> QProfResult<Option<RuleRef>>;
    fn insert_rule_param(&self, param: &RuleParamDef) -> QProfResult<()>;
    fn select_rule_params(&self, rule_uuid: &str) -> QProfResult<Vec<RuleParamDef>>;
}
