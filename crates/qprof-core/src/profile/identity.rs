//! Profile identity split: the canonical language-scoped rule set
//! (`RuleProfile`) and the named, addressable views bound to it
//! (`Profile`). Several views may share one rule set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical identity of a rule configuration for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleProfile {
    /// Immutable identity.
    pub uuid: String,
    pub name: String,
    pub language: String,
    /// System-provided vs. user-authored.
    pub is_built_in: bool,
}

impl RuleProfile {
    pub fn new(name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            language: language.into(),
            is_built_in: false,
        }
    }

    pub fn built_in(mut self) -> Self {
        self.is_built_in = true;
        self
    }
}

/// A named, addressable view over a RuleProfile. The `parent_key`
/// self-reference forms a forest; a parent must share the profile's
/// language and the parent chain must stay acyclic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Primary external identity.
    pub key: String,
    /// Owning RuleProfile (exactly one per Profile).
    pub rules_profile_uuid: String,
    pub name: String,
    pub language: String,
    pub parent_key: Option<String>,
    pub last_used: Option<DateTime<Utc>>,
    pub user_updated_at: Option<DateTime<Utc>>,
    /// Bumped by every rule-set mutation of the owning RuleProfile.
    pub rules_updated_at: DateTime<Utc>,
}

impl Profile {
    /// Build a view over an existing RuleProfile, carrying its name
    /// and language.
    pub fn for_rule_profile(rule_profile: &RuleProfile) -> Self {
        Self {
            key: uuid::Uuid::new_v4().to_string(),
            rules_profile_uuid: rule_profile.uuid.clone(),
            name: rule_profile.name.clone(),
            language: rule_profile.language.clone(),
            parent_key: None,
            last_used: None,
            user_updated_at: None,
            rules_updated_at: Utc::now(),
        }
    }

    pub fn with_parent(mut self, parent_key: impl Into<String>) -> Self {
        self.parent_key = Some(parent_key.into());
        self
    }
}

/// One-row-per-language mapping enforcing "at most one default profile
/// per language" through a uniqueness constraint instead of a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultProfile {
    pub language: String,
    pub profile_key: String,
}
