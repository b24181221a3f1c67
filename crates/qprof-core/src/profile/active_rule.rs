//! Activation of one rule inside one RuleProfile, plus its parameter
//! overrides and the query/projection types built on activations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::inheritance::Inheritance;
use super::severity::{Impacts, Severity};
use crate::rule::RuleStatus;

/// Natural key of an activation: unique per (rules_profile, rule).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveRuleKey {
    pub rules_profile_uuid: String,
    pub rule_uuid: String,
}

impl ActiveRuleKey {
    pub fn of(rules_profile_uuid: impl Into<String>, rule_uuid: impl Into<String>) -> Self {
        Self {
            rules_profile_uuid: rules_profile_uuid.into(),
            rule_uuid: rule_uuid.into(),
        }
    }
}

/// A persisted activation row. Identity and timestamps are always
/// server-assigned; callers never construct this directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRule {
    pub uuid: String,
    pub rules_profile_uuid: String,
    pub rule_uuid: String,
    /// Overridden severity; `None` keeps the rule's default.
    pub severity: Option<Severity>,
    pub impacts: Impacts,
    pub inheritance: Inheritance,
    pub prioritized: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActiveRule {
    pub fn key(&self) -> ActiveRuleKey {
        ActiveRuleKey::of(self.rules_profile_uuid.clone(), self.rule_uuid.clone())
    }

    /// Whether severity and impacts equal another row's. Parameter
    /// overrides are compared separately by the activator, which owns
    /// the param rows.
    pub fn same_configuration(&self, other: &ActiveRule) -> bool {
        self.severity == other.severity && self.impacts == other.impacts
    }
}

/// Insert payload for an activation. The store assigns uuid and
/// timestamps on success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewActiveRule {
    pub severity: Option<Severity>,
    pub impacts: Impacts,
    pub inheritance: Option<Inheritance>,
    pub prioritized: bool,
}

impl NewActiveRule {
    pub fn with_severity(severity: Severity) -> Self {
        Self {
            severity: Some(severity),
            ..Default::default()
        }
    }
}

/// A parameter-value override tied to one activation and one rule
/// parameter definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRuleParam {
    pub uuid: String,
    pub active_rule_uuid: String,
    /// The parameter definition being overridden; immutable once set.
    pub rule_param_uuid: String,
    /// Denormalized parameter name.
    pub key: String,
    pub value: Option<String>,
}

/// Query for aggregate activation counts. The profile set is required:
/// an empty set yields an empty result, never "all profiles".
#[derive(Debug, Clone, Default)]
pub struct ActiveRuleCountQuery {
    pub profile_keys: Vec<String>,
    /// `None` counts every non-removed status; `Some(Removed)` is the
    /// only counting path that sees removed rules.
    pub rule_status: Option<RuleStatus>,
    pub inheritance: Option<Inheritance>,
}

impl ActiveRuleCountQuery {
    pub fn for_profiles<I, S>(profile_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            profile_keys: profile_keys.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_rule_status(mut self, status: RuleStatus) -> Self {
        self.rule_status = Some(status);
        self
    }

    pub fn with_inheritance(mut self, inheritance: Inheritance) -> Self {
        self.inheritance = Some(inheritance);
        self
    }
}

/// Flattened activation projection pushed to the search-index feed:
/// one element per activation, joined with rule identity and the
/// owning rule-profile uuid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedActiveRule {
    pub uuid: String,
    pub rule_uuid: String,
    pub repository: String,
    pub rule_key: String,
    pub rule_profile_uuid: String,
    pub severity: Option<Severity>,
    pub inheritance: Inheritance,
    pub impacts: Impacts,
    pub prioritized: bool,
}
