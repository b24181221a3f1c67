//! Minimal rule registry. Rule *definitions* (description, defaults,
//! remediation) live outside this engine; activations still need rule
//! identity, lifecycle status, and parameter definitions to reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a rule. `Removed` is a soft delete: activations
/// of removed rules survive in storage but are excluded from every
/// regular read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleStatus {
    Ready,
    Beta,
    Deprecated,
    Removed,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Beta => "BETA",
            Self::Deprecated => "DEPRECATED",
            Self::Removed => "REMOVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "READY" => Some(Self::Ready),
            "BETA" => Some(Self::Beta),
            "DEPRECATED" => Some(Self::Deprecated),
            "REMOVED" => Some(Self::Removed),
            _ => None,
        }
    }
}

/// Registry entry for one rule: identity, language, lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRef {
    pub uuid: String,
    /// Rule repository, e.g. the analyzer that contributes the rule.
    pub repository: String,
    /// Key unique within the repository.
    pub rule_key: String,
    pub language: String,
    pub status: RuleStatus,
    pub created_at: DateTime<Utc>,
}

impl RuleRef {
    pub fn new(
        repository: impl Into<String>,
        rule_key: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            repository: repository.into(),
            rule_key: rule_key.into(),
            language: language.into(),
            status: RuleStatus::Ready,
            created_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: RuleStatus) -> Self {
        self.status = status;
        self
    }
}

/// Definition of one parameter a rule accepts; activations override
/// values through `ActiveRuleParam` rows referencing these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleParamDef {
    pub uuid: String,
    pub rule_uuid: String,
    pub name: String,
    pub default_value: Option<String>,
}

impl RuleParamDef {
    pub fn new(rule: &RuleRef, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            rule_uuid: rule.uuid.clone(),
            name: name.into(),
            default_value: None,
        }
    }
}
