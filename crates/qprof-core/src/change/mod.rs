//! Append-only change ledger types: the entry itself, the optional
//! structured rule diff attached to it, and the retrieval query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CHANGE_PAGE_SIZE;
use crate::profile::{CleanCodeAttribute, ImpactSeverity, SoftwareQuality};

/// Change tags the engine itself emits. The persisted column is
/// free-form text, so external writers may record other tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Activated,
    Deactivated,
    Updated,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activated => "ACTIVATED",
            Self::Deactivated => "DEACTIVATED",
            Self::Updated => "UPDATED",
        }
    }
}

/// A persisted ledger entry. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub uuid: String,
    /// The RuleProfile the change applies to.
    pub rules_profile_uuid: String,
    /// Acting user; `None` for system-generated changes.
    pub user_uuid: Option<String>,
    pub change_type: String,
    /// Opaque serialized payload for history display; the engine never
    /// parses it.
    pub data: Option<String>,
    /// Assigned exclusively by the ledger.
    pub created_at: DateTime<Utc>,
    pub rule_change: Option<RuleChange>,
}

/// Insert payload for one ledger entry. `created_at` must be left
/// unset — the ledger stamps it; a pre-populated value is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewChange {
    pub rules_profile_uuid: String,
    pub user_uuid: Option<String>,
    pub change_type: String,
    pub data: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub rule_change: Option<NewRuleChange>,
}

impl NewChange {
    pub fn new(rules_profile_uuid: impl Into<String>, change_type: ChangeType) -> Self {
        Self {
            rules_profile_uuid: rules_profile_uuid.into(),
            change_type: change_type.as_str().to_string(),
            ..Default::default()
        }
    }

    pub fn by_user(mut self, user_uuid: impl Into<String>) -> Self {
        self.user_uuid = Some(user_uuid.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_rule_change(mut self, rule_change: NewRuleChange) -> Self {
        self.rule_change = Some(rule_change);
        self
    }
}

/// Structured diff attached to a change: the classification-attribute
/// transition and the per-dimension severity transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleChange {
    pub uuid: String,
    pub rule_uuid: String,
    pub old_attribute: Option<CleanCodeAttribute>,
    pub new_attribute: Option<CleanCodeAttribute>,
    /// May be empty for an attribute-only change.
    pub impact_changes: Vec<ImpactChange>,
}

/// Insert payload for a rule diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRuleChange {
    pub rule_uuid: String,
    pub old_attribute: Option<CleanCodeAttribute>,
    pub new_attribute: Option<CleanCodeAttribute>,
    pub impact_changes: Vec<ImpactChange>,
}

impl NewRuleChange {
    pub fn for_rule(rule_uuid: impl Into<String>) -> Self {
        Self {
            rule_uuid: rule_uuid.into(),
            ..Default::default()
        }
    }
}

/// One dimension's severity transition. All four fields independently
/// nullable: addition (old side absent), removal (new side absent), or
/// modification (both present).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactChange {
    pub old_quality: Option<SoftwareQuality>,
    pub new_quality: Option<SoftwareQuality>,
    pub old_severity: Option<ImpactSeverity>,
    pub new_severity: Option<ImpactSeverity>,
}

impl ImpactChange {
    pub fn added(quality: SoftwareQuality, severity: ImpactSeverity) -> Self {
        Self {
            old_quality: None,
            new_quality: Some(quality),
            old_severity: None,
            new_severity: Some(severity),
        }
    }

    pub fn removed(quality: SoftwareQuality, severity: ImpactSeverity) -> Self {
        Self {
            old_quality: Some(quality),
            new_quality: None,
            old_severity: Some(severity),
            new_severity: None,
        }
    }

    pub fn modified(quality: SoftwareQuality, old: ImpactSeverity, new: ImpactSeverity) -> Self {
        Self {
            old_quality: Some(quality),
            new_quality: Some(quality),
            old_severity: Some(old),
            new_severity: Some(new),
        }
    }
}

/// Time-ranged, paginated retrieval over one profile's ledger slice.
/// The timestamp range is half-open: `[from, to)`.
#[derive(Debug, Clone)]
pub struct ChangeQuery {
    pub profile_key: String,
    pub from_inclusive: Option<DateTime<Utc>>,
    pub to_exclusive: Option<DateTime<Utc>>,
    pub offset: usize,
    pub limit: usize,
}

impl ChangeQuery {
    pub fn for_profile(profile_key: impl Into<String>) -> Self {
        Self {
            profile_key: profile_key.into(),
            from_inclusive: None,
            to_exclusive: None,
            offset: 0,
            limit: DEFAULT_CHANGE_PAGE_SIZE,
        }
    }

    pub fn since(mut self, from_inclusive: DateTime<Utc>) -> Self {
        self.from_inclusive = Some(from_inclusive);
        self
    }

    pub fn until(mut self, to_exclusive: DateTime<Utc>) -> Self {
        self.to_exclusive = Some(to_exclusive);
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }
}
