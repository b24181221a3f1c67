use serde::{Deserialize, Serialize};

/// Relationship of an activation to the corresponding row in the parent
/// profile. Closed tri-state so every consumer handles all three cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Inheritance {
    /// The profile has no parent, or the rule is not active in the parent.
    None,
    /// Severity, impacts, and parameter overrides equal the parent row
    /// as of the last reconciliation.
    Inherited,
    /// A parent row exists and this row's configuration differs from it.
    Overrides,
}

impl Inheritance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Inherited => "INHERITED",
            Self::Overrides => "OVERRIDES",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NONE" => Some(Self::None),
            "INHERITED" => Some(Self::Inherited),
            "OVERRIDES" => Some(Self::Overrides),
            _ => None,
        }
    }
}
