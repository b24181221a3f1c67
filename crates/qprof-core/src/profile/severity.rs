//! Severity scales and classification axes used by rule activations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Rule severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
    Blocker,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Minor => "MINOR",
            Self::Major => "MAJOR",
            Self::Critical => "CRITICAL",
            Self::Blocker => "BLOCKER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INFO" => Some(Self::Info),
            "MINOR" => Some(Self::Minor),
            "MAJOR" => Some(Self::Major),
            "CRITICAL" => Some(Self::Critical),
            "BLOCKER" => Some(Self::Blocker),
            _ => None,
        }
    }
}

/// Software-quality dimension an activation can carry an impact for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SoftwareQuality {
    Maintainability,
    Reliability,
    Security,
}

impl SoftwareQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maintainability => "MAINTAINABILITY",
            Self::Reliability => "RELIABILITY",
            Self::Security => "SECURITY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MAINTAINABILITY" => Some(Self::Maintainability),
            "RELIABILITY" => Some(Self::Reliability),
            "SECURITY" => Some(Self::Security),
            _ => None,
        }
    }
}

/// Per-dimension impact severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImpactSeverity {
    Info,
    Low,
    Medium,
    High,
    Blocker,
}

impl ImpactSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Blocker => "BLOCKER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INFO" => Some(Self::Info),
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "BLOCKER" => Some(Self::Blocker),
            _ => None,
        }
    }
}

/// Mapping of quality dimension to impact severity. Keys are unique;
/// insertion order is irrelevant, so a sorted map keeps the serialized
/// form canonical and comparable.
pub type Impacts = BTreeMap<SoftwareQuality, ImpactSeverity>;

/// Clean-code classification attribute of a rule. Used only in the
/// structured diff attached to ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CleanCodeAttribute {
    Conventional,
    Formatted,
    Identifiable,
    Clear,
    Complete,
    Efficient,
    Logical,
    Distinct,
    Focused,
    Modular,
    Tested,
    Lawful,
    Respectful,
    Trustworthy,
}

impl CleanCodeAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conventional => "CONVENTIONAL",
            Self::Formatted => "FORMATTED",
            Self::Identifiable => "IDENTIFIABLE",
            Self::Clear => "CLEAR",
            Self::Complete => "COMPLETE",
            Self::Efficient => "EFFICIENT",
            Self::Logical => "LOGICAL",
            Self::Distinct => "DISTINCT",
            Self::Focused => "FOCUSED",
            Self::Modular => "MODULAR",
            Self::Tested => "TESTED",
            Self::Lawful => "LAWFUL",
            Self::Respectful => "RESPECTFUL",
            Self::Trustworthy => "TRUSTWORTHY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CONVENTIONAL" => Some(Self::Conventional),
            "FORMATTED" => Some(Self::Formatted),
            "IDENTIFIABLE" => Some(Self::Identifiable),
            "CLEAR" => Some(Self::Clear),
            "COMPLETE" => Some(Self::Complete),
            "EFFICIENT" => Some(Self::Efficient),
            "LOGICAL" => Some(Self::Logical),
            "DISTINCT" => Some(Self::Distinct),
            "FOCUSED" => Some(Self::Focused),
            "MODULAR" => Some(Self::Modular),
            "TESTED" => Some(Self::Tested),
            "LAWFUL" => Some(Self::Lawful),
            "RESPECTFUL" => Some(Self::Respectful),
            "TRUSTWORTHY" => Some(Self::Trustworthy),
            _ => None,
        }
    }
}
