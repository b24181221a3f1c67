//! # qprof-core
//!
//! Foundation crate for the qprof quality-profile engine.
//! Defines all types, traits, errors, config, and constants.
//! Every other crate in the workspace depends on this.

pub mod change;
pub mod config;
pub mod constants;
pub mod errors;
pub mod profile;
pub mod rule;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use change::{Change, ChangeQuery, ChangeType, ImpactChange, NewChange, NewRuleChange, RuleChange};
pub use config::StorageConfig;
pub use errors::{QProfError, QProfResult};
pub use profile::{
    ActiveRule, ActiveRuleKey, ActiveRuleParam, CleanCodeAttribute, Impacts, ImpactSeverity,
    Inheritance, NewActiveRule, Profile, RuleProfile, Severity, SoftwareQuality,
};
pub use rule::{RuleParamDef, RuleRef, RuleStatus};
