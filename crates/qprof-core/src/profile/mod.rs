pub mod active_rule;
pub mod identity;
pub mod inheritance;
pub mod severity;

pub use active_rule::{
    ActiveRule, ActiveRuleCountQuery, ActiveRuleKey, ActiveRuleParam, IndexedActiveRule,
    NewActiveRule,
};
pub use identity::{DefaultProfile, Profile, RuleProfile};
pub use inheritance::Inheritance;
pub use severity::{CleanCodeAttribute, Impacts, ImpactSeverity, Severity, SoftwareQuality};
