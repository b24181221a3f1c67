//! # qprof-inheritance
//!
//! Inheritance resolution over the profile forest and the rule
//! activator that propagates activation state to descendant profiles,
//! recording every mutation in the change ledger.

pub mod activator;
pub mod diff;
pub mod resolver;

pub use activator::{RuleActivation, RuleActivator};
pub use resolver::InheritanceResolver;
