pub mod activation_store;
pub mod change_ledger;
pub mod profile_store;

pub use activation_store::ActivationStore;
pub use change_ledger::ChangeLedger;
pub use profile_store::{ProfileStore, RuleRegistry};
