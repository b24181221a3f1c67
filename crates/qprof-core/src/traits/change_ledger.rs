use crate::change::{Change, ChangeQuery, NewChange};
use crate::errors::QProfResult;

/// Append-only audit trail of profile changes. Timestamps are owned by
/// the ledger: entries appended in one batch share one timestamp, and
/// timestamps never decrease across the ledger.
pub trait ChangeLedger: Send + Sync {
    /// Appends one entry. Fails with `InvalidState` when the caller
    /// pre-populated `created_at`.
    fn append(&self, change: NewChange) -> QProfResult<Change>;
    /// Appends several entries as one logical moment: distinct
    /// identities, identical timestamps, one transaction.
    fn append_batch(&self, changes: Vec<NewChange>) -> QProfResult<Vec<Change>>;
    /// Entries for one profile, newest first, half-open time range,
    /// offset/limit pagination. Unknown profile keys yield an empty
    /// sequence. Each entry is hydrated with its rule diff.
    fn query_changes(&self, query: &ChangeQuery) -> QProfResult<Vec<Change>>;
    /// Cardinality of `query_changes` ignoring pagination.
    fn count_changes(&self, query: &ChangeQuery) -> QProfResult<usize>;
    /// Bulk delete by owning rule profile; unknown uuids are ignored.
    fn purge_by_rule_profiles(&self, rule_profile_uuids: &[String]) -> QProfResult<()>;
}
