//! Structured diffs between two activation states, in the shape the
//! change ledger records them.

use qprof_core::change::ImpactChange;
use qprof_core::profile::Impacts;

/// Per-dimension transitions between two impact maps: dimensions only
/// in `old` become removals, only in `new` become additions, present
/// in both with different severities become modifications. Unchanged
/// dimensions produce nothing.
pub fn impacts_diff(old: &Impacts, new: &Impacts) -> Vec<ImpactChange> {
    let mut changes = Vec::new();
    for (quality, old_severity) in old {
        match new.get(quality) {
            Some(new_severity) if new_severity != old_severity => {
                changes.push(ImpactChange::modified(*quality, *old_severity, *new_severity));
            }
            Some(_) => {}
            None => changes.push(ImpactChange::removed(*quality, *old_severity)),
        }
    }
    for (quality, new_severity) in new {
        if !old.contains_key(quality) {
            changes.push(ImpactChange::added(*quality, *new_severity));
        }
    }
    changes
}
