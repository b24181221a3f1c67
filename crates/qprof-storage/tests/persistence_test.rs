//! File-backed engine tests: data survives a close/reopen cycle, and
//! reads go through the read pool instead of the writer.

use qprof_core::profile::{ActiveRuleKey, NewActiveRule, Profile, RuleProfile, Severity};
use qprof_core::rule::RuleRef;
use qprof_core::traits::{ActivationStore, ProfileStore, RuleRegistry};
use qprof_storage::StorageEngine;

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("qprof.db");

    let rule_profile = RuleProfile::new("Persistent", "rust");
    let profile = Profile::for_rule_profile(&rule_profile);
    let rule = RuleRef::new("repo", "S100", "rust");
    let key = ActiveRuleKey::of(profile.rules_profile_uuid.clone(), rule.uuid.clone());

    {
        let engine = StorageEngine::open(&db_path).unwrap();
        engine.insert_rule_profile(&rule_profile).unwrap();
        engine.insert_profile(&profile).unwrap();
        engine.insert_rule(&rule).unwrap();
        engine
            .activate(&key, NewActiveRule::with_severity(Severity::Blocker))
            .unwrap();
    }

    let reopened = StorageEngine::open(&db_path).unwrap();
    let reloaded_profile = reopened.select_profile(&profile.key).unwrap().unwrap();
    assert_eq!(reloaded_profile.name, "Persistent");

    // File-backed reads run on the read pool; the row written before
    // the reopen must be visible there.
    let row = reopened.select_activation(&key).unwrap().unwrap();
    assert_eq!(row.severity, Some(Severity::Blocker));
}

#[test]
fn reopening_reruns_migrations_idempotently() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("qprof.db");

    {
        StorageEngine::open(&db_path).unwrap();
    }
    // A second open applies no migrations but must not fail.
    StorageEngine::open(&db_path).unwrap();
}
