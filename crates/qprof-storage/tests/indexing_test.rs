//! Integration tests for the indexing feed: three scroll modes, fresh
//! passes, flattened rule identity.

use std::collections::HashSet;

use qprof_core::profile::{
    ActiveRuleKey, IndexedActiveRule, NewActiveRule, Profile, RuleProfile, Severity,
};
use qprof_core::rule::RuleRef;
use qprof_core::traits::{ActivationStore, ProfileStore, RuleRegistry};
use qprof_storage::StorageEngine;

fn engine() -> StorageEngine {
    StorageEngine::open_in_memory().unwrap()
}

fn setup_profile(engine: &StorageEngine, name: &str) -> Profile {
    let rule_profile = RuleProfile::new(name, "rust");
    engine.insert_rule_profile(&rule_profile).unwrap();
    let profile = Profile::for_rule_profile(&rule_profile);
    engine.insert_profile(&profile).unwrap();
    profile
}

fn setup_rule(engine: &StorageEngine, key: &str) -> RuleRef {
    let rule = RuleRef::new("repo", key, "rust");
    engine.insert_rule(&rule).unwrap();
    rule
}

fn collect_all(engine: &StorageEngine) -> Vec<IndexedActiveRule> {
    let mut collected = Vec::new();
    engine
        .scroll_all_for_indexing(&mut |row| collected.push(row))
        .unwrap();
    collected
}

#[test]
fn scroll_all_on_empty_table_pushes_nothing() {
    let engine = engine();
    assert!(collect_all(&engine).is_empty());
}

#[test]
fn scroll_all_flattens_rule_identity_into_each_row() {
    let engine = engine();
    let p1 = setup_profile(&engine, "P1");
    let p2 = setup_profile(&engine, "P2");
    let r1 = setup_rule(&engine, "S100");
    let r2 = setup_rule(&engine, "S200");

    let a1 = engine
        .activate(
            &ActiveRuleKey::of(p1.rules_profile_uuid.clone(), r1.uuid.clone()),
            NewActiveRule::with_severity(Severity::Blocker),
        )
        .unwrap();
    let a2 = engine
        .activate(
            &ActiveRuleKey::of(p2.rules_profile_uuid.clone(), r1.uuid.clone()),
            NewActiveRule::with_severity(Severity::Major),
        )
        .unwrap();
    let a3 = engine
        .activate(
            &ActiveRuleKey::of(p2.rules_profile_uuid.clone(), r2.uuid.clone()),
            NewActiveRule {
                severity: None,
                prioritized: true,
                ..Default::default()
            },
        )
        .unwrap();

    let collected = collect_all(&engine);
    assert_eq!(collected.len(), 3);

    let uuids: HashSet<&str> = collected.iter().map(|row| row.uuid.as_str()).collect();
    assert_eq!(
        uuids,
        HashSet::from([a1.uuid.as_str(), a2.uuid.as_str(), a3.uuid.as_str()])
    );

    let first = collected.iter().find(|row| row.uuid == a1.uuid).unwrap();
    assert_eq!(first.rule_uuid, r1.uuid);
    assert_eq!(first.repository, "repo");
    assert_eq!(first.rule_key, "S100");
    assert_eq!(first.rule_profile_uuid, p1.rules_profile_uuid);
    assert_eq!(first.severity, Some(Severity::Blocker));

    let third = collected.iter().find(|row| row.uuid == a3.uuid).unwrap();
    assert_eq!(third.severity, None);
    assert!(third.prioritized);
}

#[test]
fn scroll_by_uuids_restricts_to_named_rows() {
    let engine = engine();
    let p1 = setup_profile(&engine, "P1");
    let p2 = setup_profile(&engine, "P2");
    let r1 = setup_rule(&engine, "S100");
    let r2 = setup_rule(&engine, "S200");

    let a1 = engine
        .activate(
            &ActiveRuleKey::of(p1.rules_profile_uuid.clone(), r1.uuid.clone()),
            NewActiveRule::with_severity(Severity::Blocker),
        )
        .unwrap();
    let a2 = engine
        .activate(
            &ActiveRuleKey::of(p2.rules_profile_uuid.clone(), r1.uuid.clone()),
            NewActiveRule::with_severity(Severity::Major),
        )
        .unwrap();
    engine
        .activate(
            &ActiveRuleKey::of(p2.rules_profile_uuid.clone(), r2.uuid.clone()),
            NewActiveRule::with_severity(Severity::Minor),
        )
        .unwrap();

    let mut collected = Vec::new();
    engine
        .scroll_by_uuids_for_indexing(&[a1.uuid.clone(), a2.uuid.clone()], &mut |row| {
            collected.push(row)
        })
        .unwrap();

    let uuids: HashSet<&str> = collected.iter().map(|row| row.uuid.as_str()).collect();
    assert_eq!(uuids, HashSet::from([a1.uuid.as_str(), a2.uuid.as_str()]));

    let mut none = Vec::new();
    engine
        .scroll_by_uuids_for_indexing(&[], &mut |row| none.push(row))
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn scroll_by_rule_profile_restricts_to_one_rule_set() {
    let engine = engine();
    let p1 = setup_profile(&engine, "P1");
    let p2 = setup_profile(&engine, "P2");
    let r1 = setup_rule(&engine, "S100");
    let r2 = setup_rule(&engine, "S200");

    engine
        .activate(
            &ActiveRuleKey::of(p1.rules_profile_uuid.clone(), r1.uuid.clone()),
            NewActiveRule::with_severity(Severity::Blocker),
        )
        .unwrap();
    engine
        .activate(
            &ActiveRuleKey::of(p2.rules_profile_uuid.clone(), r1.uuid.clone()),
            NewActiveRule::with_severity(Severity::Major),
        )
        .unwrap();
    engine
        .activate(
            &ActiveRuleKey::of(p2.rules_profile_uuid.clone(), r2.uuid.clone()),
            NewActiveRule::with_severity(Severity::Minor),
        )
        .unwrap();

    let mut collected = Vec::new();
    engine
        .scroll_by_rule_profile_for_indexing(&p2.rules_profile_uuid, &mut |row| {
            collected.push(row)
        })
        .unwrap();
    assert_eq!(collected.len(), 2);
    assert!(collected
        .iter()
        .all(|row| row.rule_profile_uuid == p2.rules_profile_uuid));
}

#[test]
fn each_scroll_call_is_a_fresh_pass() {
    let engine = engine();
    let p1 = setup_profile(&engine, "P1");
    let r1 = setup_rule(&engine, "S100");
    engine
        .activate(
            &ActiveRuleKey::of(p1.rules_profile_uuid.clone(), r1.uuid.clone()),
            NewActiveRule::with_severity(Severity::Blocker),
        )
        .unwrap();

    assert_eq!(collect_all(&engine).len(), 1);
    // No persisted cursor: the second pass sees the full table again.
    assert_eq!(collect_all(&engine).len(), 1);
}
