//! Integration tests for the activation store: the persistence
//! contract (NotPersisted / AlreadyPersisted), removed-rule exclusion,
//! bulk operations, and parameter overrides.

use qprof_core::profile::{
    ActiveRuleKey, Impacts, ImpactSeverity, Inheritance, NewActiveRule, Profile, RuleProfile,
    Severity, SoftwareQuality,
};
use qprof_core::rule::{RuleParamDef, RuleRef, RuleStatus};
use qprof_core::traits::{ActivationStore, ProfileStore, RuleRegistry};
use qprof_core::QProfError;
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

fn setup_removed_rule(engine: &StorageEngine, key: &str) -> RuleRef {
    let rule = RuleRef::new("repo", key, "rust").with_status(RuleStatus::Removed);
    engine.insert_rule(&rule).unwrap();
    rule
}

fn key_of(profile: &Profile, rule: &RuleRef) -> ActiveRuleKey {
    ActiveRuleKey::of(profile.rules_profile_uuid.clone(), rule.uuid.clone())
}

fn impacts(entries: &[(SoftwareQuality, ImpactSeverity)]) -> Impacts {
    entries.iter().copied().collect()
}

#[test]
fn activate_assigns_identity_and_timestamps() {
    let engine = engine();
    let profile = setup_profile(&engine, "P1");
    let rule = setup_rule(&engine, "S100");

    let row = engine
        .activate(
            &key_of(&profile, &rule),
            NewActiveRule {
                severity: Some(Severity::Blocker),
                impacts: impacts(&[
                    (SoftwareQuality::Security, ImpactSeverity::Blocker),
                    (SoftwareQuality::Reliability, ImpactSeverity::Low),
                ]),
                inheritance: Some(Inheritance::Inherited),
                prioritized: true,
            },
        )
        .unwrap();

    assert!(!row.uuid.is_empty());
    assert_eq!(row.created_at, row.updated_at);

    let reloaded = engine
        .select_activation(&key_of(&profile, &rule))
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.uuid, row.uuid);
    assert_eq!(reloaded.severity, Some(Severity::Blocker));
    assert_eq!(reloaded.inheritance, Inheritance::Inherited);
    assert!(reloaded.prioritized);
    assert_eq!(
        reloaded.impacts.get(&SoftwareQuality::Security),
        Some(&ImpactSeverity::Blocker)
    );
    assert_eq!(reloaded.created_at, row.created_at);
}

#[test]
fn activate_twice_is_already_persisted() {
    let engine = engine();
    let profile = setup_profile(&engine, "P1");
    let rule = setup_rule(&engine, "S100");

    engine
        .activate(
            &key_of(&profile, &rule),
            NewActiveRule::with_severity(Severity::Major),
        )
        .unwrap();
    let err = engine
        .activate(
            &key_of(&profile, &rule),
            NewActiveRule::with_severity(Severity::Minor),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        QProfError::AlreadyPersisted {
            entity: "active rule"
        }
    ));
}

#[test]
fn activate_with_unknown_profile_is_not_persisted() {
    let engine = engine();
    let rule = setup_rule(&engine, "S100");

    let err = engine
        .activate(
            &ActiveRuleKey::of("unknown", rule.uuid.clone()),
            NewActiveRule::with_severity(Severity::Major),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        QProfError::NotPersisted {
            entity: "rule profile"
        }
    ));
}

#[test]
fn activate_with_unknown_rule_is_not_persisted() {
    let engine = engine();
    let profile = setup_profile(&engine, "P1");

    let err = engine
        .activate(
            &ActiveRuleKey::of(profile.rules_profile_uuid.clone(), "unknown"),
            NewActiveRule::with_severity(Severity::Major),
        )
        .unwrap_err();
    assert!(matches!(err, QProfError::NotPersisted { entity: "rule" }));
}

#[test]
fn update_rewrites_state_but_keeps_created_at() {
    let engine = engine();
    let profile = setup_profile(&engine, "P1");
    let rule = setup_rule(&engine, "S100");

    let row = engine
        .activate(
            &key_of(&profile, &rule),
            NewActiveRule::with_severity(Severity::Blocker),
        )
        .unwrap();

    let mut updated = row.clone();
    updated.severity = Some(Severity::Major);
    updated.inheritance = Inheritance::Overrides;
    updated.impacts = impacts(&[(SoftwareQuality::Reliability, ImpactSeverity::Info)]);
    engine.update_activation(&updated).unwrap();

    let reloaded = engine
        .select_activation(&key_of(&profile, &rule))
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.uuid, row.uuid);
    assert_eq!(reloaded.severity, Some(Severity::Major));
    assert_eq!(reloaded.inheritance, Inheritance::Overrides);
    assert_eq!(
        reloaded.impacts,
        impacts(&[(SoftwareQuality::Reliability, ImpactSeverity::Info)])
    );
    // created_at is immutable; updated_at only moves forward.
    assert_eq!(reloaded.created_at, row.created_at);
    assert!(reloaded.updated_at >= row.updated_at);
}

#[test]
fn update_unknown_row_is_not_persisted() {
    let engine = engine();
    let profile = setup_profile(&engine, "P1");
    let rule = setup_rule(&engine, "S100");

    let row = engine
        .activate(
            &key_of(&profile, &rule),
            NewActiveRule::with_severity(Severity::Blocker),
        )
        .unwrap();
    let mut ghost = row.clone();
    ghost.uuid = "ghost".to_string();

    let err = engine.update_activation(&ghost).unwrap_err();
    assert!(matches!(
        err,
        QProfError::NotPersisted {
            entity: "active rule"
        }
    ));
}

#[test]
fn deactivate_is_idempotent() {
    let engine = engine();
    let profile = setup_profile(&engine, "P1");
    let rule = setup_rule(&engine, "S100");
    let key = key_of(&profile, &rule);

    // Deactivating something that was never active is a no-op.
    engine.deactivate(&key).unwrap();

    engine
        .activate(&key, NewActiveRule::with_severity(Severity::Blocker))
        .unwrap();
    engine.deactivate(&key).unwrap();
    assert!(engine.select_activation(&key).unwrap().is_none());

    // And again, after the row is gone.
    engine.deactivate(&key).unwrap();
}

#[test]
fn regular_lookups_exclude_removed_rules() {
    let engine = engine();
    let profile = setup_profile(&engine, "P1");
    let live = setup_rule(&engine, "S100");
    let removed = setup_removed_rule(&engine, "S999");

    engine
        .activate(
            &key_of(&profile, &live),
            NewActiveRule::with_severity(Severity::Major),
        )
        .unwrap();
    engine
        .activate(
            &key_of(&profile, &removed),
            NewActiveRule::with_severity(Severity::Blocker),
        )
        .unwrap();

    let visible = engine
        .select_by_rule_profile(&profile.rules_profile_uuid)
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].rule_uuid, live.uuid);

    assert!(engine.select_by_rule(&removed.uuid).unwrap().is_empty());
}

#[test]
fn removed_rule_filter_is_the_only_inclusion_path() {
    let engine = engine();
    let profile = setup_profile(&engine, "P1");
    let live = setup_rule(&engine, "S100");
    let removed = setup_removed_rule(&engine, "S999");

    engine
        .activate(
            &key_of(&profile, &live),
            NewActiveRule::with_severity(Severity::Major),
        )
        .unwrap();
    engine
        .activate(
            &key_of(&profile, &removed),
            NewActiveRule::with_severity(Severity::Blocker),
        )
        .unwrap();

    let removed_rows = engine
        .select_removed_activations(&profile.rules_profile_uuid)
        .unwrap();
    assert_eq!(removed_rows.len(), 1);
    assert_eq!(removed_rows[0].rule_uuid, removed.uuid);
}

#[test]
fn rule_removal_is_a_status_flip_not_a_row_delete() {
    let engine = engine();
    let profile = setup_profile(&engine, "P1");
    let rule = setup_rule(&engine, "S100");
    engine
        .activate(
            &key_of(&profile, &rule),
            NewActiveRule::with_severity(Severity::Major),
        )
        .unwrap();

    engine
        .update_rule_status(&rule.uuid, RuleStatus::Removed)
        .unwrap();

    assert!(engine
        .select_by_rule_profile(&profile.rules_profile_uuid)
        .unwrap()
        .is_empty());
    assert_eq!(
        engine
            .select_removed_activations(&profile.rules_profile_uuid)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn select_by_rule_spans_profiles() {
    let engine = engine();
    let p1 = setup_profile(&engine, "P1");
    let p2 = setup_profile(&engine, "P2");
    let rule = setup_rule(&engine, "S100");

    engine
        .activate(
            &key_of(&p1, &rule),
            NewActiveRule::with_severity(Severity::Major),
        )
        .unwrap();
    engine
        .activate(
            &key_of(&p2, &rule),
            NewActiveRule::with_severity(Severity::Minor),
        )
        .unwrap();

    assert_eq!(engine.select_by_rule(&rule.uuid).unwrap().len(), 2);
}

#[test]
fn select_by_rule_status_and_profiles_filters_both_axes() {
    let engine = engine();
    let p1 = setup_profile(&engine, "P1");
    let p2 = setup_profile(&engine, "P2");
    let ready = setup_rule(&engine, "S100");
    let beta = RuleRef::new("repo", "S200", "rust").with_status(RuleStatus::Beta);
    engine.insert_rule(&beta).unwrap();

    engine
        .activate(
            &key_of(&p1, &ready),
            NewActiveRule::with_severity(Severity::Major),
        )
        .unwrap();
    engine
        .activate(
            &key_of(&p1, &beta),
            NewActiveRule::with_severity(Severity::Minor),
        )
        .unwrap();
    engine
        .activate(
            &key_of(&p2, &beta),
            NewActiveRule::with_severity(Severity::Minor),
        )
        .unwrap();

    let rows = engine
        .select_by_rule_status_and_profiles(RuleStatus::Beta, &[p1.key.clone()])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].rule_uuid, beta.uuid);

    assert!(engine
        .select_by_rule_status_and_profiles(RuleStatus::Deprecated, &[p1.key.clone()])
        .unwrap()
        .is_empty());
    assert!(engine
        .select_by_rule_status_and_profiles(RuleStatus::Beta, &[])
        .unwrap()
        .is_empty());
}

#[test]
fn select_prioritized_rules_only_returns_flagged_rows() {
    let engine = engine();
    let profile = setup_profile(&engine, "P1");
    let plain = setup_rule(&engine, "S100");
    let flagged = setup_rule(&engine, "S200");

    engine
        .activate(
            &key_of(&profile, &plain),
            NewActiveRule::with_severity(Severity::Major),
        )
        .unwrap();
    engine
        .activate(
            &key_of(&profile, &flagged),
            NewActiveRule {
                severity: Some(Severity::Major),
                prioritized: true,
                ..Default::default()
            },
        )
        .unwrap();

    let prioritized = engine
        .select_prioritized_rules(&[profile.key.clone()])
        .unwrap();
    assert_eq!(prioritized, vec![flagged.uuid]);
}

#[test]
fn deactivate_by_rule_profiles_only_touches_named_profiles() {
    let engine = engine();
    let p1 = setup_profile(&engine, "P1");
    let p2 = setup_profile(&engine, "P2");
    let r1 = setup_rule(&engine, "S100");
    let r2 = setup_rule(&engine, "S200");

    engine
        .activate(&key_of(&p1, &r1), NewActiveRule::with_severity(Severity::Major))
        .unwrap();
    engine
        .activate(&key_of(&p1, &r2), NewActiveRule::with_severity(Severity::Major))
        .unwrap();
    engine
        .activate(&key_of(&p2, &r1), NewActiveRule::with_severity(Severity::Major))
        .unwrap();

    engine
        .deactivate_by_rule_profiles(&[p1.rules_profile_uuid.clone()])
        .unwrap();

    assert!(engine
        .select_by_rule_profile(&p1.rules_profile_uuid)
        .unwrap()
        .is_empty());
    assert_eq!(
        engine
            .select_by_rule_profile(&p2.rules_profile_uuid)
            .unwrap()
            .len(),
        1
    );

    // Unknown and empty inputs are no-ops.
    engine
        .deactivate_by_rule_profiles(&["does_not_exist".to_string()])
        .unwrap();
    engine.deactivate_by_rule_profiles(&[]).unwrap();
}

#[test]
fn deactivate_by_uuids_deletes_exactly_the_named_rows() {
    let engine = engine();
    let p1 = setup_profile(&engine, "P1");
    let p2 = setup_profile(&engine, "P2");
    let r1 = setup_rule(&engine, "S100");
    let r2 = setup_rule(&engine, "S200");

    let a1 = engine
        .activate(&key_of(&p1, &r1), NewActiveRule::with_severity(Severity::Major))
        .unwrap();
    let a2 = engine
        .activate(&key_of(&p1, &r2), NewActiveRule::with_severity(Severity::Major))
        .unwrap();
    let a3 = engine
        .activate(&key_of(&p2, &r1), NewActiveRule::with_severity(Severity::Major))
        .unwrap();

    engine
        .deactivate_by_uuids(&[a1.uuid.clone(), a3.uuid.clone()])
        .unwrap();

    let remaining = engine
        .select_by_rule_profile(&p1.rules_profile_uuid)
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].uuid, a2.uuid);
    assert!(engine
        .select_by_rule_profile(&p2.rules_profile_uuid)
        .unwrap()
        .is_empty());

    engine.deactivate_by_uuids(&[]).unwrap();
}

// ── Parameter overrides ─────────────────────────────────────────────

#[test]
fn insert_param_denormalizes_the_definition_name() {
    let engine = engine();
    let profile = setup_profile(&engine, "P1");
    let rule = setup_rule(&engine, "S100");
    let def = RuleParamDef::new(&rule, "threshold");
    engine.insert_rule_param(&def).unwrap();

    let row = engine
        .activate(
            &key_of(&profile, &rule),
            NewActiveRule::with_severity(Severity::Critical),
        )
        .unwrap();
    let param = engine
        .insert_param(&row.uuid, &def.uuid, Some("42".to_string()))
        .unwrap();

    assert_eq!(param.key, "threshold");
    assert_eq!(param.active_rule_uuid, row.uuid);
    assert_eq!(param.rule_param_uuid, def.uuid);

    let reloaded = engine.select_params_by_active_rule(&row.uuid).unwrap();
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded[0].value.as_deref(), Some("42"));
}

#[test]
fn insert_param_requires_persisted_owner_and_definition() {
    let engine = engine();
    let profile = setup_profile(&engine, "P1");
    let rule = setup_rule(&engine, "S100");
    let def = RuleParamDef::new(&rule, "threshold");
    engine.insert_rule_param(&def).unwrap();

    let err = engine
        .insert_param("ghost", &def.uuid, Some("42".to_string()))
        .unwrap_err();
    assert!(matches!(
        err,
        QProfError::NotPersisted {
            entity: "active rule"
        }
    ));

    let row = engine
        .activate(
            &key_of(&profile, &rule),
            NewActiveRule::with_severity(Severity::Critical),
        )
        .unwrap();
    let err = engine
        .insert_param(&row.uuid, "ghost", Some("42".to_string()))
        .unwrap_err();
    assert!(matches!(
        err,
        QProfError::NotPersisted {
            entity: "rule parameter"
        }
    ));
}

#[test]
fn update_param_rewrites_value() {
    let engine = engine();
    let profile = setup_profile(&engine, "P1");
    let rule = setup_rule(&engine, "S100");
    let def = RuleParamDef::new(&rule, "threshold");
    engine.insert_rule_param(&def).unwrap();
    let row = engine
        .activate(
            &key_of(&profile, &rule),
            NewActiveRule::with_severity(Severity::Critical),
        )
        .unwrap();
    let mut param = engine
        .insert_param(&row.uuid, &def.uuid, Some("foo".to_string()))
        .unwrap();

    param.value = Some("bar".to_string());
    engine.update_param(&param).unwrap();

    let reloaded = engine.select_params_by_active_rule(&row.uuid).unwrap();
    assert_eq!(reloaded[0].value.as_deref(), Some("bar"));

    param.uuid = "ghost".to_string();
    assert!(matches!(
        engine.update_param(&param).unwrap_err(),
        QProfError::NotPersisted {
            entity: "active rule parameter"
        }
    ));
}

#[test]
fn select_params_by_active_rules_and_profiles() {
    let engine = engine();
    let p1 = setup_profile(&engine, "P1");
    let p2 = setup_profile(&engine, "P2");
    let rule = setup_rule(&engine, "S100");
    let rule2 = setup_rule(&engine, "S200");
    let def1 = RuleParamDef::new(&rule, "a");
    let def2 = RuleParamDef::new(&rule, "b");
    let def3 = RuleParamDef::new(&rule2, "c");
    engine.insert_rule_param(&def1).unwrap();
    engine.insert_rule_param(&def2).unwrap();
    engine.insert_rule_param(&def3).unwrap();

    let a1 = engine
        .activate(&key_of(&p1, &rule), NewActiveRule::with_severity(Severity::Major))
        .unwrap();
    let a2 = engine
        .activate(&key_of(&p1, &rule2), NewActiveRule::with_severity(Severity::Major))
        .unwrap();
    let a3 = engine
        .activate(&key_of(&p2, &rule), NewActiveRule::with_severity(Severity::Major))
        .unwrap();
    engine.insert_param(&a1.uuid, &def1.uuid, Some("1".into())).unwrap();
    engine.insert_param(&a1.uuid, &def2.uuid, Some("2".into())).unwrap();
    engine.insert_param(&a2.uuid, &def3.uuid, Some("3".into())).unwrap();
    engine.insert_param(&a3.uuid, &def1.uuid, Some("4".into())).unwrap();

    assert_eq!(
        engine
            .select_params_by_active_rules(&[a1.uuid.clone(), a2.uuid.clone()])
            .unwrap()
            .len(),
        3
    );
    assert!(engine.select_params_by_active_rules(&[]).unwrap().is_empty());

    assert_eq!(
        engine.select_params_by_profiles(&[p1.key.clone()]).unwrap().len(),
        3
    );
    assert_eq!(
        engine
            .select_params_by_profiles(&[p1.key.clone(), p2.key.clone()])
            .unwrap()
            .len(),
        4
    );
}

#[test]
fn delete_params_by_rule_param_spans_profiles() {
    let engine = engine();
    let p1 = setup_profile(&engine, "P1");
    let p2 = setup_profile(&engine, "P2");
    let rule = setup_rule(&engine, "S100");
    let def = RuleParamDef::new(&rule, "threshold");
    engine.insert_rule_param(&def).unwrap();

    let a1 = engine
        .activate(&key_of(&p1, &rule), NewActiveRule::with_severity(Severity::Major))
        .unwrap();
    let a2 = engine
        .activate(&key_of(&p2, &rule), NewActiveRule::with_severity(Severity::Major))
        .unwrap();
    engine.insert_param(&a1.uuid, &def.uuid, Some("foo".into())).unwrap();
    engine.insert_param(&a2.uuid, &def.uuid, Some("bar".into())).unwrap();

    engine.delete_params_by_rule_param(&def.uuid).unwrap();

    assert!(engine.select_params_by_active_rule(&a1.uuid).unwrap().is_empty());
    assert!(engine.select_params_by_active_rule(&a2.uuid).unwrap().is_empty());
}

#[test]
fn delete_params_by_owner_sets() {
    let engine = engine();
    let profile = setup_profile(&engine, "P1");
    let rule = setup_rule(&engine, "S100");
    let rule2 = setup_rule(&engine, "S200");
    let def1 = RuleParamDef::new(&rule, "a");
    let def2 = RuleParamDef::new(&rule2, "b");
    engine.insert_rule_param(&def1).unwrap();
    engine.insert_rule_param(&def2).unwrap();

    let a1 = engine
        .activate(&key_of(&profile, &rule), NewActiveRule::with_severity(Severity::Major))
        .unwrap();
    let a2 = engine
        .activate(&key_of(&profile, &rule2), NewActiveRule::with_severity(Severity::Major))
        .unwrap();
    engine.insert_param(&a1.uuid, &def1.uuid, Some("foo".into())).unwrap();
    engine.insert_param(&a2.uuid, &def2.uuid, Some("bar".into())).unwrap();

    engine.delete_params_by_active_rules(&[a1.uuid.clone()]).unwrap();
    assert!(engine.select_params_by_active_rule(&a1.uuid).unwrap().is_empty());
    assert_eq!(engine.select_params_by_active_rule(&a2.uuid).unwrap().len(), 1);

    engine
        .delete_params_by_rule_profiles(&[profile.rules_profile_uuid.clone()])
        .unwrap();
    assert!(engine.select_params_by_active_rule(&a2.uuid).unwrap().is_empty());

    engine.delete_params_by_rule_profiles(&[]).unwrap();
    engine.delete_params_by_active_rules(&[]).unwrap();
}

#[test]
fn deactivate_takes_parameter_overrides_with_the_row() {
    let engine = engine();
    let profile = setup_profile(&engine, "P1");
    let rule = setup_rule(&engine, "S100");
    let def = RuleParamDef::new(&rule, "threshold");
    engine.insert_rule_param(&def).unwrap();
    let key = key_of(&profile, &rule);
    let row = engine
        .activate(&key, NewActiveRule::with_severity(Severity::Major))
        .unwrap();
    engine.insert_param(&row.uuid, &def.uuid, Some("7".into())).unwrap();

    engine.deactivate(&key).unwrap();

    assert!(engine.select_params_by_active_rule(&row.uuid).unwrap().is_empty());
}
