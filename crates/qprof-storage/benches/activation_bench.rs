use criterion::{criterion_group, criterion_main, Criterion};

use qprof_core::profile::{ActiveRuleKey, NewActiveRule, Profile, RuleProfile, Severity};
use qprof_core::rule::RuleRef;
use qprof_core::traits::{ActivationStore, ProfileStore, RuleRegistry};
use qprof_storage::StorageEngine;

fn seeded_engine(rule_count: usize) -> (StorageEngine, Profile) {
    let engine = StorageEngine::open_in_memory().unwrap();
    let rule_profile = RuleProfile::new("Bench", "rust");
    engine.insert_rule_profile(&rule_profile).unwrap();
    let profile = Profile::for_rule_profile(&rule_profile);
    engine.insert_profile(&profile).unwrap();

    for i in 0..rule_count {
        let rule = RuleRef::new("repo", format!("S{i}"), "rust");
        engine.insert_rule(&rule).unwrap();
        engine
            .activate(
                &ActiveRuleKey::of(profile.rules_profile_uuid.clone(), rule.uuid.clone()),
                NewActiveRule::with_severity(Severity::Major),
            )
            .unwrap();
    }
    (engine, profile)
}

fn bench_select_by_rule_profile(c: &mut Criterion) {
    let (engine, profile) = seeded_engine(500);
    c.bench_function("select_by_rule_profile_500", |b| {
        b.iter(|| {
            engine
                .select_by_rule_profile(&profile.rules_profile_uuid)
                .unwrap()
        })
    });
}

fn bench_scroll_all(c: &mut Criterion) {
    let (engine, _profile) = seeded_engine(500);
    c.bench_function("scroll_all_500", |b| {
        b.iter(|| {
            let mut count = 0usize;
            engine.scroll_all_for_indexing(&mut |_| count += 1).unwrap();
            count
        })
    });
}

criterion_group!(benches, bench_select_by_rule_profile, bench_scroll_all);
criterion_main!(benches);
