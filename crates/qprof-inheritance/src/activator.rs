//! Rule activation with recursive propagation down the profile forest.
//!
//! Every mutation re-derives the inheritance flag of the touched row
//! against its immediate parent, walks the descendant chain (stopping
//! at overriding rows), and records the whole pass as one ledger batch
//! so history shows a single moment per logical operation.

use std::collections::BTreeMap;

use chrono::Utc;

use qprof_core::change::{Change, ChangeType, NewChange, NewRuleChange};
use qprof_core::errors::{QProfError, QProfResult};
use qprof_core::profile::{
    ActiveRule, ActiveRuleKey, Impacts, Inheritance, NewActiveRule, Profile, Severity,
};
use qprof_core::traits::{ActivationStore, ChangeLedger, ProfileStore, RuleRegistry};

use crate::diff::impacts_diff;

/// Parameter overrides keyed by rule-parameter definition uuid.
pub type ParamValues = BTreeMap<String, Option<String>>;

/// Requested activation state for one rule in one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleActivation {
    pub severity: Option<Severity>,
    pub impacts: Impacts,
    pub prioritized: bool,
    pub params: ParamValues,
}

impl RuleActivation {
    pub fn with_severity(severity: Severity) -> Self {
        Self {
            severity: Some(severity),
            ..Default::default()
        }
    }

    pub fn with_impacts(impacts: Impacts) -> Self {
        Self {
            impacts,
            ..Default::default()
        }
    }
}

/// Activation state of one row plus its parameter overrides, as
/// compared for inheritance-flag derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RowState {
    severity: Option<Severity>,
    impacts: Impacts,
    prioritized: bool,
    params: ParamValues,
}

impl RowState {
    fn of(row: &ActiveRule, params: ParamValues) -> Self {
        Self {
            severity: row.severity,
            impacts: row.impacts.clone(),
            prioritized: row.prioritized,
            params,
        }
    }
}

/// Activates, updates, and deactivates rules across a profile and its
/// descendants.
pub struct RuleActivator<'a, S>
where
    S: ProfileStore + RuleRegistry + ActivationStore + ChangeLedger + ?Sized,
{
    store: &'a S,
}

impl<'a, S> RuleActivator<'a, S>
where
    S: ProfileStore + RuleRegistry + ActivationStore + ChangeLedger + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Activate a rule in a profile, or update its activation if the
    /// rule is already active, then propagate down the descendant
    /// chain. Returns the recorded ledger entries — one per touched
    /// profile, all sharing one timestamp.
    pub fn activate(
        &self,
        profile_key: &str,
        rule_uuid: &str,
        activation: RuleActivation,
        user_uuid: Option<&str>,
    ) -> QProfResult<Vec<Change>> {
        let profile = self
            .store
            .select_profile(profile_key)?
            .ok_or(QProfError::NotPersisted { entity: "profile" })?;
        if self.store.select_rule(rule_uuid)?.is_none() {
            return Err(QProfError::NotPersisted { entity: "rule" });
        }

        let mut changes = Vec::new();
        self.apply(&profile, rule_uuid, Some(&activation), user_uuid, &mut changes, false)?;
        self.store.append_batch(changes)
    }

    /// Deactivate a rule in a profile and remove the inherited copies
    /// in its descendants. Overriding descendant rows are left
    /// untouched. Idempotent: unknown profiles or missing activations
    /// record nothing.
    pub fn deactivate(
        &self,
        profile_key: &str,
        rule_uuid: &str,
        user_uuid: Option<&str>,
    ) -> QProfResult<Vec<Change>> {
        let Some(profile) = self.store.select_profile(profile_key)? else {
            return Ok(Vec::new());
        };

        let mut changes = Vec::new();
        self.remove(&profile, rule_uuid, user_uuid, &mut changes, false)?;
        self.store.append_batch(changes)
    }

    /// One step of the activation walk. `requested` carries the
    /// caller's state on the root profile; descendants re-derive
    /// theirs from the immediate parent instead.
    fn apply(
        &self,
        profile: &Profile,
        rule_uuid: &str,
        requested: Option<&RuleActivation>,
        user_uuid: Option<&str>,
        changes: &mut Vec<NewChange>,
        cascading: bool,
    ) -> QProfResult<()> {
        let key = ActiveRuleKey::of(profile.rules_profile_uuid.clone(), rule_uuid.to_string());
        let existing = self.store.select_activation(&key)?;

        // A descendant that overrides its parent is detached from
        // propagation, and so is everything below it.
        if cascading {
            if let Some(row) = &existing {
                if row.inheritance == Inheritance::Overrides {
                    tracing::debug!(
                        profile = %profile.key,
                        rule = %rule_uuid,
                        "propagation stopped at overriding activation"
                    );
                    return Ok(());
                }
            }
        }

        let parent = self.parent_state(profile, rule_uuid)?;

        let desired = match (cascading, requested) {
            (true, _) => {
                let Some(parent_state) = &parent else {
                    // Nothing to inherit; an inherited row without a
                    // parent row cannot legitimately exist.
                    return Ok(());
                };
                match &existing {
                    // An independently-activated row keeps its own
                    // configuration; only its flag is re-derived
                    // against the parent's new state.
                    Some(row) if row.inheritance == Inheritance::None => {
                        RowState::of(row, self.param_values(&row.uuid)?)
                    }
                    _ => parent_state.clone(),
                }
            }
            (false, Some(activation)) => RowState {
                severity: activation.severity,
                impacts: activation.impacts.clone(),
                prioritized: activation.prioritized,
                params: activation.params.clone(),
            },
            (false, None) => return Ok(()),
        };

        let flag = match &parent {
            None => Inheritance::None,
            Some(parent_state) if *parent_state == desired => Inheritance::Inherited,
            Some(_) => Inheritance::Overrides,
        };

        match existing {
            Some(row) => {
                let old_params = self.param_values(&row.uuid)?;
                let old = RowState::of(&row, old_params);
                if old == desired && row.inheritance == flag {
                    // Nothing changed here, so nothing changed below.
                    return Ok(());
                }

                let mut updated = row.clone();
                updated.severity = desired.severity;
                updated.impacts = desired.impacts.clone();
                updated.prioritized = desired.prioritized;
                updated.inheritance = flag;
                self.store.update_activation(&updated)?;
                self.sync_params(&row.uuid, &old.params, &desired.params)?;

                changes.push(self.change_entry(
                    profile,
                    rule_uuid,
                    ChangeType::Updated,
                    user_uuid,
                    &old.impacts,
                    &desired.impacts,
                    old.severity,
                    desired.severity,
                ));
            }
            None => {
                let inserted = self.store.activate(
                    &key,
                    NewActiveRule {
                        severity: desired.severity,
                        impacts: desired.impacts.clone(),
                        inheritance: Some(flag),
                        prioritized: desired.prioritized,
                    },
                )?;
                for (rule_param_uuid, value) in &desired.params {
                    self.store
                        .insert_param(&inserted.uuid, rule_param_uuid, value.clone())?;
                }

                changes.push(self.change_entry(
                    profile,
                    rule_uuid,
                    ChangeType::Activated,
                    user_uuid,
                    &Impacts::new(),
                    &desired.impacts,
                    None,
                    desired.severity,
                ));
            }
        }

        self.touch(profile)?;

        for child in self.store.select_children(&[profile.key.clone()])? {
            self.apply(&child, rule_uuid, None, user_uuid, changes, true)?;
        }
        Ok(())
    }

    /// One step of the deactivation walk.
    fn remove(
        &self,
        profile: &Profile,
        rule_uuid: &str,
        user_uuid: Option<&str>,
        changes: &mut Vec<NewChange>,
        cascading: bool,
    ) -> QProfResult<()> {
        let key = ActiveRuleKey::of(profile.rules_profile_uuid.clone(), rule_uuid.to_string());
        let Some(row) = self.store.select_activation(&key)? else {
            return Ok(());
        };
        // Cascading removal only takes inherited copies with it:
        // overriding rows are left untouched, and rows activated
        // independently of the parent never interact with it.
        if cascading && row.inheritance != Inheritance::Inherited {
            return Ok(());
        }

        let old_impacts = row.impacts.clone();
        let old_severity = row.severity;
        self.store.deactivate(&key)?;

        changes.push(self.change_entry(
            profile,
            rule_uuid,
            ChangeType::Deactivated,
            user_uuid,
            &old_impacts,
            &Impacts::new(),
            old_severity,
            None,
        ));

        self.touch(profile)?;

        for child in self.store.select_children(&[profile.key.clone()])? {
            self.remove(&child, rule_uuid, user_uuid, changes, true)?;
        }
        Ok(())
    }

    /// The immediate parent's activation state for a rule, when both
    /// the parent and its activation row exist.
    fn parent_state(&self, profile: &Profile, rule_uuid: &str) -> QProfResult<Option<RowState>> {
        let Some(parent_key) = &profile.parent_key else {
            return Ok(None);
        };
        let Some(parent) = self.store.select_profile(parent_key)? else {
            return Ok(None);
        };
        let key = ActiveRuleKey::of(parent.rules_profile_uuid, rule_uuid.to_string());
        let Some(row) = self.store.select_activation(&key)? else {
            return Ok(None);
        };
        let params = self.param_values(&row.uuid)?;
        Ok(Some(RowState::of(&row, params)))
    }

    fn param_values(&self, active_rule_uuid: &str) -> QProfResult<ParamValues> {
        let params = self.store.select_params_by_active_rule(active_rule_uuid)?;
        Ok(params
            .into_iter()
            .map(|p| (p.rule_param_uuid, p.value))
            .collect())
    }

    /// Reconcile stored parameter overrides with the desired set:
    /// insert missing, rewrite differing, delete surplus.
    fn sync_params(
        &self,
        active_rule_uuid: &str,
        old: &ParamValues,
        desired: &ParamValues,
    ) -> QProfResult<()> {
        if old == desired {
            return Ok(());
        }
        let rows = self.store.select_params_by_active_rule(active_rule_uuid)?;
        for row in &rows {
            match desired.get(&row.rule_param_uuid) {
                Some(value) if *value != row.value => {
                    let mut updated = row.clone();
                    updated.value = value.clone();
                    self.store.update_param(&updated)?;
                }
                Some(_) => {}
                None => self.store.delete_param(&row.uuid)?,
            }
        }
        for (rule_param_uuid, value) in desired {
            if !rows.iter().any(|r| &r.rule_param_uuid == rule_param_uuid) {
                self.store
                    .insert_param(active_rule_uuid, rule_param_uuid, value.clone())?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn change_entry(
        &self,
        profile: &Profile,
        rule_uuid: &str,
        change_type: ChangeType,
        user_uuid: Option<&str>,
        old_impacts: &Impacts,
        new_impacts: &Impacts,
        old_severity: Option<Severity>,
        new_severity: Option<Severity>,
    ) -> NewChange {
        let mut change = NewChange::new(profile.rules_profile_uuid.clone(), change_type);
        if let Some(user) = user_uuid {
            change = change.by_user(user);
        }

        let payload = serde_json::json!({
            "severity": new_severity.map(|s| s.as_str()),
            "prevSeverity": old_severity.map(|s| s.as_str()),
        });
        change = change.with_data(payload.to_string());

        let impact_changes = impacts_diff(old_impacts, new_impacts);
        if !impact_changes.is_empty() {
            let mut rule_change = NewRuleChange::for_rule(rule_uuid.to_string());
            rule_change.impact_changes = impact_changes;
            change = change.with_rule_change(rule_change);
        }
        change
    }

    /// Bump the profile's rule-set timestamp after a mutation.
    fn touch(&self, profile: &Profile) -> QProfResult<()> {
        let mut updated = profile.clone();
        updated.rules_updated_at = Utc::now();
        self.store.update_profile(&updated)
    }
}
