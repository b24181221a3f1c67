//! Descendant resolution over the parent-pointer forest of profiles,
//! and the validation that keeps that forest acyclic.

use std::collections::HashSet;

use qprof_core::errors::{QProfError, QProfResult};
use qprof_core::profile::Profile;
use qprof_core::traits::ProfileStore;

/// Resolves ancestor/descendant relationships over the profile forest.
pub struct InheritanceResolver<'a, S: ProfileStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ProfileStore + ?Sized> InheritanceResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Direct children of any of the given profiles (one hop).
    /// Unknown keys contribute nothing.
    pub fn children_of(&self, base_keys: &[String]) -> QProfResult<Vec<Profile>> {
        self.store.select_children(base_keys)
    }

    /// Transitive closure of all profiles whose parent chain reaches
    /// any of the given profiles, at any depth. Deduplicated across
    /// overlapping base sets; order unspecified. A base key that does
    /// not exist in storage contributes no descendants.
    pub fn descendants_of(&self, base_keys: &[String]) -> QProfResult<Vec<Profile>> {
        let mut visited: HashSet<String> = base_keys.iter().cloned().collect();
        let mut frontier: Vec<String> = visited.iter().cloned().collect();
        let mut descendants = Vec::new();

        while !frontier.is_empty() {
            let children = self.store.select_children(&frontier)?;
            frontier = Vec::new();
            for child in children {
                // The visited set both deduplicates overlapping base
                // sets and terminates on a corrupt cyclic chain.
                if visited.insert(child.key.clone()) {
                    frontier.push(child.key.clone());
                    descendants.push(child);
                }
            }
        }
        Ok(descendants)
    }

    /// Ancestor chain of a profile, nearest first. Stops if the chain
    /// loops back on itself.
    pub fn ancestors_of(&self, profile: &Profile) -> QProfResult<Vec<Profile>> {
        let mut seen: HashSet<String> = HashSet::from([profile.key.clone()]);
        let mut ancestors = Vec::new();
        let mut next = profile.parent_key.clone();
        while let Some(parent_key) = next {
            if !seen.insert(parent_key.clone()) {
                tracing::warn!(profile = %profile.key, "cyclic parent chain in storage");
                break;
            }
            match self.store.select_profile(&parent_key)? {
                Some(parent) => {
                    next = parent.parent_key.clone();
                    ancestors.push(parent);
                }
                None => break,
            }
        }
        Ok(ancestors)
    }

    /// Validate a prospective parent link: the parent must exist,
    /// share the profile's language, and must not make the profile its
    /// own ancestor.
    pub fn validate_parent(&self, profile: &Profile, parent_key: Option<&str>) -> QProfResult<()> {
        let Some(parent_key) = parent_key else {
            return Ok(());
        };
        if parent_key == profile.key {
            return Err(QProfError::invalid_state(format!(
                "profile '{}' cannot be its own parent",
                profile.key
            )));
        }
        let parent = self
            .store
            .select_profile(parent_key)?
            .ok_or(QProfError::NotPersisted {
                entity: "parent profile",
            })?;
        if parent.language != profile.language {
            return Err(QProfError::invalid_state(format!(
                "parent profile '{}' is for language '{}', not '{}'",
                parent.key, parent.language, profile.language
            )));
        }
        // Walk the ancestor chain of the prospective parent; reaching
        // the profile itself means the link would close a cycle.
        for ancestor in self.ancestors_of(&parent)? {
            if ancestor.key == profile.key {
                return Err(QProfError::invalid_state(format!(
                    "profile '{}' is an ancestor of '{}', linking would create a cycle",
                    profile.key, parent.key
                )));
            }
        }
        Ok(())
    }

    /// Rebind (or clear) a profile's parent link after validating the
    /// forest invariants. Returns the updated profile. Reconciling the
    /// activation rows against the new parent is the caller's
    /// follow-up, via the activator.
    pub fn set_parent(&self, profile_key: &str, parent_key: Option<&str>) -> QProfResult<Profile> {
        let mut profile =
            self.store
                .select_profile(profile_key)?
                .ok_or(QProfError::NotPersisted {
                    entity: "profile",
                })?;
        self.validate_parent(&profile, parent_key)?;
        profile.parent_key = parent_key.map(str::to_string);
        self.store.update_profile(&profile)?;
        Ok(profile)
    }
}
