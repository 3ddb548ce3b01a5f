//! Local user and group records.

use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Local user record kept in sync with the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUser {
    /// Local record identifier, assigned on creation.
    pub id: Uuid,

    /// Stable subject identifier from the provider; the lookup key.
    pub subject: String,

    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,

    /// Names of the local groups the user belongs to.
    pub groups: BTreeSet<String>,

    /// When this record was last synchronized (Unix epoch seconds).
    pub synced_at: i64,

    /// Optimistic concurrency version, bumped on every update.
    pub version: u64,
}

/// Local group definition.
///
/// A group with an `external_id` is managed: membership follows the
/// provider's group claims. A group without one is local-only and is
/// never touched by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalGroup {
    pub name: String,
    pub external_id: Option<String>,
}

/// Mapping from provider group identifiers to local group names.
///
/// Built once from the deployment's group definitions; reconciliation
/// consults it on every authentication.
#[derive(Debug, Clone, Default)]
pub struct GroupMap {
    by_external_id: HashMap<String, String>,
    managed: BTreeSet<String>,
}

impl GroupMap {
    pub fn new(groups: impl IntoIterator<Item = LocalGroup>) -> Self {
        let mut by_external_id = HashMap::new();
        let mut managed = BTreeSet::new();

        for group in groups {
            if let Some(external_id) = group.external_id {
                by_external_id.insert(external_id, group.name.clone());
                managed.insert(group.name);
            }
        }

        Self {
            by_external_id,
            managed,
        }
    }

    /// Local group names the given external identifiers map to.
    ///
    /// External identifiers with no local mapping are ignored; the
    /// provider may advertise groups this deployment does not model.
    pub fn target_for<'a>(
        &self,
        external_ids: impl IntoIterator<Item = &'a String>,
    ) -> BTreeSet<String> {
        external_ids
            .into_iter()
            .filter_map(|id| self.by_external_id.get(id).cloned())
            .collect()
    }

    /// Names of all managed groups (those with an external mapping).
    pub fn managed(&self) -> &BTreeSet<String> {
        &self.managed
    }
}
