//! Local user provisioning and group reconciliation.
//!
//! After verification, the normalized identity is written through to
//! the local user store: the record is created on first sight of a
//! subject, profile fields are overwritten from the token, and managed
//! group membership is reconciled against the token's groups. The whole
//! step is idempotent; re-authenticating with the same token leaves the
//! record unchanged apart from its sync timestamp.

mod models;
mod store;

pub use models::{GroupMap, LocalGroup, LocalUser};
pub use store::{MemoryUserStore, NewUser, StoreError, UserStore};

use crate::errors::AuthError;
use crate::verify::NormalizedIdentity;
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;

/// Retry bound for optimistic-concurrency conflicts.
const MAX_UPDATE_ATTEMPTS: usize = 4;

/// Creates and updates local user records from normalized identities.
pub struct Provisioner {
    store: Arc<dyn UserStore>,
    groups: GroupMap,
}

impl Provisioner {
    pub fn new(store: Arc<dyn UserStore>, groups: GroupMap) -> Self {
        Self { store, groups }
    }

    /// Synchronize the local record for an identity and return it.
    ///
    /// Managed group membership becomes exactly what the identity's
    /// groups map to; membership in local-only groups is preserved
    /// untouched. Conflicting concurrent updates are retried from a
    /// fresh read, a bounded number of times.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Provisioning` if the store fails or the
    /// retry budget is exhausted.
    #[instrument(skip(self, identity))]
    pub async fn provision(&self, identity: &NormalizedIdentity) -> Result<LocalUser, AuthError> {
        let target = self.groups.target_for(&identity.groups);

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let existing = self
                .store
                .find_by_subject(&identity.subject)
                .await
                .map_err(|e| AuthError::Provisioning(e.to_string()))?;

            let mut user = match existing {
                Some(user) => user,
                None => {
                    match self
                        .store
                        .insert(NewUser {
                            subject: identity.subject.clone(),
                            email: identity.email.clone(),
                            given_name: identity.given_name.clone(),
                            family_name: identity.family_name.clone(),
                        })
                        .await
                    {
                        Ok(created) => {
                            tracing::info!(
                                target: "auth.provision",
                                user_id = %created.id,
                                "Provisioned new user"
                            );
                            created
                        }
                        // Another request created the record first;
                        // re-read and reconcile against it.
                        Err(StoreError::DuplicateSubject) => continue,
                        Err(e) => return Err(AuthError::Provisioning(e.to_string())),
                    }
                }
            };

            user.email = identity.email.clone();
            user.given_name = identity.given_name.clone();
            user.family_name = identity.family_name.clone();

            // Keep local-only memberships, replace managed ones
            let mut groups: std::collections::BTreeSet<String> = user
                .groups
                .difference(self.groups.managed())
                .cloned()
                .collect();
            groups.extend(target.iter().cloned());
            user.groups = groups;

            user.synced_at = Utc::now().timestamp();

            match self.store.update(&user).await {
                Ok(updated) => {
                    tracing::debug!(
                        target: "auth.provision",
                        user_id = %updated.id,
                        group_count = updated.groups.len(),
                        "User record synchronized"
                    );
                    return Ok(updated);
                }
                Err(StoreError::Conflict) => {
                    tracing::debug!(
                        target: "auth.provision",
                        attempt = attempt,
                        "Concurrent update conflict, retrying"
                    );
                }
                Err(e) => return Err(AuthError::Provisioning(e.to_string())),
            }
        }

        Err(AuthError::Provisioning(
            "too many concurrent updates for subject".to_string(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn identity(subject: &str, groups: &[&str]) -> NormalizedIdentity {
        NormalizedIdentity {
            subject: subject.to_string(),
            email: Some(format!("{subject}@example.org")),
            given_name: Some("Ada".to_string()),
            family_name: Some("Lovelace".to_string()),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    fn group_map() -> GroupMap {
        GroupMap::new([
            LocalGroup {
                name: "editors".to_string(),
                external_id: Some("ext-a".to_string()),
            },
            LocalGroup {
                name: "reviewers".to_string(),
                external_id: Some("ext-b".to_string()),
            },
            LocalGroup {
                name: "admins".to_string(),
                external_id: Some("ext-c".to_string()),
            },
        ])
    }

    fn names(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_first_sight_creates_user_with_mapped_groups() {
        let store = Arc::new(MemoryUserStore::new());
        let provisioner = Provisioner::new(Arc::clone(&store) as Arc<dyn UserStore>, group_map());

        let user = provisioner
            .provision(&identity("user-1", &["ext-a", "ext-unknown"]))
            .await
            .unwrap();

        assert_eq!(user.subject, "user-1");
        assert_eq!(user.email.as_deref(), Some("user-1@example.org"));
        assert_eq!(user.groups, names(&["editors"]));
    }

    #[tokio::test]
    async fn test_provisioning_is_idempotent() {
        let store = Arc::new(MemoryUserStore::new());
        let provisioner = Provisioner::new(Arc::clone(&store) as Arc<dyn UserStore>, group_map());
        let id = identity("user-1", &["ext-a", "ext-b"]);

        let first = provisioner.provision(&id).await.unwrap();
        let second = provisioner.provision(&id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.groups, second.groups);
        assert_eq!(first.email, second.email);
        // Only the version (and possibly synced_at) moved
        assert_eq!(second.version, first.version + 1);
    }

    #[tokio::test]
    async fn test_existing_user_updated_not_recreated() {
        let store = Arc::new(MemoryUserStore::new());
        let provisioner = Provisioner::new(Arc::clone(&store) as Arc<dyn UserStore>, group_map());

        let created = provisioner
            .provision(&identity("user-1", &["ext-a"]))
            .await
            .unwrap();

        let mut changed = identity("user-1", &["ext-a"]);
        changed.email = Some("renamed@example.org".to_string());
        let updated = provisioner.provision(&changed).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.email.as_deref(), Some("renamed@example.org"));
    }

    #[tokio::test]
    async fn test_group_resync_preserves_local_only_membership() {
        let store = Arc::new(MemoryUserStore::new());
        let provisioner = Provisioner::new(Arc::clone(&store) as Arc<dyn UserStore>, group_map());

        // Authenticate into {editors, reviewers}
        let user = provisioner
            .provision(&identity("user-1", &["ext-a", "ext-b"]))
            .await
            .unwrap();
        assert_eq!(user.groups, names(&["editors", "reviewers"]));

        // Grant a local-only group out of band
        let mut edited = user.clone();
        edited.groups.insert("beta-testers".to_string());
        store.update(&edited).await.unwrap();

        // Token now carries {reviewers, admins}: editors is removed,
        // reviewers kept, admins added, beta-testers untouched
        let resynced = provisioner
            .provision(&identity("user-1", &["ext-b", "ext-c"]))
            .await
            .unwrap();

        assert_eq!(
            resynced.groups,
            names(&["admins", "beta-testers", "reviewers"])
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_subject_provisioning_stays_coherent() {
        let store = Arc::new(MemoryUserStore::new());
        let provisioner = Arc::new(Provisioner::new(
            Arc::clone(&store) as Arc<dyn UserStore>,
            group_map(),
        ));

        // Racing requests for one subject with disagreeing claim sets.
        // Creation races hit the duplicate-insert path, update races
        // the version-conflict retry; both must converge.
        let mut handles = Vec::new();
        for i in 0..16 {
            let provisioner = Arc::clone(&provisioner);
            let external = if i % 2 == 0 { "ext-a" } else { "ext-b" };
            handles.push(tokio::spawn(async move {
                provisioner.provision(&identity("user-1", &[external])).await
            }));
        }

        for handle in handles {
            let user = handle.await.unwrap().unwrap();
            // Each observed state is one request's claim set, never a
            // merge of two
            assert!(
                user.groups == names(&["editors"]) || user.groups == names(&["reviewers"]),
                "merged group set observed: {:?}",
                user.groups
            );
        }

        let stored = store.find_by_subject("user-1").await.unwrap().unwrap();
        assert!(
            stored.groups == names(&["editors"]) || stored.groups == names(&["reviewers"])
        );
        // One insert plus one successful versioned update per request
        assert_eq!(stored.version, 17);
    }

    #[tokio::test]
    async fn test_empty_token_groups_clears_managed_membership() {
        let store = Arc::new(MemoryUserStore::new());
        let provisioner = Provisioner::new(Arc::clone(&store) as Arc<dyn UserStore>, group_map());

        provisioner
            .provision(&identity("user-1", &["ext-a", "ext-b"]))
            .await
            .unwrap();

        let cleared = provisioner
            .provision(&identity("user-1", &[]))
            .await
            .unwrap();

        assert!(cleared.groups.is_empty());
    }
}
