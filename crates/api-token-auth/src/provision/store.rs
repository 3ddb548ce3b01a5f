//! User persistence behind a trait.
//!
//! The provisioner only needs subject lookup, insert and versioned
//! update; [`UserStore`] is that seam. [`MemoryUserStore`] is the
//! in-process implementation used in tests and single-node deployments.

use crate::provision::models::LocalUser;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Persistence failure surfaced to the provisioner.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The record changed since it was read. The caller re-reads and
    /// retries.
    #[error("concurrent update conflict for subject")]
    Conflict,

    /// A record for the subject already exists. Raised by insert when
    /// two callers race to create the same user.
    #[error("user record already exists for subject")]
    DuplicateSubject,

    /// The backend itself failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Fields for a user record being created.
///
/// Groups always start empty; membership is set by the reconciliation
/// step that follows creation.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub subject: String,
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

/// Store of local user records keyed by subject.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<LocalUser>, StoreError>;

    /// Create a record at version 1 with empty group membership.
    ///
    /// # Errors
    ///
    /// `DuplicateSubject` if a record for the subject already exists.
    async fn insert(&self, user: NewUser) -> Result<LocalUser, StoreError>;

    /// Persist an updated record if its version still matches.
    ///
    /// On success the returned record carries the bumped version.
    ///
    /// # Errors
    ///
    /// `Conflict` if the stored version differs from `user.version`.
    async fn update(&self, user: &LocalUser) -> Result<LocalUser, StoreError>;
}

/// In-memory user store.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, LocalUser>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<LocalUser>, StoreError> {
        let users = self
            .users
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(users.get(subject).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<LocalUser, StoreError> {
        let mut users = self
            .users
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if users.contains_key(&user.subject) {
            return Err(StoreError::DuplicateSubject);
        }

        let record = LocalUser {
            id: Uuid::new_v4(),
            subject: user.subject.clone(),
            email: user.email,
            given_name: user.given_name,
            family_name: user.family_name,
            groups: BTreeSet::new(),
            synced_at: Utc::now().timestamp(),
            version: 1,
        };

        users.insert(user.subject, record.clone());
        Ok(record)
    }

    async fn update(&self, user: &LocalUser) -> Result<LocalUser, StoreError> {
        let mut users = self
            .users
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let current = users
            .get(&user.subject)
            .ok_or_else(|| StoreError::Backend("record vanished during update".to_string()))?;

        if current.version != user.version {
            return Err(StoreError::Conflict);
        }

        let mut updated = user.clone();
        updated.version = user.version.saturating_add(1);
        users.insert(updated.subject.clone(), updated.clone());
        Ok(updated)
    }
}
