//! Signing key cache with single-flight refresh.
//!
//! Keys are cached by key identifier for the configured issuer and
//! refreshed on miss, wholesale: a successful fetch replaces every
//! entry for the issuer. Concurrent misses coalesce into a single
//! in-flight fetch; every waiter adopts the outcome of that one fetch,
//! success or failure. A fetch failure invalidates the cached set to
//! bound staleness. No TTL eviction; the cache is purely demand-driven.

use crate::errors::AuthError;
use crate::keys::jwks::{KeySetFetcher, SigningKey};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Outcome of the most recently completed refresh.
///
/// Waiters that were queued behind an in-flight fetch consult this to
/// adopt its result instead of fetching again.
enum LastRefresh {
    Never,
    Succeeded,
    Failed(String),
}

/// Cache of the issuer's signing keys.
pub struct KeyCache {
    fetcher: Arc<dyn KeySetFetcher>,

    /// Keys by key identifier. Entries are replaced wholesale on
    /// refresh, never mutated in place.
    keys: RwLock<HashMap<String, Arc<SigningKey>>>,

    /// Bumped once per completed refresh. A waiter snapshots this
    /// before queuing on `refresh`; a changed value afterwards means a
    /// refresh completed while it waited.
    generation: AtomicU64,

    /// Serializes refreshes and records the last outcome.
    refresh: Mutex<LastRefresh>,

    /// Bound on a single key-set fetch; a timeout is a fetch failure.
    fetch_timeout: Duration,
}

impl KeyCache {
    pub fn new(fetcher: Arc<dyn KeySetFetcher>, fetch_timeout: Duration) -> Self {
        Self {
            fetcher,
            keys: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            refresh: Mutex::new(LastRefresh::Never),
            fetch_timeout,
        }
    }

    /// Get a signing key by key ID, refreshing the cached set on miss.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyFetch` if the key set cannot be fetched
    /// (including timeout), and `AuthError::UnknownKey` if the key ID is
    /// absent after a successful refresh. An unknown key is permanent
    /// for the current request and is not retried.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Arc<SigningKey>, AuthError> {
        if let Some(key) = self.keys.read().await.get(kid) {
            tracing::debug!(target: "auth.keys", kid = %kid, "Signing key cache hit");
            return Ok(Arc::clone(key));
        }

        let observed = self.generation.load(Ordering::Acquire);
        let mut last = self.refresh.lock().await;

        if self.generation.load(Ordering::Acquire) != observed {
            // A refresh completed while this caller waited for the
            // lock; adopt its outcome rather than fetching again.
            if let LastRefresh::Failed(reason) = &*last {
                return Err(AuthError::KeyFetch(reason.clone()));
            }
            return self.lookup_after_refresh(kid).await;
        }

        // A refresh can also land between the read miss and the
        // generation snapshot above; that leaves the generation looking
        // unchanged, so recheck the map before fetching.
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(Arc::clone(key));
        }

        let outcome = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch_key_set()).await;

        let reason = match outcome {
            Ok(Ok(jwks)) => {
                let fresh: HashMap<String, Arc<SigningKey>> = jwks
                    .keys
                    .into_iter()
                    .map(|jwk| (jwk.kid.clone(), Arc::new(SigningKey::from_jwk(jwk))))
                    .collect();

                tracing::info!(
                    target: "auth.keys",
                    key_count = fresh.len(),
                    "Signing key cache refreshed"
                );

                *self.keys.write().await = fresh;
                *last = LastRefresh::Succeeded;
                self.generation.fetch_add(1, Ordering::Release);
                drop(last);

                return self.lookup_after_refresh(kid).await;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "key set fetch timed out after {}s",
                self.fetch_timeout.as_secs()
            ),
        };

        tracing::error!(target: "auth.keys", reason = %reason, "Key set refresh failed, invalidating cache");

        // Rebuild-from-scratch on the next miss; a stale set must not
        // outlive a failed refresh indefinitely.
        self.keys.write().await.clear();
        *last = LastRefresh::Failed(reason.clone());
        self.generation.fetch_add(1, Ordering::Release);

        Err(AuthError::KeyFetch(reason))
    }

    async fn lookup_after_refresh(&self, kid: &str) -> Result<Arc<SigningKey>, AuthError> {
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(Arc::clone(key));
        }
        tracing::warn!(target: "auth.keys", kid = %kid, "Key not found in key set after refresh");
        Err(AuthError::UnknownKey(kid.to_string()))
    }

    /// Number of currently cached keys.
    #[cfg(test)]
    pub async fn entry_count(&self) -> usize {
        self.keys.read().await.len()
    }
}
