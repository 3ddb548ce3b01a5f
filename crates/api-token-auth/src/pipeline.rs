//! The end-to-end authentication pipeline.
//!
//! Ties the stages together: bearer extraction, token verification,
//! claims normalization and user provisioning. The outcome of a
//! successful run is a [`Principal`]; every failure is a typed
//! [`AuthError`]. There is no anonymous-success path.

use crate::config::AuthConfig;
use crate::errors::AuthError;
use crate::keys::{HttpKeySetFetcher, KeyCache, KeySetFetcher};
use crate::provision::{GroupMap, LocalUser, Provisioner, UserStore};
use crate::verify::{map_identity, TokenVerifier};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use std::sync::Arc;
use tracing::instrument;

/// Authenticated caller: the synchronized local user plus the scopes
/// carried by the presented token.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: LocalUser,
    pub scopes: Vec<String>,
}

/// Bearer token authentication pipeline.
pub struct AuthPipeline {
    config: Arc<AuthConfig>,
    verifier: TokenVerifier,
    provisioner: Provisioner,
}

impl AuthPipeline {
    /// Build a pipeline fetching keys from the issuer's JWKS endpoint.
    pub fn new(config: Arc<AuthConfig>, store: Arc<dyn UserStore>, groups: GroupMap) -> Self {
        let fetcher = Arc::new(HttpKeySetFetcher::for_issuer(
            &config.issuer,
            config.key_fetch_timeout,
        ));
        Self::with_fetcher(config, store, groups, fetcher)
    }

    /// Build a pipeline over an explicit key-set fetcher.
    pub fn with_fetcher(
        config: Arc<AuthConfig>,
        store: Arc<dyn UserStore>,
        groups: GroupMap,
        fetcher: Arc<dyn KeySetFetcher>,
    ) -> Self {
        let cache = Arc::new(KeyCache::new(fetcher, config.key_fetch_timeout));
        Self {
            verifier: TokenVerifier::new(Arc::clone(&config), cache),
            provisioner: Provisioner::new(store, groups),
            config,
        }
    }

    /// Authenticate a request from its headers.
    ///
    /// # Errors
    ///
    /// `MissingToken` if no bearer credentials are presented,
    /// `MalformedToken` if the authorization header is unusable, plus
    /// everything [`AuthPipeline::authenticate_token`] can return.
    #[instrument(skip(self, headers))]
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = bearer_token(headers)?;
        self.authenticate_token(token).await
    }

    /// Authenticate an already-extracted bearer token.
    pub async fn authenticate_token(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.verifier.verify(token).await?;
        let identity = map_identity(&claims, self.config.provider);
        let user = self.provisioner.provision(&identity).await?;

        tracing::info!(
            target: "auth.middleware",
            user_id = %user.id,
            "Request authenticated"
        );

        Ok(Principal {
            user,
            scopes: claims.scopes().iter().map(|s| s.to_string()).collect(),
        })
    }
}

/// Extract the bearer credentials from request headers.
///
/// The scheme is matched case-insensitively. A header with the wrong
/// scheme counts as no credentials at all; a header with the right
/// scheme but the wrong shape is malformed.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers.get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let value = header.to_str().map_err(|_| AuthError::MalformedToken)?;

    let mut parts = value.split_whitespace();
    let scheme = parts.next().ok_or(AuthError::MissingToken)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingToken);
    }

    let token = parts.next().ok_or(AuthError::MalformedToken)?;
    if parts.next().is_some() {
        return Err(AuthError::MalformedToken);
    }

    Ok(token)
}
