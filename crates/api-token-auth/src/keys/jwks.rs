//! JWKS document types and the key-set fetcher.
//!
//! The issuer publishes its signing keys as a JSON Web Key Set. The
//! endpoint is derived from the issuer URL by a fixed convention
//! (`{issuer}/.well-known/jwks.json`); the response is a set of keys
//! each tagged with a key identifier and algorithm.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// JSON Web Key from the issuer's JWKS endpoint.
///
/// Carries both OKP (Ed25519, `crv`/`x`) and RSA (`n`/`e`) key
/// material; which fields are consulted depends on the configured
/// algorithm.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("OKP" for Ed25519, "RSA" for RSA keys).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// Curve name for OKP keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// OKP public key value (base64url encoded).
    #[serde(default)]
    pub x: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm the key is published for.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS response from the issuer.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// A fetched signing key together with its fetch timestamp.
///
/// Immutable once fetched: the cache replaces whole key sets, it never
/// mutates an entry in place.
#[derive(Debug, Clone)]
pub struct SigningKey {
    /// The published key material.
    pub jwk: Jwk,

    /// When this key was fetched (Unix epoch seconds).
    pub fetched_at: i64,
}

impl SigningKey {
    pub(crate) fn from_jwk(jwk: Jwk) -> Self {
        Self {
            jwk,
            fetched_at: Utc::now().timestamp(),
        }
    }
}

/// Failure to retrieve the issuer's key set.
///
/// Covers network failures, non-success responses and unparseable
/// bodies alike; the cache treats all of them identically.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FetchError {
    message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Retrieves the issuer's full key set.
///
/// Production uses [`HttpKeySetFetcher`]; tests substitute in-memory
/// implementations.
#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    async fn fetch_key_set(&self) -> Result<JwksResponse, FetchError>;
}

/// Derive the JWKS endpoint from an issuer URL.
///
/// Fixed discovery convention: `{issuer}/.well-known/jwks.json`, with
/// any trailing slash on the issuer collapsed.
pub fn jwks_url_for_issuer(issuer: &str) -> String {
    format!(
        "{}/.well-known/jwks.json",
        issuer.trim_end_matches('/')
    )
}

/// HTTP key-set fetcher against the issuer's JWKS endpoint.
pub struct HttpKeySetFetcher {
    jwks_url: String,
    http_client: reqwest::Client,
}

impl HttpKeySetFetcher {
    /// Create a fetcher for the given JWKS URL.
    ///
    /// The HTTP client carries the same timeout the cache enforces, so
    /// a stalled provider is cut off at the transport as well.
    pub fn new(jwks_url: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "auth.keys", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
        }
    }

    /// Create a fetcher for the issuer's derived JWKS endpoint.
    pub fn for_issuer(issuer: &str, timeout: Duration) -> Self {
        Self::new(jwks_url_for_issuer(issuer), timeout)
    }
}

#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    async fn fetch_key_set(&self) -> Result<JwksResponse, FetchError> {
        tracing::debug!(target: "auth.keys", url = %self.jwks_url, "Fetching JWKS from issuer");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "auth.keys", error = %e, "Failed to fetch JWKS");
                FetchError::new(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "auth.keys",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(FetchError::new(format!(
                "key endpoint returned status {}",
                response.status()
            )));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "auth.keys", error = %e, "Failed to parse JWKS response");
            FetchError::new(format!("unparseable key set: {e}"))
        })?;

        Ok(jwks)
    }
}
