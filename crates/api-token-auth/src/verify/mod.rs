//! Bearer token verification.
//!
//! Verification is a fixed sequence of checks, each with its own error:
//! structural parse, key lookup, signature, expiry window, issuer,
//! audience, and optional API scope. The sequence fails fast; the first
//! failing check determines the error, so a token that is both expired
//! and for the wrong audience reports expiry.
//!
//! The configured algorithm is the only one trusted. The token header's
//! `alg` field never selects the verification algorithm; a key or
//! signature of any other kind fails the signature check.

mod claims;

pub use claims::{map_identity, NormalizedIdentity, TokenClaims};

use crate::config::{AuthConfig, SignatureAlg};
use crate::errors::AuthError;
use crate::keys::{Jwk, KeyCache};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

/// Maximum JWT size in bytes. Tokens larger than this are rejected
/// before any parsing.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Verifies bearer tokens against the configured issuer.
pub struct TokenVerifier {
    config: Arc<AuthConfig>,
    keys: Arc<KeyCache>,
}

impl TokenVerifier {
    pub fn new(config: Arc<AuthConfig>, keys: Arc<KeyCache>) -> Self {
        Self { config, keys }
    }

    /// Verify a compact JWT and return its claims.
    ///
    /// # Errors
    ///
    /// Each check has a dedicated variant; see [`AuthError`].
    #[instrument(skip(self, token))]
    pub async fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let kid = extract_kid(token)?;

        let key = self.keys.get_key(&kid).await?;
        let decoding_key = decoding_key_for(&key.jwk, self.config.algorithm)?;

        // Signature only; the temporal and claim checks below are done
        // by hand so each failure maps to its own error.
        let mut validation = Validation::new(self.config.algorithm.to_jwt_algorithm());
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        let token_data =
            decode::<TokenClaims>(token, &decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::Base64(_)
                    | ErrorKind::Json(_)
                    | ErrorKind::Utf8(_)
                    | ErrorKind::InvalidToken => {
                        tracing::debug!(target: "auth.jwt", error = %e, "Token failed to parse");
                        AuthError::MalformedToken
                    }
                    _ => {
                        tracing::debug!(target: "auth.jwt", error = %e, "Token signature rejected");
                        AuthError::InvalidSignature
                    }
                }
            })?;

        self.check_claims(&token_data.claims, Utc::now().timestamp())?;

        tracing::debug!(
            target: "auth.jwt",
            iss = %token_data.claims.iss,
            "Token verified"
        );

        Ok(token_data.claims)
    }

    /// Ordered claim checks against an explicit clock reading.
    fn check_claims(&self, claims: &TokenClaims, now: i64) -> Result<(), AuthError> {
        let skew = self.config.clock_skew_seconds;

        if now > claims.exp.saturating_add(skew) {
            tracing::debug!(target: "auth.jwt", exp = claims.exp, "Token expired");
            return Err(AuthError::ExpiredToken);
        }

        if let Some(nbf) = claims.nbf {
            if now.saturating_add(skew) < nbf {
                tracing::debug!(target: "auth.jwt", nbf = nbf, "Token not yet valid");
                return Err(AuthError::ExpiredToken);
            }
        }

        if claims.iss != self.config.issuer {
            tracing::debug!(target: "auth.jwt", iss = %claims.iss, "Token issuer not trusted");
            return Err(AuthError::IssuerMismatch);
        }

        if !claims.aud.iter().any(|a| a == &self.config.audience) {
            tracing::debug!(target: "auth.jwt", aud = ?claims.aud, "Token audience not accepted");
            return Err(AuthError::AudienceMismatch);
        }

        if self.config.require_api_scope
            && !claims.has_scope_with_prefix(&self.config.api_scope_prefix)
        {
            tracing::debug!(
                target: "auth.jwt",
                prefix = %self.config.api_scope_prefix,
                "Token lacks required API scope"
            );
            return Err(AuthError::InsufficientScope(
                self.config.api_scope_prefix.clone(),
            ));
        }

        Ok(())
    }
}

/// Extract the key ID from a JWT header without verifying the token.
///
/// Rejects oversized tokens, tokens that are not three dot-separated
/// segments, and headers without a non-empty string `kid`.
fn extract_kid(token: &str) -> Result<String, AuthError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(target: "auth.jwt", size = token.len(), "Token exceeds size limit");
        return Err(AuthError::MalformedToken);
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::MalformedToken);
    }

    let header_segment = parts.first().ok_or(AuthError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_segment)
        .map_err(|_| AuthError::MalformedToken)?;
    let header: serde_json::Value =
        serde_json::from_slice(&header_bytes).map_err(|_| AuthError::MalformedToken)?;

    match header.get("kid").and_then(|v| v.as_str()) {
        Some(kid) if !kid.is_empty() => Ok(kid.to_string()),
        _ => Err(AuthError::MalformedToken),
    }
}

/// Build a `jsonwebtoken` decoding key from a fetched JWK, enforcing
/// that the key material matches the configured algorithm.
fn decoding_key_for(jwk: &Jwk, algorithm: SignatureAlg) -> Result<DecodingKey, AuthError> {
    // A published alg that disagrees with the configured one means the
    // key was never meant for this verification.
    if let Some(alg) = &jwk.alg {
        if alg != algorithm.jwk_alg() {
            tracing::debug!(target: "auth.jwt", jwk_alg = %alg, "Key algorithm mismatch");
            return Err(AuthError::InvalidSignature);
        }
    }

    match algorithm {
        SignatureAlg::EdDsa => {
            if jwk.kty != "OKP" {
                return Err(AuthError::InvalidSignature);
            }
            let x = jwk.x.as_deref().ok_or(AuthError::InvalidSignature)?;
            let public_key = URL_SAFE_NO_PAD
                .decode(x)
                .map_err(|_| AuthError::InvalidSignature)?;
            Ok(DecodingKey::from_ed_der(&public_key))
        }
        SignatureAlg::Rs256 => {
            if jwk.kty != "RSA" {
                return Err(AuthError::InvalidSignature);
            }
            let n = jwk.n.as_deref().ok_or(AuthError::InvalidSignature)?;
            let e = jwk.e.as_deref().ok_or(AuthError::InvalidSignature)?;
            DecodingKey::from_rsa_components(n, e).map_err(|_| AuthError::InvalidSignature)
        }
    }
}
