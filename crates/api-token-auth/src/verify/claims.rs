//! Token claims and identity normalization.
//!
//! Providers differ in claim vocabulary (single-string vs array `aud`,
//! `groups` vs `ad_groups`, string vs array `amr`). Deserialization
//! absorbs the shape differences; [`map_identity`] collapses the
//! vocabulary differences into one provider-independent
//! [`NormalizedIdentity`] that the provisioner consumes.

use crate::config::ProviderProfile;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::fmt;

/// Claims carried by a verified access token.
///
/// Only deserialized, never constructed for signing; this service is a
/// token consumer.
#[derive(Clone, Deserialize)]
pub struct TokenClaims {
    /// Issuer URL.
    pub iss: String,

    /// Audience set. A bare string is normalized to a one-element set.
    #[serde(default, deserialize_with = "string_or_seq")]
    pub aud: Vec<String>,

    /// Subject identifier, the stable key for the local user record.
    pub sub: String,

    /// Expiry (Unix epoch seconds).
    pub exp: i64,

    /// Not-before (Unix epoch seconds).
    #[serde(default)]
    pub nbf: Option<i64>,

    /// Issued-at (Unix epoch seconds).
    #[serde(default)]
    pub iat: Option<i64>,

    /// Space-separated OAuth scope string.
    #[serde(default)]
    pub scope: Option<String>,

    /// Group identifiers under the standard vocabulary.
    #[serde(default)]
    pub groups: Vec<String>,

    /// Group identifiers under the directory-synced vocabulary.
    #[serde(default)]
    pub ad_groups: Vec<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub given_name: Option<String>,

    #[serde(default)]
    pub family_name: Option<String>,

    /// Authentication methods reference. Some providers emit a bare
    /// string where the JWT spec requires an array; both are accepted.
    #[serde(default, deserialize_with = "opt_string_or_seq")]
    pub amr: Option<Vec<String>>,
}

impl TokenClaims {
    /// Individual scope entries of the `scope` claim.
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Whether any scope entry starts with the given prefix.
    ///
    /// Literal prefix comparison; `projects` matches both `projects` and
    /// `projects.read`.
    pub fn has_scope_with_prefix(&self, prefix: &str) -> bool {
        self.scopes().iter().any(|s| s.starts_with(prefix))
    }
}

// The subject is a stable personal identifier; keep it out of logs.
impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("scope", &self.scope)
            .field("groups", &self.groups)
            .field("ad_groups", &self.ad_groups)
            .field("amr", &self.amr)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    OneOrMany::deserialize(deserializer).map(Vec::from)
}

fn opt_string_or_seq<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<OneOrMany>::deserialize(deserializer).map(|o| o.map(Vec::from))
}

/// Provider-independent identity extracted from verified claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedIdentity {
    /// Stable subject identifier.
    pub subject: String,

    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,

    /// External group identifiers, deduplicated and ordered.
    pub groups: BTreeSet<String>,
}

/// Map verified claims to a normalized identity under the configured
/// provider profile.
///
/// Pure function of its inputs; all provider-specific vocabulary ends
/// here.
pub fn map_identity(claims: &TokenClaims, provider: ProviderProfile) -> NormalizedIdentity {
    let groups = match provider {
        ProviderProfile::Standard => &claims.groups,
        ProviderProfile::AdGroups => &claims.ad_groups,
    };

    NormalizedIdentity {
        subject: claims.sub.clone(),
        email: claims.email.clone(),
        given_name: claims.given_name.clone(),
        family_name: claims.family_name.clone(),
        groups: groups.iter().cloned().collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parse(json: &str) -> TokenClaims {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_aud_accepts_string_and_array() {
        let single = parse(r#"{"iss": "i", "sub": "s", "exp": 1, "aud": "api.example"}"#);
        assert_eq!(single.aud, vec!["api.example"]);

        let multi =
            parse(r#"{"iss": "i", "sub": "s", "exp": 1, "aud": ["api.example", "other"]}"#);
        assert_eq!(multi.aud, vec!["api.example", "other"]);
    }

    #[test]
    fn test_amr_string_normalized_to_array() {
        let claims = parse(r#"{"iss": "i", "sub": "s", "exp": 1, "amr": "pwd"}"#);
        assert_eq!(claims.amr, Some(vec!["pwd".to_string()]));

        let claims = parse(r#"{"iss": "i", "sub": "s", "exp": 1, "amr": ["pwd", "mfa"]}"#);
        assert_eq!(
            claims.amr,
            Some(vec!["pwd".to_string(), "mfa".to_string()])
        );

        let claims = parse(r#"{"iss": "i", "sub": "s", "exp": 1}"#);
        assert_eq!(claims.amr, None);
    }

    #[test]
    fn test_scope_splitting() {
        let claims = parse(
            r#"{"iss": "i", "sub": "s", "exp": 1, "scope": "openid projects.read email"}"#,
        );
        assert_eq!(claims.scopes(), vec!["openid", "projects.read", "email"]);

        let no_scope = parse(r#"{"iss": "i", "sub": "s", "exp": 1}"#);
        assert!(no_scope.scopes().is_empty());
    }

    #[test]
    fn test_scope_prefix_is_literal() {
        let claims =
            parse(r#"{"iss": "i", "sub": "s", "exp": 1, "scope": "projects.read email"}"#);

        assert!(claims.has_scope_with_prefix("projects"));
        assert!(claims.has_scope_with_prefix("projects.read"));
        assert!(!claims.has_scope_with_prefix("admin"));
        // Prefix match, not whole-entry match
        assert!(claims.has_scope_with_prefix("proj"));
    }

    #[test]
    fn test_map_identity_standard_profile() {
        let claims = parse(
            r#"{
                "iss": "i", "sub": "user-1", "exp": 1,
                "email": "u@example.org",
                "given_name": "Ada", "family_name": "Lovelace",
                "groups": ["g2", "g1", "g2"],
                "ad_groups": ["ignored"]
            }"#,
        );

        let identity = map_identity(&claims, ProviderProfile::Standard);

        assert_eq!(identity.subject, "user-1");
        assert_eq!(identity.email.as_deref(), Some("u@example.org"));
        assert_eq!(
            identity.groups,
            BTreeSet::from(["g1".to_string(), "g2".to_string()])
        );
    }

    #[test]
    fn test_map_identity_ad_groups_profile() {
        let claims = parse(
            r#"{
                "iss": "i", "sub": "user-1", "exp": 1,
                "groups": ["ignored"],
                "ad_groups": ["cn=staff"]
            }"#,
        );

        let identity = map_identity(&claims, ProviderProfile::AdGroups);

        assert_eq!(identity.groups, BTreeSet::from(["cn=staff".to_string()]));
    }

    #[test]
    fn test_debug_redacts_subject() {
        let claims = parse(r#"{"iss": "i", "sub": "secret-subject", "exp": 1}"#);
        let rendered = format!("{:?}", claims);

        assert!(!rendered.contains("secret-subject"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
