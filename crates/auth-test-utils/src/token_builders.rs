//! Builder patterns for test data construction
//!
//! Provides a fluent API for creating access token claim sets.

use chrono::{Duration, Utc};
use serde_json::json;

/// Builder for API access token claims
///
/// Defaults to a token the standard test pipeline accepts: issued by
/// `https://idp.example/` for audience `api.example`, expiring an hour
/// from now.
///
/// # Example
/// ```rust,ignore
/// let claims = ApiTokenBuilder::new()
///     .for_subject("alice")
///     .with_scope("openid projects.read")
///     .with_groups(&["ext-editors"])
///     .build();
/// ```
pub struct ApiTokenBuilder {
    iss: String,
    aud: Vec<String>,
    sub: String,
    exp: i64,
    nbf: Option<i64>,
    iat: i64,
    scope: Option<String>,
    groups: Option<Vec<String>>,
    ad_groups: Option<Vec<String>>,
    email: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    amr: Option<serde_json::Value>,
}

impl ApiTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            iss: "https://idp.example/".to_string(),
            aud: vec!["api.example".to_string()],
            sub: "test-subject".to_string(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            nbf: None,
            iat: now.timestamp(),
            scope: None,
            groups: None,
            ad_groups: None,
            email: None,
            given_name: None,
            family_name: None,
            amr: None,
        }
    }

    /// Set the issuer
    pub fn issued_by(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    /// Replace the audience set
    pub fn with_audiences(mut self, audiences: &[&str]) -> Self {
        self.aud = audiences.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Set the subject
    pub fn for_subject(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Set the scope (space-separated)
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    /// Set the `groups` claim
    pub fn with_groups(mut self, groups: &[&str]) -> Self {
        self.groups = Some(groups.iter().map(|g| g.to_string()).collect());
        self
    }

    /// Set the `ad_groups` claim
    pub fn with_ad_groups(mut self, groups: &[&str]) -> Self {
        self.ad_groups = Some(groups.iter().map(|g| g.to_string()).collect());
        self
    }

    /// Set profile claims
    pub fn with_profile(mut self, email: &str, given_name: &str, family_name: &str) -> Self {
        self.email = Some(email.to_string());
        self.given_name = Some(given_name.to_string());
        self.family_name = Some(family_name.to_string());
        self
    }

    /// Set expiration in seconds from now (negative for an already
    /// expired token)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set an absolute expiration timestamp
    pub fn expires_at(mut self, timestamp: i64) -> Self {
        self.exp = timestamp;
        self
    }

    /// Set the not-before timestamp
    pub fn not_before(mut self, timestamp: i64) -> Self {
        self.nbf = Some(timestamp);
        self
    }

    /// Set the `amr` claim to an arbitrary value (string or array)
    pub fn with_amr(mut self, amr: serde_json::Value) -> Self {
        self.amr = Some(amr);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> serde_json::Value {
        let mut claims = json!({
            "iss": self.iss,
            "aud": self.aud,
            "sub": self.sub,
            "exp": self.exp,
            "iat": self.iat,
        });

        if let Some(obj) = claims.as_object_mut() {
            if let Some(nbf) = self.nbf {
                obj.insert("nbf".to_string(), json!(nbf));
            }
            if let Some(scope) = self.scope {
                obj.insert("scope".to_string(), json!(scope));
            }
            if let Some(groups) = self.groups {
                obj.insert("groups".to_string(), json!(groups));
            }
            if let Some(ad_groups) = self.ad_groups {
                obj.insert("ad_groups".to_string(), json!(ad_groups));
            }
            if let Some(email) = self.email {
                obj.insert("email".to_string(), json!(email));
            }
            if let Some(given_name) = self.given_name {
                obj.insert("given_name".to_string(), json!(given_name));
            }
            if let Some(family_name) = self.family_name {
                obj.insert("family_name".to_string(), json!(family_name));
            }
            if let Some(amr) = self.amr {
                obj.insert("amr".to_string(), amr);
            }
        }

        claims
    }
}

impl Default for ApiTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
