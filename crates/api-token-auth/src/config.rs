//! Authentication pipeline configuration.
//!
//! Configuration is loaded from environment variables and passed into
//! the pipeline at construction time; there is no process-global
//! settings object, so multiple independently configured pipelines can
//! coexist in one process.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default clock skew tolerance in seconds for `exp`/`nbf` checks.
pub const DEFAULT_CLOCK_SKEW_SECONDS: i64 = 60;

/// Maximum allowed clock skew tolerance in seconds (10 minutes).
///
/// Prevents misconfiguration that would weaken expiry enforcement.
pub const MAX_CLOCK_SKEW_SECONDS: i64 = 600;

/// Default timeout for fetching the provider's key set.
pub const DEFAULT_KEY_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Signature algorithm the pipeline accepts.
///
/// Exactly one algorithm is trusted per pipeline; the `alg` field of an
/// incoming token header is never consulted to select verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlg {
    /// Ed25519 signatures over OKP keys.
    EdDsa,
    /// RSA-SHA256 signatures over RSA keys.
    Rs256,
}

impl SignatureAlg {
    /// The corresponding `jsonwebtoken` algorithm.
    pub fn to_jwt_algorithm(self) -> jsonwebtoken::Algorithm {
        match self {
            SignatureAlg::EdDsa => jsonwebtoken::Algorithm::EdDSA,
            SignatureAlg::Rs256 => jsonwebtoken::Algorithm::RS256,
        }
    }

    /// The JWK `alg` value this algorithm expects on fetched keys.
    pub fn jwk_alg(self) -> &'static str {
        match self {
            SignatureAlg::EdDsa => "EdDSA",
            SignatureAlg::Rs256 => "RS256",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "EdDSA" => Some(SignatureAlg::EdDsa),
            "RS256" => Some(SignatureAlg::Rs256),
            _ => None,
        }
    }
}

/// Which claim vocabulary the provider uses for group membership.
///
/// This replaces implicit backend-class lookup with an explicit
/// configuration value: each variant names the claim the mapper reads
/// group identifiers from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderProfile {
    /// Groups are carried in the `groups` claim.
    Standard,
    /// Groups are carried in the `ad_groups` claim (directory-synced
    /// providers).
    AdGroups,
}

impl ProviderProfile {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "standard" => Some(ProviderProfile::Standard),
            "ad-groups" => Some(ProviderProfile::AdGroups),
            _ => None,
        }
    }
}

/// Authentication pipeline configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Trusted issuer URL. Token `iss` must equal this exactly.
    pub issuer: String,

    /// Expected audience. Must be a member of the token's `aud` set.
    pub audience: String,

    /// Whether a scope with the configured prefix is required.
    pub require_api_scope: bool,

    /// Required scope prefix when enforcement is enabled.
    pub api_scope_prefix: String,

    /// The single signature algorithm this pipeline trusts.
    pub algorithm: SignatureAlg,

    /// Claim vocabulary for group membership.
    pub provider: ProviderProfile,

    /// Clock skew tolerance in seconds for `exp`/`nbf` checks.
    pub clock_skew_seconds: i64,

    /// Bound on the key-set fetch; a timeout is a key-fetch failure.
    pub key_fetch_timeout: Duration,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("require_api_scope", &self.require_api_scope)
            .field("api_scope_prefix", &self.api_scope_prefix)
            .field("algorithm", &self.algorithm)
            .field("provider", &self.provider)
            .field("clock_skew_seconds", &self.clock_skew_seconds)
            .field("key_fetch_timeout", &self.key_fetch_timeout)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid clock skew configuration: {0}")]
    InvalidClockSkew(String),

    #[error("Invalid algorithm configuration: {0}")]
    InvalidAlgorithm(String),

    #[error("Invalid provider profile configuration: {0}")]
    InvalidProviderProfile(String),

    #[error("Invalid key fetch timeout configuration: {0}")]
    InvalidKeyFetchTimeout(String),

    #[error("Invalid boolean configuration: {0}")]
    InvalidBool(String),
}

impl AuthConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let issuer = vars
            .get("ISSUER")
            .ok_or_else(|| ConfigError::MissingEnvVar("ISSUER".to_string()))?
            .clone();

        let audience = vars
            .get("AUDIENCE")
            .ok_or_else(|| ConfigError::MissingEnvVar("AUDIENCE".to_string()))?
            .clone();

        let require_api_scope = match vars.get("REQUIRE_API_SCOPE_FOR_AUTHENTICATION") {
            None => false,
            Some(value) => parse_bool(value).ok_or_else(|| {
                ConfigError::InvalidBool(format!(
                    "REQUIRE_API_SCOPE_FOR_AUTHENTICATION must be a boolean, got '{}'",
                    value
                ))
            })?,
        };

        let api_scope_prefix = vars.get("API_SCOPE_PREFIX").cloned().unwrap_or_default();

        let algorithm = match vars.get("AUTH_ALGORITHM") {
            None => SignatureAlg::Rs256,
            Some(value) => SignatureAlg::parse(value).ok_or_else(|| {
                ConfigError::InvalidAlgorithm(format!(
                    "AUTH_ALGORITHM must be one of EdDSA, RS256; got '{}'",
                    value
                ))
            })?,
        };

        let provider = match vars.get("AUTH_PROVIDER_PROFILE") {
            None => ProviderProfile::Standard,
            Some(value) => ProviderProfile::parse(value).ok_or_else(|| {
                ConfigError::InvalidProviderProfile(format!(
                    "AUTH_PROVIDER_PROFILE must be one of standard, ad-groups; got '{}'",
                    value
                ))
            })?,
        };

        let clock_skew_seconds = match vars.get("JWT_CLOCK_SKEW_SECONDS") {
            None => DEFAULT_CLOCK_SKEW_SECONDS,
            Some(value_str) => {
                let value: i64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidClockSkew(format!(
                        "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value < 0 {
                    return Err(ConfigError::InvalidClockSkew(format!(
                        "JWT_CLOCK_SKEW_SECONDS must not be negative, got {}",
                        value
                    )));
                }

                if value > MAX_CLOCK_SKEW_SECONDS {
                    return Err(ConfigError::InvalidClockSkew(format!(
                        "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                        MAX_CLOCK_SKEW_SECONDS, value
                    )));
                }

                value
            }
        };

        let key_fetch_timeout = match vars.get("KEY_FETCH_TIMEOUT_SECONDS") {
            None => DEFAULT_KEY_FETCH_TIMEOUT,
            Some(value_str) => {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidKeyFetchTimeout(format!(
                        "KEY_FETCH_TIMEOUT_SECONDS must be a valid integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidKeyFetchTimeout(
                        "KEY_FETCH_TIMEOUT_SECONDS must be positive".to_string(),
                    ));
                }

                Duration::from_secs(value)
            }
        };

        Ok(Self {
            issuer,
            audience,
            require_api_scope,
            api_scope_prefix,
            algorithm,
            provider,
            clock_skew_seconds,
            key_fetch_timeout,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("ISSUER".to_string(), "https://idp.example/".to_string());
        vars.insert("AUDIENCE".to_string(), "api.example".to_string());
        vars
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AuthConfig::from_vars(&base_vars()).unwrap();

        assert_eq!(config.issuer, "https://idp.example/");
        assert_eq!(config.audience, "api.example");
        assert!(!config.require_api_scope);
        assert_eq!(config.api_scope_prefix, "");
        assert_eq!(config.algorithm, SignatureAlg::Rs256);
        assert_eq!(config.provider, ProviderProfile::Standard);
        assert_eq!(config.clock_skew_seconds, DEFAULT_CLOCK_SKEW_SECONDS);
        assert_eq!(config.key_fetch_timeout, DEFAULT_KEY_FETCH_TIMEOUT);
    }

    #[test]
    fn test_missing_issuer_rejected() {
        let mut vars = base_vars();
        vars.remove("ISSUER");

        let result = AuthConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "ISSUER"));
    }

    #[test]
    fn test_missing_audience_rejected() {
        let mut vars = base_vars();
        vars.remove("AUDIENCE");

        let result = AuthConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "AUDIENCE"));
    }

    #[test]
    fn test_scope_enforcement_config() {
        let mut vars = base_vars();
        vars.insert(
            "REQUIRE_API_SCOPE_FOR_AUTHENTICATION".to_string(),
            "true".to_string(),
        );
        vars.insert("API_SCOPE_PREFIX".to_string(), "projects".to_string());

        let config = AuthConfig::from_vars(&vars).unwrap();
        assert!(config.require_api_scope);
        assert_eq!(config.api_scope_prefix, "projects");
    }

    #[test]
    fn test_invalid_bool_rejected() {
        let mut vars = base_vars();
        vars.insert(
            "REQUIRE_API_SCOPE_FOR_AUTHENTICATION".to_string(),
            "maybe".to_string(),
        );

        let result = AuthConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidBool(_))));
    }

    #[test]
    fn test_algorithm_parsing() {
        let mut vars = base_vars();
        vars.insert("AUTH_ALGORITHM".to_string(), "EdDSA".to_string());
        let config = AuthConfig::from_vars(&vars).unwrap();
        assert_eq!(config.algorithm, SignatureAlg::EdDsa);

        vars.insert("AUTH_ALGORITHM".to_string(), "none".to_string());
        let result = AuthConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidAlgorithm(_))));
    }

    #[test]
    fn test_provider_profile_parsing() {
        let mut vars = base_vars();
        vars.insert("AUTH_PROVIDER_PROFILE".to_string(), "ad-groups".to_string());
        let config = AuthConfig::from_vars(&vars).unwrap();
        assert_eq!(config.provider, ProviderProfile::AdGroups);

        vars.insert("AUTH_PROVIDER_PROFILE".to_string(), "ldap".to_string());
        let result = AuthConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidProviderProfile(_))));
    }

    #[test]
    fn test_clock_skew_bounds() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "120".to_string());
        let config = AuthConfig::from_vars(&vars).unwrap();
        assert_eq!(config.clock_skew_seconds, 120);

        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "-1".to_string());
        assert!(matches!(
            AuthConfig::from_vars(&vars),
            Err(ConfigError::InvalidClockSkew(_))
        ));

        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "601".to_string());
        assert!(matches!(
            AuthConfig::from_vars(&vars),
            Err(ConfigError::InvalidClockSkew(_))
        ));
    }

    #[test]
    fn test_key_fetch_timeout_must_be_positive() {
        let mut vars = base_vars();
        vars.insert("KEY_FETCH_TIMEOUT_SECONDS".to_string(), "0".to_string());
        assert!(matches!(
            AuthConfig::from_vars(&vars),
            Err(ConfigError::InvalidKeyFetchTimeout(_))
        ));
    }
}
