//! Authentication error types.
//!
//! Every rejection the pipeline can produce is a distinct variant; there
//! is no generic failure. The `IntoResponse` impl provides the HTTP
//! mapping callers use: verification failures are 401, an authenticated
//! but unentitled token is 403, provider key-endpoint trouble is 503 and
//! a persistence failure while provisioning is 500. Messages returned to
//! clients for server-side failures are intentionally generic; the
//! actual errors are logged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Authentication pipeline error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token was presented. This is a rejection, not an
    /// anonymous-success path.
    #[error("No authentication credentials provided")]
    MissingToken,

    /// The token (or the authorization header carrying it) is not
    /// structurally valid.
    #[error("The access token is malformed")]
    MalformedToken,

    /// The provider's key set could not be fetched (network failure,
    /// bad response, or timeout).
    #[error("Unable to fetch signing keys: {0}")]
    KeyFetch(String),

    /// The token's key id is absent from a freshly fetched key set.
    /// Permanent for this token; not retried within a request.
    #[error("Unknown signing key \"{0}\"")]
    UnknownKey(String),

    /// Signature verification failed, or the signing key does not match
    /// the configured algorithm.
    #[error("The access token signature is invalid")]
    InvalidSignature,

    /// The token is outside its validity window (`exp` passed, or `nbf`
    /// not yet reached).
    #[error("The access token is expired or not yet valid")]
    ExpiredToken,

    /// The token's issuer is not the configured trusted issuer.
    #[error("The access token issuer is not trusted")]
    IssuerMismatch,

    /// The configured audience is not in the token's audience set.
    #[error("The access token audience is not accepted")]
    AudienceMismatch,

    /// Scope enforcement is enabled and no scope entry starts with the
    /// configured prefix. Authenticated but not entitled.
    #[error("Not authorized for API scope \"{0}\"")]
    InsufficientScope(String),

    /// The local user record could not be created or updated. The token
    /// itself was valid; this is a server-side failure.
    #[error("User provisioning failed: {0}")]
    Provisioning(String),
}

impl AuthError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InsufficientScope(_) => 403,
            AuthError::Provisioning(_) => 500,
            AuthError::KeyFetch(_) => 503,
            AuthError::MissingToken
            | AuthError::MalformedToken
            | AuthError::UnknownKey(_)
            | AuthError::InvalidSignature
            | AuthError::ExpiredToken
            | AuthError::IssuerMismatch
            | AuthError::AudienceMismatch => 401,
        }
    }

    /// Short machine-readable code for the response body.
    fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::MalformedToken => "MALFORMED_TOKEN",
            AuthError::KeyFetch(_) => "KEY_FETCH_FAILED",
            AuthError::UnknownKey(_) => "UNKNOWN_KEY",
            AuthError::InvalidSignature => "INVALID_SIGNATURE",
            AuthError::ExpiredToken => "EXPIRED_TOKEN",
            AuthError::IssuerMismatch => "ISSUER_MISMATCH",
            AuthError::AudienceMismatch => "AUDIENCE_MISMATCH",
            AuthError::InsufficientScope(_) => "INSUFFICIENT_SCOPE",
            AuthError::Provisioning(_) => "PROVISIONING_FAILED",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            AuthError::KeyFetch(reason) => {
                // Log the actual reason server-side, keep the client message generic
                tracing::warn!(target: "auth.keys", reason = %reason, "Signing key endpoint unavailable");
                "Authentication service temporarily unavailable".to_string()
            }
            AuthError::Provisioning(reason) => {
                tracing::error!(target: "auth.provision", reason = %reason, "User provisioning failed");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // 401 responses advertise the expected scheme
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"api\", error=\"invalid_token\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::MissingToken.status_code(), 401);
        assert_eq!(AuthError::MalformedToken.status_code(), 401);
        assert_eq!(AuthError::KeyFetch("down".to_string()).status_code(), 503);
        assert_eq!(AuthError::UnknownKey("k1".to_string()).status_code(), 401);
        assert_eq!(AuthError::InvalidSignature.status_code(), 401);
        assert_eq!(AuthError::ExpiredToken.status_code(), 401);
        assert_eq!(AuthError::IssuerMismatch.status_code(), 401);
        assert_eq!(AuthError::AudienceMismatch.status_code(), 401);
        assert_eq!(
            AuthError::InsufficientScope("projects".to_string()).status_code(),
            403
        );
        assert_eq!(AuthError::Provisioning("db".to_string()).status_code(), 500);
    }

    #[test]
    fn test_display_insufficient_scope_names_prefix() {
        let error = AuthError::InsufficientScope("projects".to_string());
        assert_eq!(
            format!("{}", error),
            "Not authorized for API scope \"projects\""
        );
    }

    #[tokio::test]
    async fn test_into_response_unauthorized_has_www_authenticate() {
        let response = AuthError::ExpiredToken.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response.headers().get("WWW-Authenticate");
        assert!(www_auth.is_some());
        assert!(www_auth
            .unwrap()
            .to_str()
            .unwrap()
            .contains("Bearer realm=\"api\""));

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "EXPIRED_TOKEN");
    }

    #[tokio::test]
    async fn test_into_response_insufficient_scope_is_forbidden() {
        let response = AuthError::InsufficientScope("projects".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get("WWW-Authenticate").is_none());

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "INSUFFICIENT_SCOPE");
    }

    #[tokio::test]
    async fn test_into_response_key_fetch_redacts_reason() {
        let response = AuthError::KeyFetch("connection refused to 10.0.0.3".to_string())
            .into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "KEY_FETCH_FAILED");
        assert!(!body_json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("10.0.0.3"));
    }

    #[tokio::test]
    async fn test_into_response_provisioning_is_server_error() {
        let response = AuthError::Provisioning("unique violation".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "PROVISIONING_FAILED");
        assert_eq!(body_json["error"]["message"], "An internal error occurred");
    }
}
