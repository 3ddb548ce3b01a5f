//! Axum middleware adapter.
//!
//! Protected routers run [`require_auth`]; a request that fails any
//! pipeline stage never reaches the handler. On success the
//! [`Principal`] is inserted into request extensions for handlers to
//! read.

use crate::errors::AuthError;
use crate::pipeline::{AuthPipeline, Principal};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Shared state for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub pipeline: Arc<AuthPipeline>,
}

impl AuthState {
    pub fn new(pipeline: Arc<AuthPipeline>) -> Self {
        Self { pipeline }
    }
}

/// Middleware enforcing bearer authentication on every request.
///
/// # Errors
///
/// Any [`AuthError`]; its `IntoResponse` impl produces the HTTP
/// rejection.
pub async fn require_auth(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let principal = state.pipeline.authenticate(request.headers()).await?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Access to the authenticated principal from a request.
pub trait PrincipalExt {
    /// The principal inserted by [`require_auth`], if the request went
    /// through it.
    fn principal(&self) -> Option<&Principal>;
}

impl PrincipalExt for Request {
    fn principal(&self) -> Option<&Principal> {
        self.extensions().get::<Principal>()
    }
}
