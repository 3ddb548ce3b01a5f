//! API token authentication and user provisioning.
//!
//! This library authenticates API requests carrying bearer tokens (JWTs)
//! issued by an external OIDC identity provider, and keeps a local user
//! record synchronized with the identity claims presented. It is a
//! verifier and consumer of externally issued tokens only; it never
//! issues tokens itself.
//!
//! # Pipeline
//!
//! ```text
//! request -> pipeline (bearer extraction)
//!         -> verify   (signature + claims, keys via keys::KeyCache)
//!         -> claims   (normalize provider claim vocabulary)
//!         -> provision (create/update LocalUser, reconcile groups)
//!         -> Principal (user + token scopes)
//! ```
//!
//! Every stage rejects with a typed [`errors::AuthError`]; there is no
//! partial or default-permissive path. The pipeline is constructed from
//! an explicit [`config::AuthConfig`], so multiple independently
//! configured pipelines can coexist in one process.
//!
//! # Modules
//!
//! - `config` - Pipeline configuration from environment variables
//! - `errors` - Error taxonomy with HTTP status code mapping
//! - `keys` - Signing key cache with single-flight JWKS refresh
//! - `verify` - Token verification and claims normalization
//! - `provision` - Local user store and group reconciliation
//! - `pipeline` - The `authenticate(request) -> Principal` entry point
//! - `middleware` - Axum middleware adapter for protected routes

pub mod config;
pub mod errors;
pub mod keys;
pub mod middleware;
pub mod pipeline;
pub mod provision;
pub mod verify;
