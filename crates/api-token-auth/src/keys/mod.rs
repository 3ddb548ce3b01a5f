//! Signing key retrieval and caching.
//!
//! The network edge is behind the [`KeySetFetcher`] trait so the cache
//! can be exercised without a provider; [`HttpKeySetFetcher`] is the
//! production implementation against the issuer's published JWKS
//! endpoint.

mod cache;
mod jwks;

pub use cache::KeyCache;
pub use jwks::{
    jwks_url_for_issuer, FetchError, HttpKeySetFetcher, Jwk, JwksResponse, KeySetFetcher,
    SigningKey,
};
