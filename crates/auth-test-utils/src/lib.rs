//! # Auth Test Utilities
//!
//! Shared test utilities for the API token authentication crate.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed Ed25519 keypairs, JWKS documents)
//! - Test data builders (ApiTokenBuilder for claim sets)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! let keypair = TestKeypair::new(1, "test-key-01")?;
//!
//! let token = keypair.sign_token(
//!     &ApiTokenBuilder::new()
//!         .for_subject("alice")
//!         .with_scope("projects.read")
//!         .build(),
//! )?;
//! ```

pub mod crypto_fixtures;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use token_builders::*;
