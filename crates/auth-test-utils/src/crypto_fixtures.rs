//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible Ed25519 keypairs that can sign tokens and
//! publish themselves as JWKS documents. All fixtures are deterministic
//! based on seed values.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::json;
use thiserror::Error;

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// A deterministic Ed25519 keypair with a key identifier.
///
/// The same seed always produces the same keypair, ensuring test
/// reproducibility. The keypair can sign test tokens and render itself
/// as the JWK the provider would publish.
pub struct TestKeypair {
    /// Key identifier carried in token headers and the JWKS document.
    pub kid: String,
    public_key: Vec<u8>,
    private_key_pkcs8: Vec<u8>,
}

impl TestKeypair {
    /// Generate a deterministic keypair for the given seed.
    pub fn new(seed: u8, kid: &str) -> Result<Self, FixtureError> {
        // Create deterministic 32-byte seed from input
        let mut seed_bytes = [0u8; 32];
        seed_bytes[0] = seed;
        for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
            *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes).map_err(|e| {
            FixtureError::Crypto(format!("Failed to generate test keypair: {:?}", e))
        })?;

        Ok(Self {
            kid: kid.to_string(),
            public_key: key_pair.public_key().as_ref().to_vec(),
            private_key_pkcs8: build_pkcs8_from_seed(&seed_bytes),
        })
    }

    /// Sign a claim set into a compact JWT with this key.
    ///
    /// The header carries `alg: EdDSA` and this keypair's `kid`.
    pub fn sign_token(&self, claims: &serde_json::Value) -> Result<String, FixtureError> {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.kid.clone());

        let encoding_key = EncodingKey::from_ed_der(&self.private_key_pkcs8);

        jsonwebtoken::encode(&header, claims, &encoding_key)
            .map_err(|e| FixtureError::Signing(e.to_string()))
    }

    /// The JWK this keypair would appear as in the provider's key set.
    pub fn jwk_json(&self) -> serde_json::Value {
        json!({
            "kty": "OKP",
            "kid": self.kid,
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(&self.public_key),
            "alg": "EdDSA",
            "use": "sig",
        })
    }
}

/// A JWKS document publishing the given keypairs.
pub fn key_set_json(keypairs: &[&TestKeypair]) -> serde_json::Value {
    json!({
        "keys": keypairs.iter().map(|k| k.jwk_json()).collect::<Vec<_>>(),
    })
}

/// Build PKCS#8 v1 document from Ed25519 seed
///
/// This is a test-only utility. Production code must use ring::rand::SystemRandom.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    // PKCS#8 v1 format for Ed25519 (RFC 5208):
    // SEQUENCE {
    //   version         INTEGER (0),
    //   algorithm       AlgorithmIdentifier,
    //   privateKey      OCTET STRING
    // }
    // Where privateKey for Ed25519 is:
    // OCTET STRING containing OCTET STRING with 32-byte seed

    let mut pkcs8 = Vec::new();

    // Outer SEQUENCE tag
    pkcs8.push(0x30);
    pkcs8.push(0x2e); // Length: 46 bytes

    // Version: INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);

    // Algorithm Identifier: SEQUENCE
    pkcs8.push(0x30);
    pkcs8.push(0x05); // Length: 5 bytes
                      // OID for Ed25519: 1.3.101.112
    pkcs8.extend_from_slice(&[0x06, 0x03, 0x2b, 0x65, 0x70]);

    // Private Key: OCTET STRING
    pkcs8.push(0x04);
    pkcs8.push(0x22); // Length: 34 bytes
                      // Inner OCTET STRING with seed
    pkcs8.push(0x04);
    pkcs8.push(0x20); // Length: 32 bytes
    pkcs8.extend_from_slice(seed);

    pkcs8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_is_deterministic() {
        let a = TestKeypair::new(1, "k1").unwrap();
        let b = TestKeypair::new(1, "k1").unwrap();

        assert_eq!(a.jwk_json(), b.jwk_json());
    }

    #[test]
    fn test_different_seeds_produce_different_keys() {
        let a = TestKeypair::new(1, "k1").unwrap();
        let b = TestKeypair::new(2, "k2").unwrap();

        assert_ne!(a.jwk_json()["x"], b.jwk_json()["x"]);
    }

    #[test]
    fn test_signed_token_has_three_segments_and_kid() {
        let keypair = TestKeypair::new(1, "test-key-01").unwrap();
        let token = keypair
            .sign_token(&serde_json::json!({"sub": "alice", "exp": 4102444800i64}))
            .unwrap();

        assert_eq!(token.split('.').count(), 3);

        let header_segment = token.split('.').next().unwrap();
        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_segment).unwrap()).unwrap();
        assert_eq!(header["kid"], "test-key-01");
        assert_eq!(header["alg"], "EdDSA");
    }

    #[test]
    fn test_key_set_publishes_all_keys() {
        let a = TestKeypair::new(1, "k1").unwrap();
        let b = TestKeypair::new(2, "k2").unwrap();

        let jwks = key_set_json(&[&a, &b]);
        assert_eq!(jwks["keys"].as_array().unwrap().len(), 2);
    }
}
