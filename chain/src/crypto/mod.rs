//! Signing primitives for the chain.
//!
//! This module wraps ECDSA over NIST P-256 (via the `p256` crate). Public
//! keys are carried as compressed SEC1 points; addresses are derived by
//! taking the low-order 20 bytes of `SHA-256(public_key_bytes)`, matching
//! the convention used throughout the rest of the node.

use std::fmt;

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const ADDRESS_LEN: usize = 20;

/// 20-byte account address, derived from a public key.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Compressed-point P-256 public key, wrapped to avoid naked `Vec<u8>`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicKey(pub Vec<u8>);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decodes the compressed point. Fails if the bytes are not a valid
    /// P-256 public key encoding.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Derives this key's address as the low-order 20 bytes of
    /// `SHA-256(public_key_bytes)`.
    pub fn address(&self) -> Address {
        let digest = Sha256::digest(&self.0);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest[digest.len() - ADDRESS_LEN..]);
        Address(out)
    }
}

/// P-256 private scalar plus its cached public key bytes.
#[derive(Clone)]
pub struct PrivateKey {
    signing_key: SigningKey,
    public_key_bytes: Vec<u8>,
}

impl PrivateKey {
    /// Generates a fresh random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_key_bytes = signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();
        PrivateKey {
            signing_key,
            public_key_bytes,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.public_key_bytes.clone())
    }

    /// Loads a private key from its hex-encoded scalar bytes, as typically
    /// supplied via an environment variable or config file.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidPrivateKey)?;
        let signing_key = SigningKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        let public_key_bytes = signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();
        Ok(PrivateKey {
            signing_key,
            public_key_bytes,
        })
    }

    /// Signs `data` (typically a 32-byte digest) with this key.
    pub fn sign(&self, data: &[u8]) -> Signature {
        let sig: EcdsaSignature = self.signing_key.sign(data);
        Signature(sig.to_der().as_bytes().to_vec())
    }
}

/// Detached ECDSA signature, DER-encoded.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Verifies this signature over `data` under `public_key`.
    pub fn verify(&self, public_key: &PublicKey, data: &[u8]) -> bool {
        let Ok(verifying_key) = public_key.to_verifying_key() else {
            return false;
        };
        let Ok(sig) = EcdsaSignature::from_der(&self.0) else {
            return false;
        };
        verifying_key.verify(data, &sig).is_ok()
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum CryptoError {
    InvalidPublicKey,
    InvalidSignature,
    InvalidPrivateKey,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidPublicKey => write!(f, "invalid public key encoding"),
            CryptoError::InvalidSignature => write!(f, "invalid signature encoding"),
            CryptoError::InvalidPrivateKey => write!(f, "invalid private key encoding"),
        }
    }
}

impl std::error::Error for CryptoError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let key = PrivateKey::generate();
        let data = b"hello chain";
        let sig = key.sign(data);
        assert!(sig.verify(&key.public_key(), data));
    }

    #[test]
    fn tampered_data_fails_verification() {
        let key = PrivateKey::generate();
        let sig = key.sign(b"hello chain");
        assert!(!sig.verify(&key.public_key(), b"goodbye chain"));
    }

    #[test]
    fn address_is_stable_for_same_key() {
        let key = PrivateKey::generate();
        let a1 = key.public_key().address();
        let a2 = key.public_key().address();
        assert_eq!(a1, a2);
    }
}
