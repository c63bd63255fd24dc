//! Fixed-size content hash used for headers, transactions, and blocks.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit hash wrapper (SHA-256).
///
/// This is the backing representation for all fixed-size digests in the
/// chain: header hashes, transaction hashes, and the block's
/// `transactions_hash` field.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// The all-zero sentinel used as the "no previous block" marker on the
    /// genesis header.
    pub const ZERO: Hash = Hash([0u8; HASH_LEN]);

    /// Computes the SHA-256 digest of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&digest);
        Hash(out)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    /// Builds a `Hash` from a byte slice. `slice.len()` must be exactly
    /// [`HASH_LEN`]; a mismatch is a programmer error (e.g. a malformed
    /// on-disk record or a hand-constructed test fixture), not a
    /// recoverable runtime condition, so this panics rather than
    /// returning a `Result`.
    pub fn from_bytes(slice: &[u8]) -> Self {
        assert_eq!(slice.len(), HASH_LEN, "hash must be exactly {HASH_LEN} bytes, got {}", slice.len());
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(slice);
        Hash(out)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
