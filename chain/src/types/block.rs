// chain/src/types/block.rs

//! Block and header types, plus canonical hashing and signing.
//!
//! Serialization is done with **bincode 2** using the `serde` integration
//! via [`crate::codec`]. The header is the sole input to the block hash;
//! all header fields are therefore implicitly signed.

use serde::{Deserialize, Serialize};

use super::tx::Transaction;
use crate::crypto::{PublicKey, Signature};
use crate::hash::Hash;

/// Current header version. Bump when the header layout changes in a way
/// that is not backward compatible.
pub const HEADER_VERSION: u32 = 1;

/// Block header: the hashed and signed portion of a block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
    /// SHA-256 over the concatenated canonical encoding of every
    /// transaction in the block, in order.
    pub transactions_hash: Hash,
    /// Hash of the parent block's header. [`Hash::ZERO`] for genesis.
    pub prev_header_hash: Hash,
    pub height: u32,
    /// Nanoseconds since Unix epoch. Advisory only; not validated for
    /// monotonicity.
    pub timestamp: i64,
}

impl Header {
    /// Canonical byte representation used both for hashing and signing.
    /// Every implementation MUST produce byte-identical output given
    /// identical field values: this is the only compatibility point
    /// between peers.
    pub fn header_bytes(&self) -> Vec<u8> {
        crate::codec::encode(self).expect("Header should always be serializable")
    }

    pub fn hash(&self) -> Hash {
        Hash::compute(&self.header_bytes())
    }
}

/// Computes `transactions_hash` for a list of transactions: SHA-256 over
/// the concatenation of each transaction's canonical encoding, in order.
pub fn compute_transactions_hash(txs: &[Transaction]) -> Hash {
    let mut buf = Vec::new();
    for tx in txs {
        let encoded = crate::codec::encode(tx).expect("Transaction should always be serializable");
        buf.extend_from_slice(&encoded);
    }
    Hash::compute(&buf)
}

/// A signed block: a header, its transactions, and the validator's
/// signature over the header hash.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
    pub validator: Option<PublicKey>,
    pub signature: Option<Signature>,
}

#[derive(Debug, Eq, PartialEq)]
pub enum BlockVerifyError {
    MissingSignature,
    InvalidSignature,
    InvalidTransactionsHash,
}

impl Block {
    /// Builds an unsigned block with `transactions_hash` already computed
    /// from `transactions`.
    pub fn new(
        prev_header_hash: Hash,
        height: u32,
        timestamp: i64,
        transactions: Vec<Transaction>,
    ) -> Self {
        let transactions_hash = compute_transactions_hash(&transactions);
        Block {
            header: Header {
                version: HEADER_VERSION,
                transactions_hash,
                prev_header_hash,
                height,
                timestamp,
            },
            transactions,
            validator: None,
            signature: None,
        }
    }

    pub fn header_hash(&self) -> Hash {
        self.header.hash()
    }

    /// Signs this block in place: sets `validator` and `signature` to
    /// cover `header_hash()`.
    pub fn sign(&mut self, key: &crate::crypto::PrivateKey) {
        self.validator = Some(key.public_key());
        let digest = self.header_hash();
        self.signature = Some(key.sign(digest.as_bytes()));
    }

    /// Verifies, in order: a signature is present; the signature verifies
    /// under `validator`; every transaction verifies; the recomputed
    /// `transactions_hash` matches the header.
    ///
    /// A transaction that fails its own signature check surfaces as
    /// [`BlockVerifyError::InvalidSignature`], the same variant as a bad
    /// block signature: both are a signature that doesn't match its
    /// claimed signer, just over a different piece of data.
    pub fn verify(&self) -> Result<(), BlockVerifyError> {
        let (Some(validator), Some(signature)) = (&self.validator, &self.signature) else {
            return Err(BlockVerifyError::MissingSignature);
        };
        if !signature.verify(validator, self.header_hash().as_bytes()) {
            return Err(BlockVerifyError::InvalidSignature);
        }
        for tx in &self.transactions {
            if tx.signature.is_some() && !tx.verify() {
                return Err(BlockVerifyError::InvalidSignature);
            }
        }
        if compute_transactions_hash(&self.transactions) != self.header.transactions_hash {
            return Err(BlockVerifyError::InvalidTransactionsHash);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;

    #[test]
    fn header_hash_is_deterministic() {
        let block = Block::new(Hash::ZERO, 1, 1_700_000_000, vec![]);
        assert_eq!(block.header_hash(), block.header_hash());
    }

    #[test]
    fn sign_then_verify_succeeds() {
        let key = PrivateKey::generate();
        let mut block = Block::new(Hash::ZERO, 1, 0, vec![]);
        block.sign(&key);
        assert!(block.verify().is_ok());
    }

    #[test]
    fn mutating_height_after_signing_invalidates_verify() {
        let key = PrivateKey::generate();
        let mut block = Block::new(Hash::ZERO, 1, 0, vec![]);
        block.sign(&key);
        block.header.height = 2;
        assert_eq!(block.verify(), Err(BlockVerifyError::InvalidSignature));
    }

    #[test]
    fn unsigned_block_fails_verify() {
        let block = Block::new(Hash::ZERO, 1, 0, vec![]);
        assert_eq!(block.verify(), Err(BlockVerifyError::MissingSignature));
    }
}
