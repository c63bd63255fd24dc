// chain/src/types/tx.rs

//! Transaction type for the chain.
//!
//! A transaction optionally carries VM byte-code (`data`), an optional
//! value transfer between two accounts, and an optional NFT-like payload
//! (`inner`). The `nonce` is a random de-duplication tag, not a replay
//! counter: see the mempool for how duplicate transactions are handled.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::crypto::{PublicKey, Signature};
use crate::hash::Hash;

/// Registers a new NFT collection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxCollection {
    pub metadata: String,
    pub fee: u64,
}

/// Mints an NFT into a previously registered collection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxMint {
    pub fee: u64,
    pub nft_hash: Hash,
    pub collection_hash: Hash,
    pub metadata: String,
    pub owner: PublicKey,
    pub signature: Signature,
}

/// Optional NFT-like payload carried by a transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TxInner {
    None,
    Collection(TxCollection),
    Mint(TxMint),
}

/// The fields that are hashed and signed. Kept separate from
/// [`Transaction`] so the signature itself is never part of its own
/// signing input.
#[derive(Serialize)]
struct SigningFields<'a> {
    data: &'a [u8],
    from: &'a Option<PublicKey>,
    to: &'a Option<PublicKey>,
    value: &'a Option<BigInt>,
    nonce: u64,
    inner: &'a TxInner,
}

/// A single transaction: VM byte-code, an optional value transfer, and an
/// optional NFT-like payload, signed by `from`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub data: Vec<u8>,
    pub from: Option<PublicKey>,
    pub to: Option<PublicKey>,
    pub value: Option<BigInt>,
    pub inner: TxInner,
    pub nonce: u64,
    pub signature: Option<Signature>,
}

impl Transaction {
    /// Computes the transaction hash: SHA-256 over the deterministic
    /// encoding of every field except `signature`.
    pub fn hash(&self) -> Hash {
        let fields = SigningFields {
            data: &self.data,
            from: &self.from,
            to: &self.to,
            value: &self.value,
            nonce: self.nonce,
            inner: &self.inner,
        };
        let bytes = crate::codec::encode(&fields).expect("transaction fields always encode");
        Hash::compute(&bytes)
    }

    /// Signs this transaction in place with `key`, setting `from` and
    /// `signature`.
    pub fn sign(&mut self, key: &crate::crypto::PrivateKey) {
        self.from = Some(key.public_key());
        let digest = self.hash();
        self.signature = Some(key.sign(digest.as_bytes()));
    }

    /// Verifies that this transaction carries a signature and that it
    /// verifies against `from` and the transaction hash.
    ///
    /// A transaction with no signature and no `from` is considered
    /// unsigned and always fails verification; callers that allow
    /// unsigned, fee-less transactions must check `signature.is_none()`
    /// explicitly before calling this.
    pub fn verify(&self) -> bool {
        let (Some(from), Some(sig)) = (&self.from, &self.signature) else {
            return false;
        };
        sig.verify(from, self.hash().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;

    fn signed_transfer(from: &PrivateKey, to_pk: PublicKey, value: i64) -> Transaction {
        let mut tx = Transaction {
            data: Vec::new(),
            from: None,
            to: Some(to_pk),
            value: Some(BigInt::from(value)),
            inner: TxInner::None,
            nonce: 42,
            signature: None,
        };
        tx.sign(from);
        tx
    }

    #[test]
    fn transfer_roundtrips_with_bincode2() {
        let from = PrivateKey::generate();
        let to = PrivateKey::generate();
        let tx = signed_transfer(&from, to.public_key(), 1_000);

        let bytes = crate::codec::encode(&tx).expect("encode");
        let decoded: Transaction = crate::codec::decode(&bytes).expect("decode");

        assert_eq!(decoded.value, tx.value);
        assert_eq!(decoded.nonce, tx.nonce);
        assert!(decoded.verify());
    }

    #[test]
    fn signature_is_valid_for_untampered_transaction() {
        let from = PrivateKey::generate();
        let to = PrivateKey::generate();
        let tx = signed_transfer(&from, to.public_key(), 5);
        assert!(tx.verify());
    }

    #[test]
    fn tampered_recipient_invalidates_signature() {
        let from = PrivateKey::generate();
        let to = PrivateKey::generate();
        let hacker = PrivateKey::generate();
        let mut tx = signed_transfer(&from, to.public_key(), 5);
        tx.to = Some(hacker.public_key());
        assert!(!tx.verify());
    }

    #[test]
    fn unsigned_transaction_fails_verification() {
        let tx = Transaction {
            data: Vec::new(),
            from: None,
            to: None,
            value: None,
            inner: TxInner::None,
            nonce: 1,
            signature: None,
        };
        assert!(!tx.verify());
    }
}
