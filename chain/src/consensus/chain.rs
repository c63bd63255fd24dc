//! The chain itself: an ordered vector of blocks, hash-keyed lookup maps,
//! and the state transition that applies a block's transactions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use num_bigint::BigInt;
use parking_lot::RwLock;

use crate::crypto::PublicKey;
use crate::hash::Hash;
use crate::metrics::MetricsRegistry;
use crate::state::{AccountsState, ContractState};
use crate::storage::Storage;
use crate::types::{Block, Header, TxInner};
use crate::vm;

use super::error::{ChainError, ValidationError};

/// Read-only view of the chain, passed to [`validate`] so the validator
/// never holds a mutable back-reference into the chain it checks against.
pub trait ChainView {
    fn height(&self) -> u32;
    fn header_at(&self, height: u32) -> Option<Header>;
}

/// Checks, in order: no existing block at this height; height is exactly
/// `chain.height() + 1`; `prev_header_hash` matches the current tip's
/// header hash; the block itself verifies (signature, transactions,
/// transactions_hash).
pub fn validate(view: &dyn ChainView, block: &Block) -> Result<(), ValidationError> {
    if view.header_at(block.header.height).is_some() {
        return Err(ValidationError::BlockAlreadyExists(block.header.height));
    }

    let chain_height = view.height();
    if block.header.height != chain_height + 1 {
        return Err(ValidationError::HeightOutOfOrder {
            block_height: block.header.height,
            chain_height,
        });
    }

    let prev_header = view
        .header_at(chain_height)
        .expect("tip header must exist once genesis has been admitted");
    let expected = prev_header.hash();
    if block.header.prev_header_hash != expected {
        return Err(ValidationError::PrevHashMismatch {
            expected,
            found: block.header.prev_header_hash,
        });
    }

    block.verify().map_err(ValidationError::Verify)
}

struct ChainInner {
    blocks: Vec<Block>,
    by_header_hash: HashMap<Hash, u32>,
}

fn genesis_credit() -> BigInt {
    "1000000000000000000".parse().expect("1e18 parses as a BigInt")
}

fn genesis_public_key() -> PublicKey {
    PublicKey(vec![0u8; 33])
}

pub struct Chain {
    inner: RwLock<ChainInner>,
    accounts: AccountsState,
    contracts: ContractState,
    collections: RwLock<HashMap<Hash, crate::types::TxCollection>>,
    mints: RwLock<HashMap<Hash, crate::types::TxMint>>,
    storage: Box<dyn Storage>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Chain {
    /// Constructs a chain with a genesis block at height 0, accepted
    /// unconditionally. The genesis transaction credits the zero public
    /// key's address with 1e18 units.
    pub fn new(storage: Box<dyn Storage>, metrics: Option<Arc<MetricsRegistry>>) -> Self {
        let accounts = AccountsState::new();
        let genesis_pk = genesis_public_key();
        let credit = genesis_credit();
        accounts.add_balance(genesis_pk.address(), &credit);

        let genesis_tx = crate::types::Transaction {
            data: Vec::new(),
            from: Some(genesis_pk.clone()),
            to: Some(genesis_pk),
            value: Some(credit),
            inner: TxInner::None,
            nonce: 0,
            signature: None,
        };
        let genesis_block = Block::new(Hash::ZERO, 0, 0, vec![genesis_tx]);

        let hash = genesis_block.header_hash();
        let inner = ChainInner {
            blocks: vec![genesis_block],
            by_header_hash: HashMap::from([(hash, 0)]),
        };

        Chain {
            inner: RwLock::new(inner),
            accounts,
            contracts: ContractState::new(),
            collections: RwLock::new(HashMap::new()),
            mints: RwLock::new(HashMap::new()),
            storage,
            metrics,
        }
    }

    pub fn height(&self) -> u32 {
        ChainView::height(self)
    }

    pub fn tip_header(&self) -> Header {
        let inner = self.inner.read();
        inner.blocks.last().expect("genesis always present").header.clone()
    }

    pub fn get_block(&self, height: u32) -> Option<Block> {
        let inner = self.inner.read();
        inner.blocks.get(height as usize).cloned()
    }

    pub fn accounts(&self) -> &AccountsState {
        &self.accounts
    }

    pub fn contracts(&self) -> &ContractState {
        &self.contracts
    }

    /// Validates `block`, persists it via `Storage::put`, applies its
    /// transactions, and appends it. Validation and storage happen before
    /// any state mutation; a failure at either stage leaves the chain
    /// untouched.
    pub fn add_block(&self, block: Block) -> Result<(), ChainError> {
        let started = Instant::now();
        validate(self, &block)?;
        self.storage.put(&block)?;

        for tx in &block.transactions {
            if let Err(err) = self.apply_transaction(tx) {
                tracing::warn!(error = %err, "transaction failed to apply, skipping");
            }
        }

        let hash = block.header_hash();
        let mut inner = self.inner.write();
        let height = block.header.height;
        inner.blocks.push(block);
        inner.by_header_hash.insert(hash, height);

        if let Some(metrics) = &self.metrics {
            metrics.chain.block_validation_seconds.observe(started.elapsed().as_secs_f64());
        }
        Ok(())
    }

    fn apply_transaction(&self, tx: &crate::types::Transaction) -> Result<(), String> {
        if !tx.data.is_empty() {
            if let Some(metrics) = &self.metrics {
                metrics.chain.vm_executions_total.inc();
            }
            if let Err(e) = vm::run(&tx.data, &self.contracts) {
                if let Some(metrics) = &self.metrics {
                    metrics.chain.vm_failures_total.inc();
                }
                return Err(e.to_string());
            }
        }

        match &tx.inner {
            TxInner::None => {}
            TxInner::Collection(c) => {
                let key = tx.hash();
                self.collections.write().insert(key, c.clone());
            }
            TxInner::Mint(m) => {
                if !self.collections.read().contains_key(&m.collection_hash) {
                    return Err(format!(
                        "mint references unknown collection {}",
                        m.collection_hash
                    ));
                }
                let key = tx.hash();
                self.mints.write().insert(key, m.clone());
            }
        }

        if let (Some(value), Some(from), Some(to)) = (&tx.value, &tx.from, &tx.to) {
            if value > &BigInt::from(0) {
                self.accounts
                    .transfer(from.address(), to.address(), value)
                    .map_err(|e| e.to_string())?;
            }
        }

        Ok(())
    }
}

impl ChainView for Chain {
    fn height(&self) -> u32 {
        let inner = self.inner.read();
        (inner.blocks.len() - 1) as u32
    }

    fn header_at(&self, height: u32) -> Option<Header> {
        let inner = self.inner.read();
        inner.blocks.get(height as usize).map(|b| b.header.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use crate::storage::NullStorage;
    use crate::types::Transaction;

    fn chain() -> Chain {
        Chain::new(Box::new(NullStorage), None)
    }

    fn signed_transfer(from: &PrivateKey, to: PublicKey, value: i64) -> Transaction {
        let mut tx = Transaction {
            data: Vec::new(),
            from: None,
            to: Some(to),
            value: Some(BigInt::from(value)),
            inner: TxInner::None,
            nonce: 1,
            signature: None,
        };
        tx.sign(from);
        tx
    }

    fn next_block(chain: &Chain, validator: &PrivateKey, txs: Vec<Transaction>) -> Block {
        let tip = chain.tip_header();
        let mut block = Block::new(tip.hash(), tip.height + 1, 0, txs);
        block.sign(validator);
        block
    }

    #[test]
    fn genesis_credits_zero_public_key() {
        let c = chain();
        let addr = genesis_public_key().address();
        assert!(c.accounts().get_balance(&addr).unwrap() > BigInt::from(0));
    }

    #[test]
    fn transfer_happy_path() {
        let c = chain();
        let validator = PrivateKey::generate();
        let bob = PrivateKey::generate();
        let alice = PrivateKey::generate();
        c.accounts().create_account(bob.public_key().address(), BigInt::from(100_000_000_000i64));

        let tx = signed_transfer(&bob, alice.public_key(), 3_000_000_000);
        let block = next_block(&c, &validator, vec![tx]);
        c.add_block(block).unwrap();

        assert_eq!(
            c.accounts().get_balance(&bob.public_key().address()).unwrap(),
            BigInt::from(97_000_000_000i64)
        );
        assert_eq!(
            c.accounts().get_balance(&alice.public_key().address()).unwrap(),
            BigInt::from(3_000_000_000i64)
        );
    }

    #[test]
    fn tampered_recipient_is_rejected() {
        let c = chain();
        let validator = PrivateKey::generate();
        let bob = PrivateKey::generate();
        let alice = PrivateKey::generate();
        let hacker = PrivateKey::generate();
        c.accounts().create_account(bob.public_key().address(), BigInt::from(100));

        let mut tx = signed_transfer(&bob, alice.public_key(), 3);
        tx.to = Some(hacker.public_key());
        let block = next_block(&c, &validator, vec![tx]);

        assert!(c.add_block(block).is_err());
        assert_eq!(
            c.accounts().get_balance(&bob.public_key().address()).unwrap(),
            BigInt::from(100)
        );
    }

    #[test]
    fn out_of_order_height_is_rejected() {
        let c = chain();
        let validator = PrivateKey::generate();
        let mut block = Block::new(Hash::ZERO, 223, 0, vec![]);
        block.sign(&validator);
        match c.add_block(block) {
            Err(ChainError::Validation(ValidationError::HeightOutOfOrder { .. })) => {}
            other => panic!("expected HeightOutOfOrder, got {other:?}"),
        }
    }

    #[test]
    fn prev_hash_mismatch_is_rejected() {
        let c = chain();
        let validator = PrivateKey::generate();
        let mut block = Block::new(Hash::compute(b"wrong"), 1, 0, vec![]);
        block.sign(&validator);
        match c.add_block(block) {
            Err(ChainError::Validation(ValidationError::PrevHashMismatch { .. })) => {}
            other => panic!("expected PrevHashMismatch, got {other:?}"),
        }
    }

    #[test]
    fn admitted_block_records_validation_latency_and_vm_counters() {
        let metrics = Arc::new(MetricsRegistry::new().expect("create metrics registry"));
        let c = Chain::new(Box::new(NullStorage), Some(metrics.clone()));
        let validator = PrivateKey::generate();

        let mut tx = Transaction {
            data: vec![5u8, crate::vm::Opcode::PushInt as u8],
            from: None,
            to: None,
            value: None,
            inner: TxInner::None,
            nonce: 1,
            signature: None,
        };
        tx.sign(&validator);

        let block = next_block(&c, &validator, vec![tx]);
        c.add_block(block).unwrap();

        assert_eq!(metrics.chain.vm_executions_total.get(), 1);
        assert_eq!(metrics.chain.vm_failures_total.get(), 0);
        assert_eq!(metrics.chain.block_validation_seconds.get_sample_count(), 1);
    }
}
