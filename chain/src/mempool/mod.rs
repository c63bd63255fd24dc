//! Bounded, FIFO, de-duplicating transaction pool.
//!
//! The pool maintains two insertion-ordered views over the same
//! transactions: `all` (bounded by `max_length`, the seen-set) and
//! `pending` (drained by the validator each time it seals a block). Each
//! view is guarded by its own lock so a reader on one doesn't contend
//! with a writer on the other.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::hash::Hash;
use crate::types::Transaction;

struct TransactionList {
    lookup: HashMap<Hash, Transaction>,
    order: Vec<Hash>,
}

impl TransactionList {
    fn new() -> Self {
        TransactionList {
            lookup: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn insert(&mut self, hash: Hash, tx: Transaction) {
        self.lookup.insert(hash, tx);
        self.order.push(hash);
    }

    fn contains(&self, hash: &Hash) -> bool {
        self.lookup.contains_key(hash)
    }

    fn count(&self) -> usize {
        self.lookup.len()
    }

    fn first_hash(&self) -> Option<Hash> {
        self.order.first().copied()
    }

    fn remove(&mut self, hash: &Hash) {
        if self.lookup.remove(hash).is_some() {
            if let Some(pos) = self.order.iter().position(|h| h == hash) {
                self.order.remove(pos);
            }
        }
    }

    fn ordered(&self) -> Vec<Transaction> {
        self.order.iter().filter_map(|h| self.lookup.get(h)).cloned().collect()
    }

    fn clear(&mut self) {
        self.lookup.clear();
        self.order.clear();
    }
}

/// A bounded, de-duplicating transaction pool.
pub struct Mempool {
    all: RwLock<TransactionList>,
    pending: RwLock<TransactionList>,
    max_length: usize,
}

impl Mempool {
    pub fn new(max_length: usize) -> Self {
        Mempool {
            all: RwLock::new(TransactionList::new()),
            pending: RwLock::new(TransactionList::new()),
            max_length,
        }
    }

    /// Adds `tx` to the pool. If `all` is at capacity, the oldest
    /// transaction is evicted first. Re-adding a transaction already
    /// present in `all` is a no-op.
    pub fn add(&self, tx: Transaction) {
        let hash = tx.hash();

        {
            let mut all = self.all.write();
            if all.count() == self.max_length {
                if let Some(oldest) = all.first_hash() {
                    all.remove(&oldest);
                }
            }
            if all.contains(&hash) {
                return;
            }
            all.insert(hash, tx.clone());
        }
        self.pending.write().insert(hash, tx);
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.all.read().contains(hash)
    }

    pub fn all_count(&self) -> usize {
        self.all.read().count()
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.pending.read().ordered()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.read().count()
    }

    /// Resets the `pending` view only; `all` (the seen-set) is preserved.
    pub fn clear_pending(&self) {
        self.pending.write().clear();
    }

    /// Removes and returns up to `limit` pending transactions, in
    /// insertion order. Transactions left over stay pending for the next
    /// block, so a soft per-block cap never drops a submitted transaction.
    pub fn take_pending(&self, limit: usize) -> Vec<Transaction> {
        let mut pending = self.pending.write();
        let taken: Vec<Transaction> = pending.ordered().into_iter().take(limit).collect();
        for tx in &taken {
            pending.remove(&tx.hash());
        }
        taken
    }
}
