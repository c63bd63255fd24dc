//! Core domain types shared across the chain: transactions and blocks.
//!
//! Hashes live in [`crate::hash`] and key material in [`crate::crypto`];
//! this module only wires them together into the wire-level transaction
//! and block shapes.

pub mod block;
pub mod tx;

pub use block::{Block, BlockVerifyError, Header, compute_transactions_hash};
pub use tx::{Transaction, TxCollection, TxInner, TxMint};
