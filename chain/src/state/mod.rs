//! Chain-local state: the accounts ledger and the contract key/value store.

pub mod accounts;
pub mod contract;

pub use accounts::{AccountsState, StateError};
pub use contract::ContractState;
