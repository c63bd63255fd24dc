//! The accounts ledger: address -> balance.
//!
//! Every mutating operation takes the ledger's write lock, including
//! account creation, so concurrent inserts can never race with a
//! balance update in flight.

use std::collections::HashMap;
use std::fmt;

use num_bigint::BigInt;
use num_traits::Zero;
use parking_lot::RwLock;

use crate::crypto::Address;

#[derive(Clone, Debug)]
pub struct Account {
    pub address: Address,
    pub balance: BigInt,
}

#[derive(Debug, Eq, PartialEq)]
pub enum StateError {
    AccountNotFound(Address),
    InsufficientFunds { address: Address, balance: String, required: String },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::AccountNotFound(addr) => write!(f, "account {addr} not found"),
            StateError::InsufficientFunds {
                address,
                balance,
                required,
            } => write!(
                f,
                "account {address} has insufficient balance (balance = {balance}, required = {required})"
            ),
        }
    }
}

impl std::error::Error for StateError {}

#[derive(Default)]
pub struct AccountsState {
    accounts: RwLock<HashMap<Address, Account>>,
}

impl AccountsState {
    pub fn new() -> Self {
        AccountsState {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts or replaces the account record for `addr`.
    pub fn create_account(&self, addr: Address, balance: BigInt) -> Account {
        let account = Account { address: addr, balance };
        let mut accounts = self.accounts.write();
        accounts.insert(addr, account.clone());
        account
    }

    pub fn get_balance(&self, addr: &Address) -> Result<BigInt, StateError> {
        let accounts = self.accounts.read();
        accounts
            .get(addr)
            .map(|a| a.balance.clone())
            .ok_or(StateError::AccountNotFound(*addr))
    }

    /// Credits `addr` by `amount`, creating the account at zero balance if
    /// it does not already exist.
    pub fn add_balance(&self, addr: Address, amount: &BigInt) {
        let mut accounts = self.accounts.write();
        let account = accounts.entry(addr).or_insert_with(|| Account {
            address: addr,
            balance: BigInt::zero(),
        });
        account.balance += amount;
    }

    pub fn sub_balance(&self, addr: Address, amount: &BigInt) -> Result<(), StateError> {
        let mut accounts = self.accounts.write();
        let account = accounts
            .get_mut(&addr)
            .ok_or(StateError::AccountNotFound(addr))?;
        if &account.balance < amount {
            return Err(StateError::InsufficientFunds {
                address: addr,
                balance: account.balance.to_string(),
                required: amount.to_string(),
            });
        }
        account.balance -= amount;
        Ok(())
    }

    /// Atomically debits `from` and credits `to`. If the debit fails, no
    /// credit occurs.
    pub fn transfer(&self, from: Address, to: Address, amount: &BigInt) -> Result<(), StateError> {
        self.sub_balance(from, amount)?;
        self.add_balance(to, amount);
        Ok(())
    }
}
