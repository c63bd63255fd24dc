//! Contract key/value state used by the VM's `Store`/`Get` opcodes.

use std::collections::HashMap;

use parking_lot::RwLock;

#[derive(Default)]
pub struct ContractState {
    kv: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl ContractState {
    pub fn new() -> Self {
        ContractState {
            kv: RwLock::new(HashMap::new()),
        }
    }

    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        self.kv.write().insert(key, value);
    }

    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, ContractStateError> {
        self.kv
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ContractStateError::KeyNotFound(key.to_vec()))
    }

    pub fn delete(&self, key: &[u8]) {
        self.kv.write().remove(key);
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum ContractStateError {
    KeyNotFound(Vec<u8>),
}

impl std::fmt::Display for ContractStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractStateError::KeyNotFound(key) => {
                write!(f, "key {} not found in contract state", hex::encode(key))
            }
        }
    }
}

impl std::error::Error for ContractStateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips() {
        let state = ContractState::new();
        state.put(b"hey".to_vec(), b"there".to_vec());
        assert_eq!(state.get(b"hey").unwrap(), b"there".to_vec());
    }

    #[test]
    fn missing_key_is_an_error() {
        let state = ContractState::new();
        assert!(state.get(b"nope").is_err());
    }
}
