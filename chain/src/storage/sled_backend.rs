//! `sled`-backed persistent implementation of [`super::Storage`].
//!
//! Blocks are keyed by their header hash and stored as canonical bincode
//! bytes. This is a reference implementation for the minimal external
//! collaborator contract, not a tuned production backend.

use std::path::Path;

use super::{Storage, StorageError};
use crate::types::Block;

pub struct SledStorage {
    tree: sled::Db,
}

impl SledStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let tree = sled::open(path).map_err(|e| StorageError(e.to_string()))?;
        Ok(SledStorage { tree })
    }
}

impl Storage for SledStorage {
    fn put(&self, block: &Block) -> Result<(), StorageError> {
        let key = block.header_hash().as_bytes().to_vec();
        let bytes = crate::codec::encode(block).map_err(|e| StorageError(e.to_string()))?;
        self.tree
            .insert(key, bytes)
            .map_err(|e| StorageError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash;

    #[test]
    fn put_persists_without_error() {
        let dir = tempfile_dir();
        let storage = SledStorage::open(&dir).expect("open sled store");
        let block = Block::new(Hash::ZERO, 1, 0, vec![]);
        assert!(storage.put(&block).is_ok());
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("chain-sled-test-{}", std::process::id()));
        dir
    }
}
