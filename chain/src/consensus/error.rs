use std::fmt;

use crate::hash::Hash;
use crate::storage::StorageError;
use crate::types::BlockVerifyError;

/// Error returned when a block fails admission checks.
#[derive(Debug, Eq, PartialEq)]
pub enum ValidationError {
    /// A block already occupies this height. Benign: the node should log
    /// at debug and move on.
    BlockAlreadyExists(u32),
    /// `block.height != chain.height() + 1`.
    HeightOutOfOrder { block_height: u32, chain_height: u32 },
    /// `block.prev_header_hash` does not match the hash of the current
    /// tip's header.
    PrevHashMismatch { expected: Hash, found: Hash },
    /// `block.verify()` failed.
    Verify(BlockVerifyError),
}

/// High-level errors that can occur while admitting a block onto the
/// chain.
#[derive(Debug)]
pub enum ChainError {
    Validation(ValidationError),
    Storage(StorageError),
}

impl From<ValidationError> for ChainError {
    fn from(e: ValidationError) -> Self {
        ChainError::Validation(e)
    }
}

impl From<StorageError> for ChainError {
    fn from(e: StorageError) -> Self {
        ChainError::Storage(e)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::BlockAlreadyExists(height) => {
                write!(f, "block at height {height} already exists")
            }
            ValidationError::HeightOutOfOrder {
                block_height,
                chain_height,
            } => write!(
                f,
                "block height {block_height} is out of order (current chain height is {chain_height})"
            ),
            ValidationError::PrevHashMismatch { expected, found } => write!(
                f,
                "block's prev_header_hash {found} does not match expected {expected}"
            ),
            ValidationError::Verify(e) => write!(f, "block failed to verify: {e:?}"),
        }
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::Validation(e) => write!(f, "{e}"),
            ChainError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for ValidationError {}
impl std::error::Error for ChainError {}
