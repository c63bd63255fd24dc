//! Canonical binary encoding used for hashing, signing, and wire framing.
//!
//! Every place that needs a deterministic byte representation of a domain
//! type — block/transaction hashing, RPC envelopes, storage — goes through
//! this module so there is exactly one encoding in play.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

fn config() -> bincode::config::Configuration {
    bincode::config::standard()
}

/// Encodes `value` using the crate-wide canonical configuration.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serde::encode_to_vec(value, config()).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decodes a value of type `T` from `bytes`, requiring the entire slice to
/// be consumed.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let (value, consumed) =
        bincode::serde::decode_from_slice(bytes, config()).map_err(|e| CodecError::Decode(e.to_string()))?;
    if consumed != bytes.len() {
        return Err(CodecError::TrailingBytes {
            consumed,
            total: bytes.len(),
        });
    }
    Ok(value)
}

#[derive(Debug)]
pub enum CodecError {
    Encode(String),
    Decode(String),
    TrailingBytes { consumed: usize, total: usize },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Encode(msg) => write!(f, "encode failed: {msg}"),
            CodecError::Decode(msg) => write!(f, "decode failed: {msg}"),
            CodecError::TrailingBytes { consumed, total } => write!(
                f,
                "decode left {} trailing bytes (consumed {consumed} of {total})",
                total - consumed
            ),
        }
    }
}

impl std::error::Error for CodecError {}
