//! Self-describing RPC envelope and typed message payloads.
//!
//! Every message on the wire is `{header: u8, body: bytes}`; the body is
//! itself canonically encoded and its shape is dictated by the header.
//! Header values are fixed across implementations (§ wire format): they
//! are part of the interop contract, not an implementation detail.

use serde::{Deserialize, Serialize};

use crate::types::{Block, Transaction};

pub const HEADER_TRANSACTION: u8 = 0;
pub const HEADER_BLOCK: u8 = 1;
pub const HEADER_STATUS_REQUEST: u8 = 2;
pub const HEADER_STATUS: u8 = 3;
pub const HEADER_SYNC_BLOCKS_REQUEST: u8 = 4;
pub const HEADER_MISSING_BLOCKS: u8 = 5;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    pub version: u32,
    pub height: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncBlocksRequest {
    pub from_height: u32,
    pub to_height: u32,
}

/// Decoded, typed RPC payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Payload {
    Transaction(Transaction),
    Block(Block),
    StatusRequest,
    Status(Status),
    SyncBlocksRequest(SyncBlocksRequest),
    MissingBlocks(Vec<Block>),
}

impl Payload {
    fn header(&self) -> u8 {
        match self {
            Payload::Transaction(_) => HEADER_TRANSACTION,
            Payload::Block(_) => HEADER_BLOCK,
            Payload::StatusRequest => HEADER_STATUS_REQUEST,
            Payload::Status(_) => HEADER_STATUS,
            Payload::SyncBlocksRequest(_) => HEADER_SYNC_BLOCKS_REQUEST,
            Payload::MissingBlocks(_) => HEADER_MISSING_BLOCKS,
        }
    }

    /// Encodes this payload as a complete envelope: `{header, body}`.
    pub fn encode(&self) -> Vec<u8> {
        let body = match self {
            Payload::Transaction(tx) => crate::codec::encode(tx),
            Payload::Block(b) => crate::codec::encode(b),
            Payload::StatusRequest => Ok(Vec::new()),
            Payload::Status(s) => crate::codec::encode(s),
            Payload::SyncBlocksRequest(r) => crate::codec::encode(r),
            Payload::MissingBlocks(blocks) => crate::codec::encode(blocks),
        }
        .expect("RPC payloads always encode");

        let mut envelope = Vec::with_capacity(1 + body.len());
        envelope.push(self.header());
        envelope.extend_from_slice(&body);
        envelope
    }

    /// Decodes a complete envelope (`header` byte followed by the body)
    /// into a typed payload.
    pub fn decode(envelope: &[u8]) -> Result<Payload, RpcError> {
        let (&header, body) = envelope.split_first().ok_or(RpcError::EmptyEnvelope)?;
        match header {
            HEADER_TRANSACTION => Ok(Payload::Transaction(
                crate::codec::decode(body).map_err(|e| RpcError::Decode(e.to_string()))?,
            )),
            HEADER_BLOCK => Ok(Payload::Block(
                crate::codec::decode(body).map_err(|e| RpcError::Decode(e.to_string()))?,
            )),
            HEADER_STATUS_REQUEST => Ok(Payload::StatusRequest),
            HEADER_STATUS => Ok(Payload::Status(
                crate::codec::decode(body).map_err(|e| RpcError::Decode(e.to_string()))?,
            )),
            HEADER_SYNC_BLOCKS_REQUEST => Ok(Payload::SyncBlocksRequest(
                crate::codec::decode(body).map_err(|e| RpcError::Decode(e.to_string()))?,
            )),
            HEADER_MISSING_BLOCKS => Ok(Payload::MissingBlocks(
                crate::codec::decode(body).map_err(|e| RpcError::Decode(e.to_string()))?,
            )),
            other => Err(RpcError::InvalidMessageHeader(other)),
        }
    }
}

#[derive(Debug)]
pub enum RpcError {
    EmptyEnvelope,
    InvalidMessageHeader(u8),
    Decode(String),
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::EmptyEnvelope => write!(f, "RPC envelope is empty"),
            RpcError::InvalidMessageHeader(h) => write!(f, "invalid message header {h}"),
            RpcError::Decode(msg) => write!(f, "failed to decode RPC body: {msg}"),
        }
    }
}

impl std::error::Error for RpcError {}
