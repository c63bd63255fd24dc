//! Chain library crate.
//!
//! This crate provides the core building blocks for a single-leader
//! blockchain node:
//!
//! - cryptographic primitives (`crypto`, `hash`),
//! - a canonical binary codec (`codec`),
//! - strongly-typed domain types (`types`),
//! - account and contract state (`state`),
//! - a stack-based bytecode VM (`vm`),
//! - a bounded transaction pool (`mempool`),
//! - the chain and its block validation rules (`consensus`),
//! - the wire protocol (`rpc`) and its transports (`transport`),
//! - the node engine that ties all of the above into a running peer (`node`),
//! - storage backends (`storage`),
//! - Prometheus-based metrics (`metrics`),
//! - and top-level node configuration (`config`).
//!
//! Higher-level binaries (see `src/main.rs` and the `api-gateway` crate)
//! compose these pieces into a runnable validator or follower node.

pub mod codec;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod hash;
pub mod mempool;
pub mod metrics;
pub mod node;
pub mod rpc;
pub mod state;
pub mod storage;
pub mod transport;
pub mod types;
pub mod vm;

pub use config::{MetricsConfig, NodeConfig, StorageConfig};
pub use consensus::{Chain, ChainError, ChainView, ConsensusConfig, ValidationError};
pub use crypto::{Address, CryptoError, PrivateKey, PublicKey, Signature};
pub use hash::Hash;
pub use mempool::Mempool;
pub use metrics::{ChainMetrics, MetricsRegistry, run_prometheus_http_server};
pub use node::{Node, NodeError};
pub use rpc::{Payload, RpcError};
pub use storage::{NullStorage, SledStorage, Storage, StorageError};
pub use transport::{Transport, TransportError};

// Re-export domain types at the crate root for convenience.
pub use types::*;
