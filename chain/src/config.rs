//! Top-level configuration for a chain node.
//!
//! This module aggregates configuration for:
//!
//! - the node itself (listen address, validator key, seed nodes, block
//!   time, mempool capacity),
//! - consensus/block-building parameters (`ConsensusConfig`),
//! - the persistent storage reference implementation (`StorageConfig`),
//! - the Prometheus metrics exporter (`MetricsConfig`).
//!
//! The goal is to have a single `NodeConfig` struct that higher-level
//! binaries (e.g. `main.rs`) can construct from defaults, a config file,
//! or environment variables as needed.

use std::net::SocketAddr;
use std::time::Duration;

use crate::consensus::ConsensusConfig;
use crate::crypto::PrivateKey;

/// Configuration for the `sled`-backed storage reference implementation.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Filesystem path the `SledStorage` reference implementation opens.
    /// Unused by the default `NullStorage` backend.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "data/chain-db".to_string(),
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration a node is constructed from.
///
/// A node with `private_key.is_some()` is a validator; without one it is
/// a follower that only relays and applies what it receives.
#[derive(Clone)]
pub struct NodeConfig {
    /// Address the transport binds to. The in-memory transport used by
    /// tests may ignore this.
    pub listen_addr: String,
    /// Presence makes this node a validator.
    pub private_key: Option<PrivateKey>,
    /// Addresses dialed at start-up.
    pub seed_nodes: Vec<String>,
    /// How often the validator loop ticks and attempts to seal a block.
    pub block_time: Duration,
    /// Bound on the mempool's `all` (seen-set) view.
    pub mempool_capacity: usize,
    pub consensus: ConsensusConfig,
    pub storage: StorageConfig,
    pub metrics: MetricsConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_string(),
            private_key: None,
            seed_nodes: Vec::new(),
            block_time: Duration::from_secs(5),
            mempool_capacity: 1_000,
            consensus: ConsensusConfig::default(),
            storage: StorageConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn is_validator(&self) -> bool {
        self.private_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_node_is_a_follower() {
        let cfg = NodeConfig::default();
        assert!(!cfg.is_validator());
    }

    #[test]
    fn default_metrics_addr_parses() {
        let cfg = MetricsConfig::default();
        assert_eq!(cfg.listen_addr.port(), 9898);
    }
}
