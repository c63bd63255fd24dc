// src/main.rs
//
// Node bootstrap binary:
//
// - parses listen/seed addresses and an optional validator key from the
//   environment,
// - starts the Prometheus metrics exporter on /metrics,
// - opens the configured storage backend,
// - builds the TCP transport and the node, and runs its event loop.

use std::sync::Arc;

use chain::config::NodeConfig;
use chain::crypto::PrivateKey;
use chain::metrics::{MetricsRegistry, run_prometheus_http_server};
use chain::node::Node;
use chain::storage::{NullStorage, SledStorage, Storage};
use chain::transport::Transport;
use chain::transport::tcp::TcpTransport;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "chain=info".to_string()))
        .init();

    if let Err(err) = run_node().await {
        tracing::error!(error = %err, "fatal error");
        std::process::exit(1);
    }
}

fn config_from_env() -> NodeConfig {
    let mut cfg = NodeConfig::default();

    if let Ok(addr) = std::env::var("CHAIN_LISTEN_ADDR") {
        cfg.listen_addr = addr;
    }
    if let Ok(seeds) = std::env::var("CHAIN_SEED_NODES") {
        cfg.seed_nodes = seeds.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect();
    }
    if let Ok(hex_key) = std::env::var("CHAIN_VALIDATOR_KEY") {
        match PrivateKey::from_hex(&hex_key) {
            Ok(key) => cfg.private_key = Some(key),
            Err(e) => tracing::warn!(error = %e, "ignoring malformed CHAIN_VALIDATOR_KEY"),
        }
    }
    if let Ok(path) = std::env::var("CHAIN_STORAGE_PATH") {
        cfg.storage.path = path;
    }

    cfg
}

async fn run_node() -> Result<(), String> {
    let cfg = config_from_env();

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::error!(error = %e, "metrics HTTP server error");
            }
        });
        tracing::info!(%addr, "metrics exporter listening");
    }

    let storage: Box<dyn Storage> = match SledStorage::open(&cfg.storage.path) {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::warn!(error = %e, path = %cfg.storage.path, "failed to open sled store, falling back to NullStorage");
            Box::new(NullStorage)
        }
    };

    let is_validator = cfg.is_validator();
    let transport: Arc<dyn Transport> = Arc::new(TcpTransport::new(cfg.listen_addr.clone()));

    tracing::info!(
        listen_addr = %cfg.listen_addr,
        validator = is_validator,
        seed_nodes = ?cfg.seed_nodes,
        "starting node"
    );

    let node = Node::new(cfg, transport, storage, Some(metrics));

    let mut shutdown = std::pin::pin!(tokio::signal::ctrl_c());
    let quit = node.quit_handle();
    let run_handle = tokio::spawn(node.run());

    tokio::select! {
        res = run_handle => {
            res.map_err(|e| format!("node task panicked: {e}"))?
                .map_err(|e| format!("node exited with error: {e}"))?;
        }
        _ = &mut shutdown => {
            tracing::info!("received Ctrl-C, shutting down");
            let _ = quit.send(()).await;
        }
    }

    Ok(())
}
