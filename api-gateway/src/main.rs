// api-gateway/src/main.rs

//! API gateway binary.
//!
//! This binary runs a full chain node (transport, mempool, validator loop)
//! in the background and exposes a small read-only HTTP API on top of it:
//!
//! - `GET /health`
//! - `GET /status`

mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::signal;

use chain::config::NodeConfig;
use chain::crypto::PrivateKey;
use chain::metrics::{MetricsRegistry, run_prometheus_http_server};
use chain::node::Node;
use chain::storage::{NullStorage, SledStorage, Storage};
use chain::transport::Transport;
use chain::transport::tcp::TcpTransport;
use config::ApiConfig;
use routes::{health, status};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "api_gateway=info,chain=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "fatal error");
        std::process::exit(1);
    }
}

fn node_config_from_env() -> NodeConfig {
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

async fn run() -> Result<(), String> {
    let api_cfg = ApiConfig::default();
    let node_cfg = node_config_from_env();

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if node_cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = node_cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::error!(error = %e, "metrics HTTP server error");
            }
        });
        tracing::info!(%addr, "metrics exporter listening");
    }

    let storage: Box<dyn Storage> = match SledStorage::open(&node_cfg.storage.path) {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::warn!(error = %e, "failed to open sled store, falling back to NullStorage");
            Box::new(NullStorage)
        }
    };

    let is_validator = node_cfg.is_validator();
    let transport: Arc<dyn Transport> = Arc::new(TcpTransport::new(node_cfg.listen_addr.clone()));
    let node = Node::new(node_cfg, transport, storage, Some(metrics));
    let chain = node.chain().clone();

    tokio::spawn(node.run());

    let app_state: SharedState = Arc::new(AppState {
        chain,
        is_validator,
    });

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/status", get(status::status))
        .with_state(app_state);

    tracing::info!(addr = %api_cfg.listen_addr, "API gateway listening");

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
