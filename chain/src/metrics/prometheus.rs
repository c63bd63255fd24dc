//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and the node's counters/histograms, and an async HTTP exporter
//! that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{self, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};

/// Chain- and mempool-level Prometheus metrics.
#[derive(Clone)]
pub struct ChainMetrics {
    /// Total number of blocks successfully admitted onto the chain.
    pub blocks_admitted_total: IntCounter,
    /// Total number of blocks rejected by validation or storage.
    pub blocks_rejected_total: IntCounter,
    /// Time spent validating and applying an admitted block, in seconds.
    pub block_validation_seconds: Histogram,
    /// Current size of the mempool's `all` (seen-set) view.
    pub mempool_size: IntGauge,
    /// Total number of VM programs executed.
    pub vm_executions_total: IntCounter,
    /// Total number of VM executions that returned an error.
    pub vm_failures_total: IntCounter,
}

impl ChainMetrics {
    /// Registers the chain metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let blocks_admitted_total = IntCounter::with_opts(Opts::new(
            "blocks_admitted_total",
            "Total number of blocks successfully admitted onto the chain",
        ))?;
        registry.register(Box::new(blocks_admitted_total.clone()))?;

        let blocks_rejected_total = IntCounter::with_opts(Opts::new(
            "blocks_rejected_total",
            "Total number of blocks rejected by validation or storage",
        ))?;
        registry.register(Box::new(blocks_rejected_total.clone()))?;

        let block_validation_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "block_validation_seconds",
                "Time to validate and apply an admitted block, in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        registry.register(Box::new(block_validation_seconds.clone()))?;

        let mempool_size = IntGauge::with_opts(Opts::new(
            "mempool_size",
            "Current number of transactions in the mempool's seen-set",
        ))?;
        registry.register(Box::new(mempool_size.clone()))?;

        let vm_executions_total = IntCounter::with_opts(Opts::new(
            "vm_executions_total",
            "Total number of VM programs executed",
        ))?;
        registry.register(Box::new(vm_executions_total.clone()))?;

        let vm_failures_total = IntCounter::with_opts(Opts::new(
            "vm_failures_total",
            "Total number of VM executions that returned an error",
        ))?;
        registry.register(Box::new(vm_failures_total.clone()))?;

        Ok(Self {
            blocks_admitted_total,
            blocks_rejected_total,
            block_validation_seconds,
            mempool_size,
            vm_executions_total,
            vm_failures_total,
        })
    }
}

/// Wrapper around a Prometheus registry and the node's metrics.
///
/// This is the main handle passed around the node; wrap it in an [`Arc`]
/// and share it across tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub chain: ChainMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the chain metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let chain = ChainMetrics::register(&registry)?;
        Ok(Self { registry, chain })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::warn!(error = %err, "prometheus HTTP connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}
