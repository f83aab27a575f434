//! Prometheus-backed node metrics and HTTP exporter.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{self, Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

/// Node-level Prometheus metrics.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Current chain height.
    pub chain_height: IntGauge,
    /// Number of transactions currently admitted to the mempool (`all`).
    pub mempool_size: IntGauge,
    /// Number of currently connected peers.
    pub peer_count: IntGauge,
    /// Total blocks minted by this node, if it is the validator.
    pub blocks_minted: IntCounter,
    /// Total inbound blocks rejected by the chain engine.
    pub blocks_rejected: IntCounter,
}

impl NodeMetrics {
    /// Registers node metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let chain_height = IntGauge::with_opts(Opts::new(
            "chain_height",
            "Current height of the local chain",
        ))?;
        registry.register(Box::new(chain_height.clone()))?;

        let mempool_size = IntGauge::with_opts(Opts::new(
            "mempool_size",
            "Number of transactions admitted to the mempool",
        ))?;
        registry.register(Box::new(mempool_size.clone()))?;

        let peer_count = IntGauge::with_opts(Opts::new(
            "peer_count",
            "Number of currently connected peers",
        ))?;
        registry.register(Box::new(peer_count.clone()))?;

        let blocks_minted = IntCounter::with_opts(Opts::new(
            "blocks_minted_total",
            "Total number of blocks minted by this node",
        ))?;
        registry.register(Box::new(blocks_minted.clone()))?;

        let blocks_rejected = IntCounter::with_opts(Opts::new(
            "blocks_rejected_total",
            "Total number of inbound blocks rejected by the chain engine",
        ))?;
        registry.register(Box::new(blocks_rejected.clone()))?;

        Ok(Self {
            chain_height,
            mempool_size,
            peer_count,
            blocks_minted,
            blocks_rejected,
        })
    }
}

/// Wrapper around a Prometheus registry and the node metrics. Clone and
/// share via `Arc` across tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub node: NodeMetrics,
}

impl MetricsRegistry {
    /// Creates a new registry and registers the node metrics into it.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let node = NodeMetrics::register(&registry)?;
        Ok(Self { registry, node })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "failed to encode prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics on `GET /metrics`.
/// All other paths return 404.
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
                tracing::warn!(error = %err, "metrics http connection error");
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

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn node_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = NodeMetrics::register(&registry).expect("register metrics");

        metrics.chain_height.set(3);
        metrics.mempool_size.set(10);
        metrics.peer_count.set(2);
        metrics.blocks_minted.inc();

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.node.chain_height.set(1);
        let text = registry.gather_text();
        assert!(text.contains("chain_height"));
    }
}
