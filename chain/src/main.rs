// src/main.rs
//
// Minimal demo node that wires up the chain library:
//
// - in-memory chain engine (NoopBlockStore)
// - gossiping validator event loop
// - Prometheus metrics exporter on /metrics
// - graceful shutdown on Ctrl-C

use std::sync::Arc;

use chain::{Block, Chain, Hash, Header, Mempool, MetricsRegistry, NodeConfig, PrivateKey, Server};
use tokio::sync::watch;

/// Builds an empty, self-signed genesis block for `validator`.
fn genesis_block(validator: &PrivateKey) -> Block {
    let header = Header {
        version: 1,
        data_hash: chain::hash_transactions(&[]),
        prev_block_hash: Hash::ZERO,
        timestamp: 0,
        height: 0,
    };
    let signature = validator.sign(&header.to_canonical_bytes());
    Block::new(header, Vec::new(), validator.public_key(), signature)
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_node().await {
        eprintln!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), String> {
    // For now, just use defaults. Later these can be loaded from a file,
    // CLI flags, or environment variables.
    let cfg = NodeConfig::default();

    tracing_subscriber::fmt::init();

    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.metrics.enabled {
        let addr = cfg.metrics.listen_addr;
        let metrics_clone = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = chain::run_prometheus_http_server(metrics_clone, addr).await {
                eprintln!("metrics HTTP server error: {e}");
            }
        });
        eprintln!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Validator identity (demo: generate a fresh key each run)
    // ---------------------------

    let validator_key = PrivateKey::generate();

    // ---------------------------
    // Chain engine + mempool
    // ---------------------------

    let chain_engine = Arc::new(Chain::new_chain(genesis_block(&validator_key)));
    let mempool = Arc::new(Mempool::with_max_length(cfg.mempool_max_length));

    let validator_key = Some(validator_key);

    // ---------------------------
    // Gossip server
    // ---------------------------

    let (server, local_tx) =
        Server::with_metrics(cfg.server, chain_engine, mempool, validator_key, Some(metrics.clone()));
    let server = Arc::new(server);

    // The sender half would normally be handed to an external submission
    // endpoint (e.g. the api-gateway crate); dropping it here just means
    // this demo binary never submits local transactions.
    drop(local_tx);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server_task = tokio::spawn(async move { server.run(shutdown_rx).await });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for ctrl-c: {e}"))?;

    eprintln!("shutting down");
    let _ = shutdown_tx.send(true);

    match server_task.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("server exited with error: {e}")),
        Err(e) => Err(format!("server task panicked: {e}")),
    }
}
