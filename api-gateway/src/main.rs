// api-gateway/src/main.rs

//! API gateway binary.
//!
//! This binary embeds a node (chain engine, mempool, gossip server) exactly
//! as `chain/src/main.rs` does, and exposes a small HTTP API on top of it:
//!
//! - `GET /health`
//! - `POST /transactions`
//!
//! `POST /transactions` decodes a hex-encoded, canonically-encoded
//! transaction and forwards it on the embedded server's local-transaction
//! channel; the gossip event loop takes it from there.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::{signal, sync::watch};

use chain::{Block, Chain, Hash, Header, Mempool, MetricsRegistry, NodeConfig, PrivateKey, Server};
use config::ApiConfig;
use routes::{health, transactions};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "api_gateway=info,chain=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

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

async fn run() -> Result<(), String> {
    let api_cfg = ApiConfig::default();
    let node_cfg = NodeConfig::default();

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if node_cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = node_cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = chain::run_prometheus_http_server(metrics_clone, addr).await {
                eprintln!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Embedded node: chain engine, mempool, gossip server
    // ---------------------------

    let validator_key = PrivateKey::generate();
    let chain_engine = Arc::new(Chain::new_chain(genesis_block(&validator_key)));
    let mempool = Arc::new(Mempool::with_max_length(node_cfg.mempool_max_length));

    let (server, tx_sender) = Server::with_metrics(
        node_cfg.server,
        chain_engine,
        mempool,
        Some(validator_key),
        Some(metrics.clone()),
    );
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_task = tokio::spawn(async move { server.run(shutdown_rx).await });

    // ---------------------------
    // Shared state
    // ---------------------------

    let app_state: SharedState = Arc::new(AppState {
        tx_sender,
        metrics: metrics.clone(),
    });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/transactions", post(transactions::submit_transaction))
        .with_state(app_state);

    tracing::info!("API gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let _ = shutdown_tx.send(true);
    let _ = server_task.await;

    serve_result.map_err(|e| format!("API server error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
