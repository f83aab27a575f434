//! Shared application state.

use std::sync::Arc;

use tokio::sync::mpsc;

use chain::{MetricsRegistry, Transaction};

/// Shared state held by the API.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via Axum's
/// `State` extractor. The embedded node (chain engine, mempool, gossip
/// server) runs in a background task started at startup; handlers only
/// ever touch the local-transaction channel and the metrics registry.
pub struct AppState {
    /// Sender half of the embedded server's local-transaction channel.
    pub tx_sender: mpsc::UnboundedSender<Transaction>,
    /// Metrics registry shared between the node and the API.
    pub metrics: Arc<MetricsRegistry>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
