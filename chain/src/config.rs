//! Top-level configuration for a chain node.
//!
//! This module aggregates configuration for:
//!
//! - the gossip server and validator loop (`server::ServerConfig`),
//! - the mempool's capacity (`mempool_max_length`),
//! - the metrics exporter (enable flag + listen address).
//!
//! The goal is to have a single `NodeConfig` struct that higher-level
//! binaries (e.g. `main.rs`) can construct from defaults, config files,
//! or environment variables as needed.

use std::net::SocketAddr;

use crate::server::ServerConfig;

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
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration for a chain node.
///
/// This aggregates all the sub-configs needed to wire up a typical node:
///
/// - the gossip server and validator loop (`server`),
/// - mempool capacity (`mempool_max_length`),
/// - the Prometheus metrics exporter (`metrics`).
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub server: ServerConfig,
    pub metrics: MetricsConfig,
    /// Maximum number of transactions retained in the mempool's `all` set.
    pub mempool_max_length: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            metrics: MetricsConfig::default(),
            mempool_max_length: crate::mempool::DEFAULT_MAX_LENGTH,
        }
    }
}
