//! Chain library crate.
//!
//! This crate provides the core building blocks for a minimal
//! proof-of-authority blockchain node:
//!
//! - a canonical deterministic binary codec (`codec`),
//! - strongly-typed domain types: hashes, keys, accounts, transactions
//!   and blocks (`types`),
//! - a single-threaded stack virtual machine (`vm`),
//! - the chain engine: block validation and state application (`engine`),
//! - a mempool of pending transactions (`mempool`),
//! - the wire protocol and peer transport (`net`),
//! - the gossiping validator event loop (`server`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level node configuration (`config`).
//!
//! Higher-level binaries compose these pieces to run a validator or a
//! plain gossiping node.

pub mod codec;
pub mod config;
pub mod engine;
pub mod mempool;
pub mod metrics;
pub mod net;
pub mod server;
pub mod types;
pub mod vm;

// Re-export top-level configuration types.
pub use config::{MetricsConfig, NodeConfig};

// Re-export the chain engine.
pub use engine::{BlockStore, Chain, ChainError, NoopBlockStore, StoreError, TxError, WireError};

// Re-export the mempool.
pub use mempool::Mempool;

// Re-export the wire protocol.
pub use net::{BlocksResponse, GetBlocksRequest, Message, Payload, Status};

// Re-export the gossiping validator server.
pub use server::{PeerState, Server, ServerConfig};

// Re-export metrics.
pub use metrics::{MetricsRegistry, NodeMetrics, prometheus::run_prometheus_http_server};

// Re-export the stack VM.
pub use vm::{ContractStore, VmError, run as run_vm};

// Re-export the codec traits.
pub use codec::{CodecError, Decode, Encode};

// Re-export domain types at the crate root for convenience.
pub use types::*;
